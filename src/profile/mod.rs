//! Device profile module.
//!
//! This module loads the declarative device profile catalog shared by
//! certificate issuance and firewall ACL expansion.

pub mod catalog;
pub mod device;

pub use catalog::{load_catalog, ProfileCatalog};
pub use device::DeviceProfile;
