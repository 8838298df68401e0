//! nebula-utils: maintenance tooling for a Nebula mesh PKI
//!
//! This library drives certificate issuance and firewall policy generation
//! for a Nebula overlay network from a single declarative device profile
//! catalog. It enables users to:
//!
//! - Load device profiles (attributes, overlay address, validity, ACL groups)
//! - Issue a key pair and signed certificate per device through `nebula-cert`
//! - Issue certificates for every profiled device in one batch
//! - Expand symbolic `acl_group` firewall rules into per-host rules
//!
//! # Architecture
//!
//! The catalog is loaded once and passed by reference to the two independent
//! consumers: [`firewall::expand`] and [`issue`]. All key generation and
//! signing goes through the [`authority::SigningAuthority`] trait so the
//! orchestration can run against something other than the real binary.
//!
//! # Example
//!
//! ```rust,no_run
//! use nutils::firewall::{expand_policy, load_policy, save_policy};
//! use nutils::profile::load_catalog;
//! use nutils::error::Result;
//! use std::path::Path;
//!
//! fn example() -> Result<()> {
//!     let catalog = load_catalog(Path::new("profiles.yml"))?;
//!     let policy = load_policy(Path::new("config.template.yml"))?;
//!     save_policy(&expand_policy(&policy, &catalog), Path::new("config.yml"))?;
//!     Ok(())
//! }
//! ```

pub mod authority;
pub mod error;
pub mod firewall;
pub mod issue;
pub mod profile;

// Re-export commonly used types
pub use error::{NutilsError, Result};
