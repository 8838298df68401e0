//! Firewall policy module.
//!
//! This module parses the `firewall.inbound` section of a Nebula configuration
//! and expands symbolic `acl_group` rules into per-host rules using the
//! device profile catalog.

pub mod expand;
pub mod policy;
pub mod rule;

pub use expand::{expand_file, expand_policy};
pub use policy::{load_policy, save_policy, FirewallPolicy};
pub use rule::{ConcreteRule, FirewallRule, SymbolicRule};
