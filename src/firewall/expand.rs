//! ACL group expansion.
//!
//! Rewrites every symbolic `acl_group` rule into one host rule per catalog
//! device in that group. The rewrite is rule-by-rule: expanded rules take the
//! place of the rule they came from and every other rule keeps its position.

use crate::error::Result;
use crate::firewall::policy::{load_policy, save_policy, FirewallPolicy};
use crate::firewall::rule::FirewallRule;
use crate::profile::catalog::{load_catalog, ProfileCatalog};
use log::{info, warn};
use std::path::Path;

/// Expand a sequence of rules against the catalog.
///
/// A group with no members expands to nothing.
pub fn expand_rules(rules: &[FirewallRule], catalog: &ProfileCatalog) -> Vec<FirewallRule> {
    let mut expanded = Vec::with_capacity(rules.len());

    for rule in rules {
        match rule {
            FirewallRule::Symbolic(symbolic) => {
                let members = catalog.members_of(&symbolic.acl_group);
                if members.is_empty() {
                    warn!(
                        "acl_group '{}' has no member devices; rule dropped",
                        symbolic.acl_group
                    );
                }
                if !symbolic.extra.is_empty() {
                    let dropped: Vec<&str> =
                        symbolic.extra.keys().filter_map(|key| key.as_str()).collect();
                    warn!(
                        "acl_group '{}': keys {:?} are not carried onto expanded host rules",
                        symbolic.acl_group, dropped
                    );
                }
                expanded.extend(
                    members
                        .into_iter()
                        .map(|host| FirewallRule::Concrete(symbolic.for_host(host))),
                );
            }
            FirewallRule::Concrete(_) | FirewallRule::Passthrough(_) => {
                expanded.push(rule.clone());
            }
        }
    }

    expanded
}

/// Expand all symbolic rules of a policy, returning a new policy.
///
/// # Example
///
/// ```
/// use nutils::firewall::expand::expand_policy;
/// use nutils::firewall::policy::FirewallPolicy;
/// use nutils::profile::catalog::ProfileCatalog;
///
/// let catalog = ProfileCatalog::from_yaml_str(
///     "A:\n  attributes: []\n  ip: 10.0.0.1/24\n  validity: 1\n  acl_groups: [g1]\n",
/// ).unwrap();
/// let policy = FirewallPolicy::from_yaml_str(
///     "firewall:\n  inbound:\n    - {port: 22, proto: tcp, acl_group: g1}\n",
/// ).unwrap();
///
/// let expanded = expand_policy(&policy, &catalog);
/// assert!(!expanded.has_symbolic_rules());
/// assert_eq!(expanded.inbound_rules().len(), 1);
/// ```
pub fn expand_policy(policy: &FirewallPolicy, catalog: &ProfileCatalog) -> FirewallPolicy {
    policy.with_inbound_rules(expand_rules(policy.inbound_rules(), catalog))
}

/// Load a profile catalog and a policy, expand the policy, and write it out.
pub fn expand_file(profiles: &Path, source: &Path, destination: &Path) -> Result<FirewallPolicy> {
    let catalog = load_catalog(profiles)?;
    let policy = load_policy(source)?;

    let expanded = expand_policy(&policy, &catalog);
    save_policy(&expanded, destination)?;

    info!(
        "expanded {} inbound rules into {} ({})",
        policy.inbound_rules().len(),
        expanded.inbound_rules().len(),
        destination.display()
    );
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firewall::rule::{ConcreteRule, SymbolicRule};
    use crate::profile::device::DeviceProfile;
    use std::fs;
    use tempfile::TempDir;

    fn profile(groups: &[&str]) -> DeviceProfile {
        DeviceProfile {
            attributes: vec!["node".to_string()],
            network_address: "192.168.100.1/24".to_string(),
            validity_years: 1,
            acl_groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn catalog(entries: &[(&str, &[&str])]) -> ProfileCatalog {
        entries
            .iter()
            .map(|(name, groups)| (name.to_string(), profile(groups)))
            .collect()
    }

    #[test]
    fn test_group_rule_replaced_in_place() {
        let catalog = catalog(&[("A", &["g1"]), ("B", &["g2"])]);
        let rules = vec![
            SymbolicRule::new(22, "tcp", "g1").into(),
            ConcreteRule::new(443, "tcp", "Z").into(),
        ];

        let expanded = expand_rules(&rules, &catalog);

        assert_eq!(
            expanded,
            vec![
                FirewallRule::from(ConcreteRule::new(22, "tcp", "A")),
                FirewallRule::from(ConcreteRule::new(443, "tcp", "Z")),
            ]
        );
    }

    #[test]
    fn test_expanded_rules_carry_only_port_proto_host() {
        let catalog = catalog(&[("A", &["g1"]), ("B", &["g1"])]);
        let policy = FirewallPolicy::from_yaml_str(
            "firewall:\n  inbound:\n    - {port: 22, proto: tcp, acl_group: g1, groups: [laptop]}\n",
        )
        .unwrap();

        let expanded = expand_policy(&policy, &catalog);

        assert_eq!(
            expanded.inbound_rules(),
            &[
                FirewallRule::from(ConcreteRule::new(22, "tcp", "A")),
                FirewallRule::from(ConcreteRule::new(22, "tcp", "B")),
            ]
        );
        let rendered = expanded.to_yaml_string().unwrap();
        assert!(!rendered.contains("laptop"));
    }

    #[test]
    fn test_unknown_group_expands_to_nothing() {
        let catalog = catalog(&[("A", &["g1"])]);
        let rules = vec![
            ConcreteRule::new(80, "tcp", "X").into(),
            SymbolicRule::new(22, "tcp", "g2").into(),
            ConcreteRule::new(443, "tcp", "Y").into(),
        ];

        let expanded = expand_rules(&rules, &catalog);

        assert_eq!(
            expanded,
            vec![
                FirewallRule::from(ConcreteRule::new(80, "tcp", "X")),
                FirewallRule::from(ConcreteRule::new(443, "tcp", "Y")),
            ]
        );
    }

    #[test]
    fn test_member_count_and_catalog_order() {
        let catalog = catalog(&[
            ("c", &["web"]),
            ("a", &["db"]),
            ("b", &["web", "db"]),
            ("d", &[]),
        ]);
        let rules = vec![SymbolicRule::new(5432, "tcp", "db").into()];

        let expanded = expand_rules(&rules, &catalog);
        let hosts: Vec<&str> = expanded
            .iter()
            .map(|rule| match rule {
                FirewallRule::Concrete(rule) => rule.host(),
                other => panic!("Expected concrete rule, got {:?}", other),
            })
            .collect();

        assert_eq!(hosts, vec!["a", "b"]);
    }

    #[test]
    fn test_concrete_rules_keep_relative_order() {
        let catalog = catalog(&[("m1", &["g"]), ("m2", &["g"])]);
        let rules: Vec<FirewallRule> = vec![
            ConcreteRule::new(1, "tcp", "h1").into(),
            SymbolicRule::new(2, "udp", "g").into(),
            ConcreteRule::new(3, "tcp", "h2").into(),
            SymbolicRule::new(4, "udp", "g").into(),
            ConcreteRule::new(5, "tcp", "h3").into(),
        ];

        let expanded = expand_rules(&rules, &catalog);
        let ports: Vec<u64> = expanded
            .iter()
            .map(|rule| match rule {
                FirewallRule::Concrete(rule) => rule.port().as_u64().unwrap(),
                other => panic!("Expected concrete rule, got {:?}", other),
            })
            .collect();

        assert_eq!(ports, vec![1, 2, 2, 3, 4, 4, 5]);
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let catalog = catalog(&[("A", &["g1"]), ("B", &["g1", "g2"])]);
        let policy = FirewallPolicy::from_yaml_str(
            "firewall:\n  inbound:\n    - {port: 22, proto: tcp, acl_group: g1}\n    - {port: any, proto: icmp, host: any}\n    - {port: 53, proto: udp, acl_group: g2}\n",
        )
        .unwrap();

        let once = expand_policy(&policy, &catalog);
        let twice = expand_policy(&once, &catalog);

        assert!(!once.has_symbolic_rules());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_input_policy_untouched() {
        let catalog = catalog(&[("A", &["g1"])]);
        let policy = FirewallPolicy::from_yaml_str(
            "firewall:\n  inbound:\n    - {port: 22, proto: tcp, acl_group: g1}\n",
        )
        .unwrap();
        let before = policy.clone();

        let _ = expand_policy(&policy, &catalog);

        assert_eq!(policy, before);
    }

    #[test]
    fn test_passthrough_rules_copied() {
        let catalog = catalog(&[]);
        let policy = FirewallPolicy::from_yaml_str(
            "firewall:\n  inbound:\n    - {port: any, proto: any, groups: [laptop]}\n",
        )
        .unwrap();

        let expanded = expand_policy(&policy, &catalog);
        assert_eq!(expanded.inbound_rules(), policy.inbound_rules());
    }

    #[test]
    fn test_expand_file() {
        let temp_dir = TempDir::new().unwrap();
        let profiles = temp_dir.path().join("profiles.yml");
        let source = temp_dir.path().join("template.yml");
        let destination = temp_dir.path().join("config.yml");

        fs::write(
            &profiles,
            "A:\n  attributes: [admin]\n  ip: 10.0.0.1/24\n  validity: 1\n  acl_groups: [g1]\n",
        )
        .unwrap();
        fs::write(
            &source,
            "firewall:\n  inbound:\n    - {port: 22, proto: tcp, acl_group: g1}\n",
        )
        .unwrap();

        expand_file(&profiles, &source, &destination).unwrap();

        let written = fs::read_to_string(&destination).unwrap();
        assert!(written.contains("host: A"));
        assert!(!written.contains("acl_group"));
    }
}
