//! Firewall policy documents.
//!
//! A policy is a full Nebula configuration document. Only `firewall.inbound`
//! is interpreted; everything else is carried through unchanged.

use crate::error::{NutilsError, Result};
use crate::firewall::rule::FirewallRule;
use log::debug;
use serde_yaml::Value;
use std::fs;
use std::path::Path;

const FIREWALL: &str = "firewall";
const INBOUND: &str = "inbound";

/// A Nebula configuration document with its parsed inbound rules.
#[derive(Debug, Clone, PartialEq)]
pub struct FirewallPolicy {
    document: Value,
    inbound: Vec<FirewallRule>,
}

impl FirewallPolicy {
    /// Parse a policy from YAML text.
    ///
    /// # Example
    ///
    /// ```
    /// use nutils::firewall::policy::FirewallPolicy;
    ///
    /// let policy = FirewallPolicy::from_yaml_str(
    ///     "firewall:\n  inbound:\n    - {port: 22, proto: tcp, acl_group: ssh}\n",
    /// ).unwrap();
    /// assert_eq!(policy.inbound_rules().len(), 1);
    /// ```
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(contents)
            .map_err(|e| NutilsError::ParseError(format!("policy document: {}", e)))?;

        if !document.is_mapping() {
            return Err(NutilsError::ParseError(
                "policy document must be a mapping".to_string(),
            ));
        }

        let firewall = document
            .get(FIREWALL)
            .ok_or_else(|| NutilsError::SchemaError("policy has no 'firewall' section".to_string()))?;
        if !firewall.is_mapping() {
            return Err(NutilsError::SchemaError(
                "'firewall' must be a mapping".to_string(),
            ));
        }

        let rules = match firewall.get(INBOUND) {
            Some(Value::Sequence(rules)) => rules.clone(),
            Some(Value::Null) => Vec::new(),
            Some(_) => {
                return Err(NutilsError::SchemaError(
                    "'firewall.inbound' must be a sequence".to_string(),
                ))
            }
            None => {
                return Err(NutilsError::SchemaError(
                    "policy has no 'firewall.inbound' rules".to_string(),
                ))
            }
        };

        let inbound = rules
            .into_iter()
            .enumerate()
            .map(|(position, rule)| FirewallRule::from_value(position, rule))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { document, inbound })
    }

    /// The inbound rules, in document order.
    pub fn inbound_rules(&self) -> &[FirewallRule] {
        &self.inbound
    }

    /// A copy of this policy with its inbound rules replaced.
    pub fn with_inbound_rules(&self, inbound: Vec<FirewallRule>) -> Self {
        Self {
            document: self.document.clone(),
            inbound,
        }
    }

    /// Whether any inbound rule still references an ACL group.
    pub fn has_symbolic_rules(&self) -> bool {
        self.inbound.iter().any(FirewallRule::is_symbolic)
    }

    /// Render the full document, with `firewall.inbound` taken from the parsed rules.
    pub fn to_value(&self) -> Value {
        let mut document = self.document.clone();
        let rules = Value::Sequence(self.inbound.iter().map(FirewallRule::to_value).collect());

        if let Some(firewall) = document
            .get_mut(FIREWALL)
            .and_then(Value::as_mapping_mut)
        {
            firewall.insert(Value::from(INBOUND), rules);
        }
        document
    }

    /// Render the full document as YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.to_value())?)
    }
}

/// Load a policy document from disk.
///
/// # Errors
///
/// * `NotFoundError` if `path` does not exist
/// * `ParseError` if the document is not a YAML mapping
/// * `SchemaError` if `firewall.inbound` is missing or a rule is malformed
pub fn load_policy(path: &Path) -> Result<FirewallPolicy> {
    if !path.exists() {
        return Err(NutilsError::NotFoundError(format!(
            "policy document {} not found",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path)?;
    let policy = FirewallPolicy::from_yaml_str(&contents)?;

    debug!(
        "loaded {} inbound rules from {}",
        policy.inbound_rules().len(),
        path.display()
    );
    Ok(policy)
}

/// Write a policy document to disk, replacing any existing file.
pub fn save_policy(policy: &FirewallPolicy, path: &Path) -> Result<()> {
    let yaml = policy.to_yaml_string()?;
    fs::write(path, yaml)?;
    Ok(())
}
