//! Firewall rule model.
//!
//! Nebula inbound rules name their peer with one of several keys. This crate
//! adds one more, `acl_group`, which refers to every device whose profile lists
//! that group. A rule carrying `acl_group` is symbolic and must be expanded
//! before the policy is handed to Nebula; everything else is concrete.

use crate::error::{NutilsError, Result};
use serde_yaml::{Mapping, Value};

const PORT: &str = "port";
const PROTO: &str = "proto";
const HOST: &str = "host";
const ACL_GROUP: &str = "acl_group";

/// One entry of `firewall.inbound`.
#[derive(Debug, Clone, PartialEq)]
pub enum FirewallRule {
    /// Rule naming a single host.
    Concrete(ConcreteRule),

    /// Rule naming an ACL group, to be replaced by one concrete rule per member.
    Symbolic(SymbolicRule),

    /// Rule naming its peer some other way (`group`, `groups`, `cidr`, ...).
    /// Copied verbatim.
    Passthrough(Mapping),
}

/// `{port, proto, host}` plus any additional Nebula rule keys.
///
/// The rule is written back exactly as it was read, key order included.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcreteRule {
    port: Value,
    proto: String,
    host: String,
    document: Mapping,
}

/// `{port, proto, acl_group}` plus any additional Nebula rule keys.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicRule {
    pub port: Value,
    pub proto: String,
    pub acl_group: String,
    pub extra: Mapping,
}

impl ConcreteRule {
    /// A host rule with no extra keys.
    pub fn new(port: impl Into<Value>, proto: impl Into<String>, host: impl Into<String>) -> Self {
        let port = port.into();
        let proto = proto.into();
        let host = host.into();
        let document = rule_mapping(&port, &proto, HOST, &host, &Mapping::new());
        Self {
            port,
            proto,
            host,
            document,
        }
    }

    pub fn port(&self) -> &Value {
        &self.port
    }

    pub fn proto(&self) -> &str {
        &self.proto
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The rule as it appears in `firewall.inbound`.
    pub fn document(&self) -> &Mapping {
        &self.document
    }
}

impl SymbolicRule {
    /// A group rule with no extra keys.
    pub fn new(
        port: impl Into<Value>,
        proto: impl Into<String>,
        acl_group: impl Into<String>,
    ) -> Self {
        Self {
            port: port.into(),
            proto: proto.into(),
            acl_group: acl_group.into(),
            extra: Mapping::new(),
        }
    }

    /// The concrete rule this group rule becomes for one member host.
    ///
    /// Only `port` and `proto` carry over; extra keys are not copied.
    pub fn for_host(&self, host: &str) -> ConcreteRule {
        ConcreteRule::new(self.port.clone(), self.proto.clone(), host)
    }
}

impl FirewallRule {
    /// Parse a rule from its document value.
    ///
    /// `position` is the rule's index in `firewall.inbound`, used in errors.
    ///
    /// # Example
    ///
    /// ```
    /// use nutils::firewall::rule::FirewallRule;
    ///
    /// let value = serde_yaml::from_str("{port: 22, proto: tcp, acl_group: ssh}").unwrap();
    /// let rule = FirewallRule::from_value(0, value).unwrap();
    /// assert!(rule.is_symbolic());
    /// ```
    pub fn from_value(position: usize, value: Value) -> Result<Self> {
        let mapping = match value {
            Value::Mapping(mapping) => mapping,
            _ => {
                return Err(NutilsError::SchemaError(format!(
                    "inbound rule {} must be a mapping",
                    position
                )))
            }
        };

        let has_host = mapping.contains_key(HOST);
        let has_group = mapping.contains_key(ACL_GROUP);
        if has_host && has_group {
            return Err(NutilsError::SchemaError(format!(
                "inbound rule {} sets both '{}' and '{}'",
                position, HOST, ACL_GROUP
            )));
        }
        if !has_host && !has_group {
            return Ok(FirewallRule::Passthrough(mapping));
        }

        let document = mapping.clone();
        let mut port = None;
        let mut proto = None;
        let mut target = None;
        let mut extra = Mapping::new();
        for (key, value) in mapping {
            match key.as_str() {
                Some(PORT) => port = Some(value),
                Some(PROTO) => proto = Some(value),
                Some(HOST) | Some(ACL_GROUP) => target = Some(value),
                _ => {
                    extra.insert(key, value);
                }
            }
        }

        let port = port.ok_or_else(|| missing_key(position, PORT))?;
        let proto = string_field(position, PROTO, proto)?;

        if has_group {
            Ok(FirewallRule::Symbolic(SymbolicRule {
                port,
                proto,
                acl_group: string_field(position, ACL_GROUP, target)?,
                extra,
            }))
        } else {
            Ok(FirewallRule::Concrete(ConcreteRule {
                port,
                proto,
                host: string_field(position, HOST, target)?,
                document,
            }))
        }
    }

    /// Render the rule back into its document form.
    pub fn to_value(&self) -> Value {
        let mapping = match self {
            FirewallRule::Concrete(rule) => rule.document.clone(),
            FirewallRule::Symbolic(rule) => {
                rule_mapping(&rule.port, &rule.proto, ACL_GROUP, &rule.acl_group, &rule.extra)
            }
            FirewallRule::Passthrough(mapping) => mapping.clone(),
        };
        Value::Mapping(mapping)
    }

    /// Whether this rule still references an ACL group.
    pub fn is_symbolic(&self) -> bool {
        matches!(self, FirewallRule::Symbolic(_))
    }
}

impl From<ConcreteRule> for FirewallRule {
    fn from(rule: ConcreteRule) -> Self {
        FirewallRule::Concrete(rule)
    }
}

impl From<SymbolicRule> for FirewallRule {
    fn from(rule: SymbolicRule) -> Self {
        FirewallRule::Symbolic(rule)
    }
}

fn rule_mapping(port: &Value, proto: &str, target_key: &str, target: &str, extra: &Mapping) -> Mapping {
    let mut mapping = Mapping::new();
    mapping.insert(Value::from(PORT), port.clone());
    mapping.insert(Value::from(PROTO), Value::from(proto));
    mapping.insert(Value::from(target_key), Value::from(target));
    for (key, value) in extra {
        mapping.insert(key.clone(), value.clone());
    }
    mapping
}

fn missing_key(position: usize, key: &str) -> NutilsError {
    NutilsError::SchemaError(format!(
        "inbound rule {} is missing '{}'",
        position, key
    ))
}

fn string_field(position: usize, key: &str, value: Option<Value>) -> Result<String> {
    match value {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(NutilsError::SchemaError(format!(
            "inbound rule {}: '{}' must be a string",
            position, key
        ))),
        None => Err(missing_key(position, key)),
    }
}
