//! Profile catalog loading and lookup.
//!
//! The catalog is read once per invocation from a YAML mapping of device name
//! to profile and is immutable afterwards. Iteration follows document order,
//! which fixes the order of expanded firewall rules and of batch issuance.

use crate::error::{NutilsError, Result};
use crate::profile::device::DeviceProfile;
use indexmap::IndexMap;
use log::debug;
use std::fs;
use std::path::Path;

/// Default profile document name used by the CLI.
pub const DEFAULT_PROFILES_FILENAME: &str = "profiles.yml";

/// Device profiles keyed by device name, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileCatalog {
    profiles: IndexMap<String, DeviceProfile>,
}

impl ProfileCatalog {
    /// Parse a catalog from YAML text.
    ///
    /// An empty document yields an empty catalog.
    ///
    /// # Example
    ///
    /// ```
    /// use nutils::profile::catalog::ProfileCatalog;
    ///
    /// let catalog = ProfileCatalog::from_yaml_str(
    ///     "gateway:\n  attributes: [infra]\n  ip: 192.168.100.1/24\n  validity: 1\n  acl_groups: [ssh]\n",
    /// ).unwrap();
    /// assert_eq!(catalog.len(), 1);
    /// assert_eq!(catalog.members_of("ssh"), vec!["gateway"]);
    /// ```
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(contents)
            .map_err(|e| NutilsError::ParseError(format!("profile document: {}", e)))?;

        let mapping = match document {
            serde_yaml::Value::Null => return Ok(Self::default()),
            serde_yaml::Value::Mapping(mapping) => mapping,
            _ => {
                return Err(NutilsError::ParseError(
                    "profile document must be a mapping of device names".to_string(),
                ))
            }
        };

        let mut profiles = IndexMap::with_capacity(mapping.len());
        for (key, value) in mapping {
            let device_name = match key {
                serde_yaml::Value::String(name) => name,
                other => {
                    return Err(NutilsError::SchemaError(format!(
                        "device name must be a string, found {:?}",
                        other
                    )))
                }
            };

            let profile = DeviceProfile::from_value(&device_name, value)?;
            profiles.insert(device_name, profile);
        }

        Ok(Self { profiles })
    }

    /// Look up the profile for a device.
    pub fn get(&self, device_name: &str) -> Option<&DeviceProfile> {
        self.profiles.get(device_name)
    }

    /// Iterate over `(device name, profile)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeviceProfile)> {
        self.profiles
            .iter()
            .map(|(name, profile)| (name.as_str(), profile))
    }

    /// Device names in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Names of the devices belonging to an ACL group, in document order.
    pub fn members_of(&self, group: &str) -> Vec<&str> {
        self.iter()
            .filter(|(_, profile)| profile.in_acl_group(group))
            .map(|(name, _)| name)
            .collect()
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the catalog holds no profiles.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl FromIterator<(String, DeviceProfile)> for ProfileCatalog {
    fn from_iter<I: IntoIterator<Item = (String, DeviceProfile)>>(iter: I) -> Self {
        Self {
            profiles: iter.into_iter().collect(),
        }
    }
}

/// Load the profile catalog from a YAML file.
///
/// # Errors
///
/// * `NotFoundError` if `path` does not exist
/// * `ParseError` if the document is not a YAML mapping
/// * `SchemaError` if a profile is missing a required field or holds an invalid value
///
/// # Example
///
/// ```rust,no_run
/// use nutils::profile::catalog::load_catalog;
/// use std::path::Path;
///
/// # fn example() -> nutils::error::Result<()> {
/// let catalog = load_catalog(Path::new("profiles.yml"))?;
/// for (name, profile) in catalog.iter() {
///     println!("{} -> {}", name, profile.network_address);
/// }
/// # Ok(())
/// # }
/// ```
pub fn load_catalog(path: &Path) -> Result<ProfileCatalog> {
    if !path.exists() {
        return Err(NutilsError::NotFoundError(format!(
            "profile document {} not found",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(NutilsError::StorageError)?;
    let catalog = ProfileCatalog::from_yaml_str(&contents)?;

    debug!(
        "loaded {} device profiles from {}",
        catalog.len(),
        path.display()
    );
    Ok(catalog)
}
