//! Device profile records.
//!
//! A device profile describes what the signing authority needs to know about
//! one device: its attributes (signed into the certificate as groups), its
//! overlay address, how long its certificate lives, and which ACL groups it
//! belongs to for firewall expansion.

use crate::error::{NutilsError, Result};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

/// Hours in a certificate-validity year. No leap-year adjustment.
pub const HOURS_PER_YEAR: u64 = 8760;

/// Profile of a single device, as declared in the profile document.
///
/// Built from the document by [`DeviceProfile::from_value`], which checks
/// every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceProfile {
    /// Capability/role tags, signed into the certificate as Nebula groups.
    pub attributes: Vec<String>,

    /// Overlay address in CIDR notation, e.g. `192.168.100.5/24`.
    #[serde(rename = "ip")]
    pub network_address: String,

    /// Certificate validity in whole years.
    #[serde(rename = "validity")]
    pub validity_years: u64,

    /// Symbolic firewall groups this device belongs to.
    #[serde(default)]
    pub acl_groups: Vec<String>,
}

/// Document form of a profile before required fields are checked.
#[derive(Debug, Deserialize)]
struct RawProfile {
    attributes: Option<Vec<String>>,
    ip: Option<String>,
    validity: Option<u64>,
    #[serde(default)]
    acl_groups: Vec<String>,
}

impl DeviceProfile {
    /// Build a profile from its document value, checking every required field.
    ///
    /// # Example
    ///
    /// ```
    /// use nutils::profile::device::DeviceProfile;
    ///
    /// let value: serde_yaml::Value = serde_yaml::from_str(
    ///     "attributes: [admin]\nip: 192.168.100.2/24\nvalidity: 1\n",
    /// ).unwrap();
    /// let profile = DeviceProfile::from_value("laptop", value).unwrap();
    /// assert_eq!(profile.duration_hours(), 8760);
    /// assert!(profile.acl_groups.is_empty());
    /// ```
    pub fn from_value(device_name: &str, value: serde_yaml::Value) -> Result<Self> {
        let raw: RawProfile = serde_yaml::from_value(value).map_err(|e| {
            NutilsError::SchemaError(format!("profile '{}': {}", device_name, e))
        })?;

        let attributes = raw
            .attributes
            .ok_or_else(|| missing_field(device_name, "attributes"))?;
        let network_address = raw.ip.ok_or_else(|| missing_field(device_name, "ip"))?;
        let validity_years = raw
            .validity
            .ok_or_else(|| missing_field(device_name, "validity"))?;

        validate_network_address(device_name, &network_address)?;

        if validity_years == 0 {
            return Err(NutilsError::SchemaError(format!(
                "profile '{}': validity must be at least one year",
                device_name
            )));
        }
        if validity_years.checked_mul(HOURS_PER_YEAR).is_none() {
            return Err(NutilsError::SchemaError(format!(
                "profile '{}': validity of {} years is out of range",
                device_name, validity_years
            )));
        }

        Ok(Self {
            attributes,
            network_address,
            validity_years,
            acl_groups: raw.acl_groups,
        })
    }

    /// Attributes joined into the comma-separated group list given to the signer.
    pub fn signing_groups(&self) -> String {
        self.attributes.join(",")
    }

    /// Certificate lifetime in hours.
    pub fn duration_hours(&self) -> u64 {
        // Range is checked when the profile is built.
        self.validity_years.saturating_mul(HOURS_PER_YEAR)
    }

    /// Whether this device belongs to the given ACL group.
    pub fn in_acl_group(&self, group: &str) -> bool {
        self.acl_groups.iter().any(|g| g == group)
    }
}

fn missing_field(device_name: &str, field: &str) -> NutilsError {
    NutilsError::SchemaError(format!(
        "profile '{}' is missing required field '{}'",
        device_name, field
    ))
}

fn validate_network_address(device_name: &str, address: &str) -> Result<()> {
    if !address.contains('/') {
        return Err(NutilsError::SchemaError(format!(
            "profile '{}': ip '{}' must be in CIDR notation",
            device_name, address
        )));
    }

    address.parse::<IpNetwork>().map_err(|e| {
        NutilsError::SchemaError(format!(
            "profile '{}': invalid ip '{}': {}",
            device_name, address, e
        ))
    })?;

    Ok(())
}
