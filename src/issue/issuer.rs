//! Single-device certificate issuance.

use crate::authority::{AuthorityCredentials, SignRequest, SigningAuthority};
use crate::error::Result;
use crate::issue::{IssuanceResult, IssueOutputs};
use crate::profile::catalog::ProfileCatalog;
use crate::profile::device::DeviceProfile;
use log::{info, warn};
use std::path::Path;

const SCRATCH_PUBLIC_KEY: &str = "device-temp.pub";

/// Issues certificates for devices in a profile catalog through a signing authority.
///
/// # Example
///
/// ```rust,no_run
/// use nutils::authority::{AuthorityConfig, AuthorityCredentials, NebulaCert};
/// use nutils::issue::{CertificateIssuer, IssueOutputs};
/// use nutils::profile::load_catalog;
/// use std::path::Path;
///
/// # fn example() -> nutils::error::Result<()> {
/// let catalog = load_catalog(Path::new("profiles.yml"))?;
/// let issuer = CertificateIssuer::new(
///     NebulaCert::new(AuthorityConfig::default()),
///     AuthorityCredentials::new("ca.key", "ca.crt"),
///     &catalog,
/// );
///
/// let result = issuer.issue("gateway", &IssueOutputs::for_device("gateway"));
/// assert!(result.success, "{}", result.message);
/// # Ok(())
/// # }
/// ```
pub struct CertificateIssuer<'a, A> {
    authority: A,
    credentials: AuthorityCredentials,
    catalog: &'a ProfileCatalog,
}

impl<'a, A: SigningAuthority> CertificateIssuer<'a, A> {
    pub fn new(authority: A, credentials: AuthorityCredentials, catalog: &'a ProfileCatalog) -> Self {
        Self {
            authority,
            credentials,
            catalog,
        }
    }

    /// The catalog devices are looked up in.
    pub fn catalog(&self) -> &'a ProfileCatalog {
        self.catalog
    }

    /// Build the signing parameters for a device.
    pub fn sign_request(
        &self,
        device_name: &str,
        profile: &DeviceProfile,
        public_key: &Path,
        outputs: &IssueOutputs,
    ) -> SignRequest {
        SignRequest {
            ca_key: self.credentials.key.clone(),
            ca_cert: self.credentials.cert.clone(),
            duration_hours: profile.duration_hours(),
            groups: profile.signing_groups(),
            public_key: public_key.to_path_buf(),
            ip: profile.network_address.clone(),
            name: device_name.to_string(),
            out_cert: outputs.cert_path.clone(),
            out_qr: outputs.qr_path.clone(),
        }
    }

    /// Generate a key pair for `device_name` and have it signed.
    ///
    /// Never panics or returns early with an error: every failure is reported
    /// in the returned [`IssuanceResult`].
    pub fn issue(&self, device_name: &str, outputs: &IssueOutputs) -> IssuanceResult {
        // Unknown devices fail before anything touches the filesystem.
        let Some(profile) = self.catalog.get(device_name) else {
            warn!("no profile for device {}", device_name);
            return IssuanceResult::failed(
                device_name,
                format!("Failed to find profile for {}", device_name),
            );
        };

        match self.try_issue(device_name, profile, outputs) {
            Ok(()) => {
                info!(
                    "issued certificate for {} ({})",
                    device_name,
                    outputs.cert_path.display()
                );
                IssuanceResult::succeeded(device_name)
            }
            Err(e) => {
                warn!("issuance for {} failed: {}", device_name, e);
                IssuanceResult::failed(device_name, e.to_string())
            }
        }
    }

    fn try_issue(
        &self,
        device_name: &str,
        profile: &DeviceProfile,
        outputs: &IssueOutputs,
    ) -> Result<()> {
        // The public key is only needed until signing finishes; the directory
        // and everything in it is removed when `scratch` drops.
        let scratch = tempfile::Builder::new().prefix("nutils-").tempdir()?;
        let public_key = scratch.path().join(SCRATCH_PUBLIC_KEY);

        info!("generating key pair for {}", device_name);
        self.authority
            .generate_key_pair(&outputs.key_path, &public_key)?;

        let request = self.sign_request(device_name, profile, &public_key, outputs);
        info!(
            "signing {} (ip {}, groups '{}', duration {})",
            device_name,
            request.ip,
            request.groups,
            request.duration_arg()
        );
        self.authority.sign_certificate(&request)?;

        if let Err(e) = scratch.close() {
            warn!("could not remove scratch directory: {}", e);
        }
        Ok(())
    }
}
