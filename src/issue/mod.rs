//! Certificate issuance module.
//!
//! This module turns device profiles into Nebula key pairs and signed
//! certificates, one device at a time or for the whole catalog.

pub mod batch;
pub mod issuer;

use std::fmt;
use std::path::{Path, PathBuf};

pub use batch::{issue_all, prepare_output_dir, BatchPolicy};
pub use issuer::CertificateIssuer;

/// Default directory for `issue all` output.
pub const DEFAULT_CERT_DIR: &str = "generated-certs";

/// Where the artifacts for one device are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueOutputs {
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
    pub qr_path: PathBuf,
}

impl IssueOutputs {
    /// `<name>.key`, `<name>.crt` and `<name>.png` inside `dir`.
    ///
    /// # Example
    ///
    /// ```
    /// use nutils::issue::IssueOutputs;
    /// use std::path::Path;
    ///
    /// let outputs = IssueOutputs::in_dir(Path::new("certs"), "gateway");
    /// assert_eq!(outputs.cert_path, Path::new("certs/gateway.crt"));
    /// ```
    pub fn in_dir(dir: &Path, device_name: &str) -> Self {
        Self {
            key_path: dir.join(format!("{}.key", device_name)),
            cert_path: dir.join(format!("{}.crt", device_name)),
            qr_path: dir.join(format!("{}.png", device_name)),
        }
    }

    /// The [`in_dir`](Self::in_dir) layout relative to the working directory.
    pub fn for_device(device_name: &str) -> Self {
        Self::in_dir(Path::new(""), device_name)
    }
}

/// Outcome of issuing one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceResult {
    pub device_name: String,
    pub success: bool,
    /// Empty on success, otherwise the failure reason.
    pub message: String,
}

impl IssuanceResult {
    pub fn succeeded(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            success: true,
            message: String::new(),
        }
    }

    pub fn failed(device_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            success: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for IssuanceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(f, "{} - issued", self.device_name)
        } else {
            write!(f, "{} - {}", self.device_name, self.message)
        }
    }
}
