//! Signing authority module.
//!
//! Key generation and certificate signing are delegated to an external trust
//! authority. [`SigningAuthority`] is the capability the issuance workflow
//! needs from it; [`nebula_cert::NebulaCert`] provides it by running the
//! `nebula-cert` binary and [`dry_run::DryRunAuthority`] only reports the
//! commands that would run.

pub mod dry_run;
pub mod nebula_cert;

use crate::error::Result;
use std::path::{Path, PathBuf};

pub use dry_run::DryRunAuthority;
pub use nebula_cert::{AuthorityConfig, NebulaCert};

/// Location of the authority's own key and certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityCredentials {
    /// CA private key.
    pub key: PathBuf,
    /// CA certificate.
    pub cert: PathBuf,
}

impl AuthorityCredentials {
    pub fn new(key: impl Into<PathBuf>, cert: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            cert: cert.into(),
        }
    }
}

/// Everything the authority needs to sign one device certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    pub ca_key: PathBuf,
    pub ca_cert: PathBuf,
    pub duration_hours: u64,
    /// Comma-separated Nebula groups.
    pub groups: String,
    /// Device public key to sign.
    pub public_key: PathBuf,
    /// Device overlay address in CIDR notation.
    pub ip: String,
    pub name: String,
    pub out_cert: PathBuf,
    pub out_qr: PathBuf,
}

impl SignRequest {
    /// Certificate lifetime as passed on the command line, e.g. `17520h`.
    pub fn duration_arg(&self) -> String {
        format!("{}h", self.duration_hours)
    }
}

/// Key generation and signing operations of a trust authority.
///
/// Both calls block until the authority has finished.
pub trait SigningAuthority {
    /// Generate a fresh key pair, writing the private and public halves to the given paths.
    fn generate_key_pair(&self, private_key: &Path, public_key: &Path) -> Result<()>;

    /// Sign a device public key, writing the certificate and its QR code.
    fn sign_certificate(&self, request: &SignRequest) -> Result<()>;
}

impl<A: SigningAuthority + ?Sized> SigningAuthority for &A {
    fn generate_key_pair(&self, private_key: &Path, public_key: &Path) -> Result<()> {
        (**self).generate_key_pair(private_key, public_key)
    }

    fn sign_certificate(&self, request: &SignRequest) -> Result<()> {
        (**self).sign_certificate(request)
    }
}

impl<A: SigningAuthority + ?Sized> SigningAuthority for Box<A> {
    fn generate_key_pair(&self, private_key: &Path, public_key: &Path) -> Result<()> {
        (**self).generate_key_pair(private_key, public_key)
    }

    fn sign_certificate(&self, request: &SignRequest) -> Result<()> {
        (**self).sign_certificate(request)
    }
}
