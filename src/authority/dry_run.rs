//! Authority that reports commands instead of running them.

use crate::authority::nebula_cert::{keygen_args, sign_args, DEFAULT_BINARY};
use crate::authority::{SignRequest, SigningAuthority};
use crate::error::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Prints each `nebula-cert` command line to stdout and succeeds without
/// touching the filesystem.
#[derive(Debug, Clone)]
pub struct DryRunAuthority {
    binary: PathBuf,
}

impl DryRunAuthority {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Render a command line for display.
    pub fn command_line(&self, args: &[OsString]) -> String {
        std::iter::once(self.binary.as_os_str().to_string_lossy())
            .chain(args.iter().map(|arg| arg.to_string_lossy()))
            .map(|part| quote(&part))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for DryRunAuthority {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl SigningAuthority for DryRunAuthority {
    fn generate_key_pair(&self, private_key: &Path, public_key: &Path) -> Result<()> {
        println!("{}", self.command_line(&keygen_args(private_key, public_key)));
        Ok(())
    }

    fn sign_certificate(&self, request: &SignRequest) -> Result<()> {
        println!("{}", self.command_line(&sign_args(request)));
        Ok(())
    }
}

fn quote(part: &str) -> String {
    let plain = !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./,:=+@".contains(c));
    if plain {
        part.to_string()
    } else {
        format!("'{}'", part.replace('\'', r"'\''"))
    }
}
