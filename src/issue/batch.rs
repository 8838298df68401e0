//! Issuance over a whole profile catalog.

use crate::authority::SigningAuthority;
use crate::error::Result;
use crate::issue::{CertificateIssuer, IssuanceResult, IssueOutputs};
use log::{debug, error};
use std::fs;
use std::path::Path;

/// What to do after a device fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Stop at the first failure; later devices are not attempted.
    #[default]
    FailFast,
    /// Attempt every device and report every outcome.
    CollectAll,
}

/// Create the output directory (and parents) if it does not exist yet.
pub fn prepare_output_dir(out_dir: &Path) -> Result<()> {
    if !out_dir.exists() {
        debug!("creating output directory {}", out_dir.display());
        fs::create_dir_all(out_dir)?;
    }
    Ok(())
}

/// Issue a certificate for every device in the issuer's catalog, in catalog order.
///
/// Artifacts for device `d` land in `out_dir/d.key`, `out_dir/d.crt` and
/// `out_dir/d.png`. Under [`BatchPolicy::FailFast`] the failing device's result
/// is the last element of the returned sequence.
///
/// `on_start` is called with each device name before it is attempted.
pub fn issue_all<A, F>(
    issuer: &CertificateIssuer<'_, A>,
    out_dir: &Path,
    policy: BatchPolicy,
    mut on_start: F,
) -> Vec<IssuanceResult>
where
    A: SigningAuthority,
    F: FnMut(&str),
{
    let catalog = issuer.catalog();
    let mut results = Vec::with_capacity(catalog.len());

    for device_name in catalog.names() {
        on_start(device_name);

        let outputs = IssueOutputs::in_dir(out_dir, device_name);
        let result = issuer.issue(device_name, &outputs);
        let failed = !result.success;
        results.push(result);

        if failed && policy == BatchPolicy::FailFast {
            error!("stopping batch after failure of {}", device_name);
            break;
        }
    }

    results
}
