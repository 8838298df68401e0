//! `nebula-cert` process driver.
//!
//! Each operation is one blocking invocation of the binary, driven on a
//! current-thread tokio runtime so an optional timeout can cancel it. A
//! non-zero exit status is reported as [`NutilsError::ExternalToolError`]
//! carrying whatever the tool wrote to stderr (or stdout when stderr is empty).

use crate::authority::{SignRequest, SigningAuthority};
use crate::error::{NutilsError, Result};
use log::debug;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Builder;
use tokio::time::timeout;

/// Program name used when no explicit path is configured.
pub const DEFAULT_BINARY: &str = "nebula-cert";

/// How to run the authority binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityConfig {
    /// Program to execute; looked up on `PATH` when not absolute.
    pub binary: PathBuf,
    /// Kill the process and fail when it runs longer than this. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            timeout: None,
        }
    }
}

/// [`SigningAuthority`] backed by the `nebula-cert` command line tool.
#[derive(Debug, Clone, Default)]
pub struct NebulaCert {
    config: AuthorityConfig,
}

impl NebulaCert {
    pub fn new(config: AuthorityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    fn run(&self, operation: &str, args: Vec<OsString>) -> Result<()> {
        let tool = format!("{} {}", self.config.binary.display(), operation);
        debug!("running {} {:?}", self.config.binary.display(), args);

        let runtime = Builder::new_current_thread().enable_all().build()?;
        let output = runtime.block_on(self.output(&tool, &args))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            if !stdout.trim().is_empty() {
                debug!("{}: {}", tool, stdout.trim());
            }
            return Ok(());
        }

        let diagnostic = [stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|text| !text.is_empty())
            .unwrap_or("no diagnostic output")
            .to_string();

        Err(NutilsError::ExternalToolError {
            tool,
            status: output.status.to_string(),
            diagnostic,
        })
    }

    /// Run the binary to completion. The child is killed when the timeout
    /// elapses and its output future is dropped.
    async fn output(&self, tool: &str, args: &[OsString]) -> Result<Output> {
        let child = Command::new(&self.config.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| NutilsError::ExternalToolError {
                tool: tool.to_string(),
                status: "not started".to_string(),
                diagnostic: e.to_string(),
            })?;

        let output = child.wait_with_output();
        let output = match self.config.timeout {
            Some(limit) => timeout(limit, output)
                .await
                .map_err(|_| NutilsError::TimeoutError {
                    tool: tool.to_string(),
                    after: limit,
                })??,
            None => output.await?,
        };

        Ok(output)
    }
}

impl SigningAuthority for NebulaCert {
    fn generate_key_pair(&self, private_key: &Path, public_key: &Path) -> Result<()> {
        self.run("keygen", keygen_args(private_key, public_key))
    }

    fn sign_certificate(&self, request: &SignRequest) -> Result<()> {
        self.run("sign", sign_args(request))
    }
}

/// Arguments of `nebula-cert keygen`.
pub fn keygen_args(private_key: &Path, public_key: &Path) -> Vec<OsString> {
    vec![
        "keygen".into(),
        "--out-key".into(),
        private_key.into(),
        "--out-pub".into(),
        public_key.into(),
    ]
}

/// Arguments of `nebula-cert sign`.
pub fn sign_args(request: &SignRequest) -> Vec<OsString> {
    vec![
        "sign".into(),
        "-ca-crt".into(),
        request.ca_cert.as_os_str().into(),
        "-ca-key".into(),
        request.ca_key.as_os_str().into(),
        "-duration".into(),
        request.duration_arg().into(),
        "-groups".into(),
        request.groups.as_str().into(),
        "-in-pub".into(),
        request.public_key.as_os_str().into(),
        "-ip".into(),
        request.ip.as_str().into(),
        "-name".into(),
        request.name.as_str().into(),
        "-out-crt".into(),
        request.out_cert.as_os_str().into(),
        "-out-qr".into(),
        request.out_qr.as_os_str().into(),
    ]
}
