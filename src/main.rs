//! nutils CLI application.
//!
//! This binary provides a command-line interface for issuing Nebula
//! certificates from device profiles and expanding ACL groups in Nebula
//! firewall configuration.

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use nutils::authority::nebula_cert::DEFAULT_BINARY;
use nutils::authority::{
    AuthorityConfig, AuthorityCredentials, DryRunAuthority, NebulaCert, SigningAuthority,
};
use nutils::error::Result;
use nutils::firewall::expand_file;
use nutils::issue::{
    issue_all, prepare_output_dir, BatchPolicy, CertificateIssuer, IssueOutputs,
    DEFAULT_CERT_DIR,
};
use nutils::profile::catalog::DEFAULT_PROFILES_FILENAME;
use nutils::profile::{load_catalog, DeviceProfile};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "nutils", version)]
#[command(about = "Maintenance utilities for a Nebula PKI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the nebula-cert binary
    #[arg(long, env = "NEBULA_CERT", default_value = DEFAULT_BINARY, global = true)]
    nebula_cert: PathBuf,

    /// Kill nebula-cert and fail when a single invocation runs longer than this
    #[arg(long, env = "NUTILS_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue Nebula certificates for profiled devices
    #[command(subcommand)]
    Issue(IssueCommands),

    /// Manage the firewall section of a Nebula configuration
    #[command(subcommand)]
    Firewall(FirewallCommands),

    /// Inspect the device profile catalog
    #[command(subcommand)]
    Profiles(ProfileCommands),
}

#[derive(Subcommand)]
enum IssueCommands {
    /// Issue a key pair and certificate for one device
    Device {
        /// Name of the device in the profile document
        device_name: String,

        /// Output private key (default: <DEVICE_NAME>.key)
        #[arg(long)]
        private: Option<PathBuf>,

        /// Output certificate (default: <DEVICE_NAME>.crt)
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Output QR code (default: <DEVICE_NAME>.png)
        #[arg(long)]
        qrcode: Option<PathBuf>,

        #[command(flatten)]
        authority: AuthorityArgs,
    },

    /// Issue key pairs and certificates for every profiled device
    All {
        /// Directory for the generated keys, certificates and QR codes
        #[arg(long, alias = "cert_dir", default_value = DEFAULT_CERT_DIR)]
        cert_dir: PathBuf,

        /// Continue with the remaining devices after a failure
        #[arg(long)]
        keep_going: bool,

        #[command(flatten)]
        authority: AuthorityArgs,
    },
}

#[derive(Args)]
struct AuthorityArgs {
    /// CA private key used for signing
    #[arg(long, default_value = "ca.key")]
    ca_key: PathBuf,

    /// CA certificate used for signing
    #[arg(long, default_value = "ca.crt")]
    ca_crt: PathBuf,

    /// Device profile document
    #[arg(long, default_value = DEFAULT_PROFILES_FILENAME)]
    profiles: PathBuf,

    /// Print the nebula-cert commands instead of running them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum FirewallCommands {
    /// Replace acl_group rules with one rule per member device
    Expand {
        /// Device profile document
        #[arg(long, default_value = DEFAULT_PROFILES_FILENAME)]
        profiles: PathBuf,

        /// Nebula configuration containing acl_group rules
        source: PathBuf,

        /// Where to write the expanded configuration
        destination: PathBuf,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// List every profiled device
    List {
        /// Device profile document
        #[arg(long, default_value = DEFAULT_PROFILES_FILENAME)]
        profiles: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct ProfileRow<'a> {
    name: &'a str,
    #[serde(flatten)]
    profile: &'a DeviceProfile,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let authority_config = AuthorityConfig {
        binary: cli.nebula_cert,
        timeout: cli.timeout_secs.map(Duration::from_secs),
    };

    let outcome = match cli.command {
        Commands::Issue(issue_cmd) => handle_issue_command(issue_cmd, authority_config),
        Commands::Firewall(firewall_cmd) => handle_firewall_command(firewall_cmd),
        Commands::Profiles(profile_cmd) => handle_profile_command(profile_cmd),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    }
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();
}

fn select_authority(config: AuthorityConfig, dry_run: bool) -> Box<dyn SigningAuthority> {
    if dry_run {
        Box::new(DryRunAuthority::new(config.binary))
    } else {
        Box::new(NebulaCert::new(config))
    }
}

/// Returns `Ok(false)` when a device failed and its message has been printed.
fn handle_issue_command(cmd: IssueCommands, config: AuthorityConfig) -> Result<bool> {
    match cmd {
        IssueCommands::Device {
            device_name,
            private,
            cert,
            qrcode,
            authority,
        } => {
            println!("Issuing certificate for {}", device_name);

            let defaults = IssueOutputs::for_device(&device_name);
            let outputs = IssueOutputs {
                key_path: private.unwrap_or(defaults.key_path),
                cert_path: cert.unwrap_or(defaults.cert_path),
                qr_path: qrcode.unwrap_or(defaults.qr_path),
            };

            let catalog = load_catalog(&authority.profiles)?;
            let issuer = CertificateIssuer::new(
                select_authority(config, authority.dry_run),
                AuthorityCredentials::new(authority.ca_key, authority.ca_crt),
                &catalog,
            );

            let result = issuer.issue(&device_name, &outputs);
            if !result.success {
                eprintln!("{}", result.message);
                return Ok(false);
            }

            Ok(true)
        }

        IssueCommands::All {
            cert_dir,
            keep_going,
            authority,
        } => {
            let catalog = load_catalog(&authority.profiles)?;
            if !authority.dry_run {
                prepare_output_dir(&cert_dir)?;
            }

            let issuer = CertificateIssuer::new(
                select_authority(config, authority.dry_run),
                AuthorityCredentials::new(authority.ca_key, authority.ca_crt),
                &catalog,
            );
            let policy = if keep_going {
                BatchPolicy::CollectAll
            } else {
                BatchPolicy::FailFast
            };

            let results = issue_all(&issuer, &cert_dir, policy, |device_name| {
                println!("Issuing certificate for {}", device_name)
            });

            let mut all_succeeded = true;
            for result in results.iter().filter(|r| !r.success) {
                eprintln!("ERROR: {}", result);
                all_succeeded = false;
            }

            Ok(all_succeeded)
        }
    }
}

fn handle_firewall_command(cmd: FirewallCommands) -> Result<bool> {
    match cmd {
        FirewallCommands::Expand {
            profiles,
            source,
            destination,
        } => {
            println!("Expanding {}", source.display());
            expand_file(&profiles, &source, &destination)?;
            Ok(true)
        }
    }
}

fn handle_profile_command(cmd: ProfileCommands) -> Result<bool> {
    match cmd {
        ProfileCommands::List { profiles, json } => {
            let catalog = load_catalog(&profiles)?;

            if json {
                let rows: Vec<ProfileRow> = catalog
                    .iter()
                    .map(|(name, profile)| ProfileRow { name, profile })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if catalog.is_empty() {
                println!("No device profiles found.");
            } else {
                println!(
                    "{:<20} {:<20} {:<9} {:<30} ACL groups",
                    "Device", "IP", "Validity", "Groups"
                );
                println!("{}", "-".repeat(95));

                for (name, profile) in catalog.iter() {
                    println!(
                        "{:<20} {:<20} {:<9} {:<30} {}",
                        name,
                        profile.network_address,
                        format!("{}y", profile.validity_years),
                        profile.signing_groups(),
                        profile.acl_groups.join(",")
                    );
                }
            }

            Ok(true)
        }
    }
}
