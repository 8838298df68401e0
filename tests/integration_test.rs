//! Integration tests for nebula-utils.
//!
//! These tests verify the complete workflows of the system through the
//! public library API, with a recording authority in place of `nebula-cert`.

use nutils::authority::{AuthorityCredentials, SignRequest, SigningAuthority};
use nutils::error::{NutilsError, Result};
use nutils::firewall::{expand_policy, load_policy, save_policy, FirewallPolicy, FirewallRule};
use nutils::issue::{issue_all, BatchPolicy, CertificateIssuer, IssuanceResult, IssueOutputs};
use nutils::profile::{load_catalog, ProfileCatalog};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Records sign requests and refuses to sign one named device.
#[derive(Default)]
struct RecordingAuthority {
    keygens: RefCell<usize>,
    signed: RefCell<Vec<SignRequest>>,
    refuse: Option<String>,
}

impl SigningAuthority for RecordingAuthority {
    fn generate_key_pair(&self, private_key: &Path, public_key: &Path) -> Result<()> {
        *self.keygens.borrow_mut() += 1;
        fs::write(private_key, "key")?;
        fs::write(public_key, "pub")?;
        Ok(())
    }

    fn sign_certificate(&self, request: &SignRequest) -> Result<()> {
        self.signed.borrow_mut().push(request.clone());
        if self.refuse.as_deref() == Some(request.name.as_str()) {
            return Err(NutilsError::ExternalToolError {
                tool: "nebula-cert sign".to_string(),
                status: "exit status: 1".to_string(),
                diagnostic: "refused".to_string(),
            });
        }
        fs::write(&request.out_cert, "crt")?;
        fs::write(&request.out_qr, "png")?;
        Ok(())
    }
}

fn hosts(policy: &FirewallPolicy) -> Vec<(String, String)> {
    policy
        .inbound_rules()
        .iter()
        .map(|rule| match rule {
            FirewallRule::Concrete(rule) => (
                serde_yaml::to_string(rule.port()).unwrap().trim().to_string(),
                rule.host().to_string(),
            ),
            other => panic!("Expected concrete rule, got {:?}", other),
        })
        .collect()
}

#[test]
fn test_expand_two_group_scenario() -> Result<()> {
    let catalog = ProfileCatalog::from_yaml_str(
        "\
A:
  attributes: [x]
  ip: 192.168.100.1/24
  validity: 1
  acl_groups: [g1]
B:
  attributes: [x]
  ip: 192.168.100.2/24
  validity: 1
  acl_groups: [g2]
",
    )?;
    let policy = FirewallPolicy::from_yaml_str(
        "\
firewall:
  inbound:
    - {port: 22, proto: tcp, acl_group: g1}
    - {port: 443, proto: tcp, host: Z}
",
    )?;

    let expanded = expand_policy(&policy, &catalog);

    let expected = FirewallPolicy::from_yaml_str(
        "\
firewall:
  inbound:
    - {port: 22, proto: tcp, host: A}
    - {port: 443, proto: tcp, host: Z}
",
    )?;
    assert_eq!(expanded.to_value(), expected.to_value());
    Ok(())
}

#[test]
fn test_expand_group_without_members() -> Result<()> {
    let catalog = ProfileCatalog::from_yaml_str(
        "A:\n  attributes: [x]\n  ip: 192.168.100.1/24\n  validity: 1\n  acl_groups: [g1]\n",
    )?;
    let policy = FirewallPolicy::from_yaml_str(
        "\
firewall:
  inbound:
    - {port: 80, proto: tcp, host: web}
    - {port: 22, proto: tcp, acl_group: g2}
    - {port: 443, proto: tcp, host: Z}
",
    )?;

    let expanded = expand_policy(&policy, &catalog);

    assert_eq!(
        hosts(&expanded),
        vec![
            ("80".to_string(), "web".to_string()),
            ("443".to_string(), "Z".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn test_expand_file_round_trip_preserves_document() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let profiles = temp_dir.path().join("profiles.yml");
    let source = temp_dir.path().join("config.template.yml");
    let destination = temp_dir.path().join("config.yml");

    fs::write(
        &profiles,
        "\
laptop:
  attributes: [admin]
  ip: 192.168.100.20/24
  validity: 1
  acl_groups: [ssh]
server:
  attributes: [infra]
  ip: 192.168.100.21/24
  validity: 2
  acl_groups: [ssh, web]
",
    )?;
    fs::write(
        &source,
        "\
pki:
  ca: /etc/nebula/ca.crt
  cert: /etc/nebula/host.crt
static_host_map:
  \"192.168.100.1\": [\"100.64.22.11:4242\"]
firewall:
  conntrack:
    tcp_timeout: 12m
  outbound:
    - {port: any, proto: any, host: any}
  inbound:
    - {port: any, proto: icmp, host: any}
    - {port: 22, proto: tcp, acl_group: ssh}
    - {port: 443, proto: tcp, acl_group: web}
",
    )?;

    let catalog = load_catalog(&profiles)?;
    let policy = load_policy(&source)?;
    save_policy(&expand_policy(&policy, &catalog), &destination)?;

    let written = load_policy(&destination)?;
    assert!(!written.has_symbolic_rules());
    assert_eq!(
        hosts(&written),
        vec![
            ("any".to_string(), "any".to_string()),
            ("22".to_string(), "laptop".to_string()),
            ("22".to_string(), "server".to_string()),
            ("443".to_string(), "server".to_string()),
        ]
    );

    let before = policy.to_value();
    let after = written.to_value();
    for key in ["pki", "static_host_map"] {
        assert_eq!(before.get(key), after.get(key));
    }
    assert_eq!(
        before.get("firewall").and_then(|f| f.get("conntrack")),
        after.get("firewall").and_then(|f| f.get("conntrack"))
    );
    Ok(())
}

#[test]
fn test_issue_device_signing_parameters() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let catalog = ProfileCatalog::from_yaml_str(
        "cam:\n  attributes: [admin, iot]\n  ip: 192.168.100.9/24\n  validity: 2\n",
    )?;
    let authority = RecordingAuthority::default();
    let issuer = CertificateIssuer::new(
        &authority,
        AuthorityCredentials::new("ca.key", "ca.crt"),
        &catalog,
    );

    let outputs = IssueOutputs::in_dir(temp_dir.path(), "cam");
    let result = issuer.issue("cam", &outputs);

    assert_eq!(result, IssuanceResult::succeeded("cam"));
    let signed = authority.signed.borrow();
    assert_eq!(signed[0].duration_arg(), "17520h");
    assert_eq!(signed[0].groups, "admin,iot");
    assert!(!signed[0].public_key.exists());
    assert!(outputs.key_path.exists());
    assert!(outputs.cert_path.exists());
    assert!(outputs.qr_path.exists());
    Ok(())
}

#[test]
fn test_issue_unknown_device_has_no_side_effects() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let catalog = ProfileCatalog::from_yaml_str(
        "cam:\n  attributes: [iot]\n  ip: 192.168.100.9/24\n  validity: 1\n",
    )?;
    let authority = RecordingAuthority::default();
    let issuer = CertificateIssuer::new(
        &authority,
        AuthorityCredentials::new("ca.key", "ca.crt"),
        &catalog,
    );

    let result = issuer.issue("printer", &IssueOutputs::in_dir(temp_dir.path(), "printer"));

    assert!(!result.success);
    assert_eq!(*authority.keygens.borrow(), 0);
    assert!(authority.signed.borrow().is_empty());
    assert_eq!(fs::read_dir(temp_dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_batch_fail_fast_workflow() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let catalog = ProfileCatalog::from_yaml_str(
        "\
A:
  attributes: [a]
  ip: 10.0.0.1/24
  validity: 1
B:
  attributes: [b]
  ip: 10.0.0.2/24
  validity: 1
C:
  attributes: [c]
  ip: 10.0.0.3/24
  validity: 1
",
    )?;
    let authority = RecordingAuthority {
        refuse: Some("B".to_string()),
        ..RecordingAuthority::default()
    };
    let issuer = CertificateIssuer::new(
        &authority,
        AuthorityCredentials::new("ca.key", "ca.crt"),
        &catalog,
    );

    let results = issue_all(&issuer, temp_dir.path(), BatchPolicy::FailFast, |_| {});

    assert_eq!(results.len(), 2);
    assert_eq!(results[0], IssuanceResult::succeeded("A"));
    assert_eq!(results[1].device_name, "B");
    assert!(!results[1].success);
    assert_eq!(*authority.keygens.borrow(), 2);
    assert!(!temp_dir.path().join("C.key").exists());
    Ok(())
}
