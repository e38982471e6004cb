//! `depstack certs` - export and filter system root certificates.

use std::process::Command;

use anyhow::{bail, Context, Result};
use depstack_core::certs::filter_certificates;

use crate::CertsArgs;

/// Default certificate source: the macOS system roots keychain.
pub const SYSTEM_ROOTS_KEYCHAIN: &str =
    "/System/Library/Keychains/SystemRootCertificates.keychain";

/// Export the keychain, filter through the validator, append survivors.
pub fn run(args: &CertsArgs) -> Result<()> {
    tracing::info!(keychain = %args.keychain, "exporting candidate certificates");
    let blob = export_keychain(&args.keychain)?;
    let summary = filter_certificates(&blob, &args.validator, &args.output)?;
    println!(
        "kept {} of {} certificates in {}",
        summary.written,
        summary.found,
        args.output.display()
    );
    Ok(())
}

/// Dump every certificate in a keychain as concatenated PEM text.
fn export_keychain(keychain: &str) -> Result<String> {
    let output = Command::new("security")
        .args(["find-certificate", "-a", "-p", keychain])
        .output()
        .context("failed to run `security`; this subcommand needs macOS")?;

    if !output.status.success() {
        bail!(
            "`security find-certificate` failed for {keychain}:\n{}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
