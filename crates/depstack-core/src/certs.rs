//! System certificate filtering.
//!
//! Takes one blob of concatenated PEM certificates (a trust-store export),
//! splits it into individual certificates, pipes each through an external
//! validator, and appends only the accepted ones to the output file. A
//! rejected or malformed certificate is skipped, never fatal: losing one
//! stale root must not abort provisioning.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use regex::Regex;
use thiserror::Error;

/// Non-greedy match of one PEM certificate between its marker lines.
/// Certificates must not nest, so the shortest match is always a whole one.
const PEM_CERTIFICATE: &str = "(?s)-----BEGIN CERTIFICATE-----.*?-----END CERTIFICATE-----";

/// Default validator: accepts a certificate iff it has not expired yet.
pub const DEFAULT_VALIDATOR: &str = "openssl x509 -checkend 0 -noout";

/// The filter run itself failed (not an individual certificate rejection).
#[derive(Error, Debug)]
pub enum CertError {
    /// Output file or validator pipe I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The certificate marker pattern failed to compile.
    #[error("certificate pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Counts from one filter run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSummary {
    /// Certificates found in the source blob.
    pub found: usize,
    /// Certificates the validator accepted and that were written out.
    pub written: usize,
}

/// Split `blob` into PEM certificates, validate each through
/// `validator_command` (a shell string reading one certificate on stdin,
/// exiting zero iff valid), and append the accepted ones to `out_path`.
///
/// Accepted certificates are written in their original relative order, each
/// followed by a newline. The output file is created if absent and opened in
/// append mode, so repeated runs accumulate.
pub fn filter_certificates(
    blob: &str,
    validator_command: &str,
    out_path: &Path,
) -> Result<FilterSummary, CertError> {
    let pattern = Regex::new(PEM_CERTIFICATE)?;
    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(out_path)?;

    let mut summary = FilterSummary {
        found: 0,
        written: 0,
    };

    for candidate in pattern.find_iter(blob) {
        summary.found += 1;
        let pem = candidate.as_str();
        if validate(pem, validator_command)? {
            out.write_all(pem.as_bytes())?;
            out.write_all(b"\n")?;
            summary.written += 1;
        } else {
            tracing::debug!("skipping certificate rejected by validator");
        }
    }

    tracing::info!(
        found = summary.found,
        written = summary.written,
        out = %out_path.display(),
        "certificate filter complete"
    );
    Ok(summary)
}

/// Run the validator with the certificate on stdin; valid iff it exits zero.
fn validate(pem: &str, validator_command: &str) -> Result<bool, CertError> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(validator_command)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // Feed stdin from its own thread: a validator that stops reading (or a
    // certificate larger than the pipe buffer) must not deadlock the writer
    // against our wait() below.
    let mut stdin = child.stdin.take().expect("stdin was piped");
    let body = pem.as_bytes().to_vec();
    let writer = thread::spawn(move || {
        // EPIPE from a validator that exits early is a rejection, not an
        // error path.
        let _ = stdin.write_all(&body);
    });

    let status = child.wait()?;
    let _ = writer.join();
    Ok(status.success())
}
