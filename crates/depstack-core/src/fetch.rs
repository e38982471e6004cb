//! Blocking archive retrieval.
//!
//! One attempt, no retries: a failed transfer aborts the whole run, because
//! a partially provisioned dependency would silently poison every later
//! package. The response body is returned as a plain [`Read`] stream so the
//! extractor can consume it without an intermediate download file.

use std::io::Read;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// A network transfer failed, or the transferred bytes did not match their
/// declared fingerprint.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, TLS, or protocol failure from the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status} for {url}")]
    Status {
        /// HTTP status code received.
        status: reqwest::StatusCode,
        /// URL that was requested.
        url: String,
    },

    /// The archive's SHA-256 did not match the configured fingerprint.
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// URL the archive was fetched from.
        url: String,
        /// Fingerprint declared in the package spec.
        expected: String,
        /// Digest actually computed over the transferred bytes.
        actual: String,
    },
}

/// Perform a single blocking GET and return the response body as a stream.
///
/// No disk writes happen here; the caller owns the stream and drops it on
/// every exit path, including extractor failure.
pub fn fetch(url: &str) -> Result<impl Read, FetchError> {
    tracing::info!(url, "downloading");
    let response = reqwest::blocking::Client::builder()
        .user_agent(crate::USER_AGENT)
        .build()?
        .get(url)
        .send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status,
            url: url.to_string(),
        });
    }
    Ok(response)
}

/// A [`Read`] adapter that feeds every byte it passes through into a SHA-256
/// hasher, so an archive can be fingerprint-checked while being streamed to
/// the extractor instead of being buffered twice.
#[derive(Debug)]
pub struct Sha256Reader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> Sha256Reader<R> {
    /// Wrap a stream in a hashing reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Consume the reader and return the lowercase hex digest of everything
    /// read so far.
    pub fn digest(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<R: Read> Read for Sha256Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
