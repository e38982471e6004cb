//! depstack - fail-fast source-build provisioning.
//!
//! Builds a chain of C library dependencies from source into a shared
//! install root, in a fixed order, stopping at the first failure. Each
//! package's source archive is fetched and extracted into a scratch build
//! root, then configured, built, and installed through a shell with the
//! install root's `bin`/`sbin` leading the PATH so earlier packages' tools
//! are picked up by later builds. A separate subcommand exports the system
//! root certificates and keeps only the ones an external validator accepts.
//!
//! This is a single-run, single-host provisioning tool: no incremental
//! rebuilds, no parallel builds, no version resolution.

pub mod cmd;
pub mod config;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use depstack_core::certs::DEFAULT_VALIDATOR;

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(name = "depstack")]
#[command(author, version, about = "Build and stage a C dependency chain from source")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the package chain in declaration order
    Build(BuildArgs),
    /// Filter system root certificates through a validator
    Certs(CertsArgs),
    /// List the configured packages in build order
    List(ListArgs),
}

/// Arguments for `depstack build`.
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Scratch directory for extracted source trees
    #[arg(long, env = "DEPSTACK_BUILD_ROOT", default_value = "/tmp/depstack")]
    pub build_root: PathBuf,

    /// Directory the packages install into and build against
    #[arg(long, env = "DEPSTACK_INSTALL_ROOT", default_value = "/opt/depstack")]
    pub install_root: PathBuf,

    /// Compiler-cache shim directory, offered to cache-eligible packages
    #[arg(long, env = "DEPSTACK_CCACHE_DIR")]
    pub ccache_dir: Option<PathBuf>,

    /// Also run each package's test suite after installing it
    #[arg(long)]
    pub run_tests: bool,

    /// Build only these packages (still in declaration order)
    #[arg(long = "package", value_name = "NAME")]
    pub packages: Vec<String>,
}

/// Arguments for `depstack list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Install root the configure strings are rendered against
    #[arg(long, env = "DEPSTACK_INSTALL_ROOT", default_value = "/opt/depstack")]
    pub install_root: PathBuf,
}

/// Arguments for `depstack certs`.
#[derive(Debug, Args)]
pub struct CertsArgs {
    /// File the accepted certificates are appended to
    pub output: PathBuf,

    /// Validator command; reads one PEM certificate on stdin, exits zero iff valid
    #[arg(long, default_value = DEFAULT_VALIDATOR)]
    pub validator: String,

    /// Keychain to export candidate certificates from
    #[arg(long, default_value = cmd::certs::SYSTEM_ROOTS_KEYCHAIN)]
    pub keychain: String,
}
