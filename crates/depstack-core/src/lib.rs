//! depstack-core - fetch, extract, and build orchestration.
//!
//! The library behind the `depstack` provisioning tool: a strictly
//! sequential, fail-fast pipeline that fetches source archives, extracts
//! them into a build root, and drives each package's configure/build/install
//! steps through a shell with a controlled PATH. A separate certificate
//! filter pipes trust-store exports through an external validator.

pub mod certs;
pub mod exec;
pub mod extract;
pub mod fetch;
pub mod package;
pub mod pipeline;

pub use exec::{BuildEnv, CommandResult, StepError, StepRunner};
pub use extract::ExtractError;
pub use fetch::FetchError;
pub use package::PackageSpec;
pub use pipeline::Pipeline;

/// User Agent string for fetch operations.
pub const USER_AGENT: &str = concat!("depstack/", env!("CARGO_PKG_VERSION"));
