//! Package definitions for the build pipeline.
//!
//! A [`PackageSpec`] is one buildable unit in the dependency chain: where to
//! fetch its source archive, how to configure and build it, and which
//! directory the archive unpacks into. Specs are constructed once by the
//! configuration layer, are immutable, and are consumed by the pipeline in
//! declaration order.

use std::path::{Path, PathBuf};

/// One buildable unit: source location plus the shell commands that build it.
///
/// The `source_dir` field names the directory the archive unpacks into under
/// the build root. For almost every package this is `name-version`, but it is
/// explicit data rather than a derived value because upstream archives do not
/// always agree (GitHub `archive/` zips unpack as `repo-version` regardless of
/// the archive filename).
#[derive(Debug, Clone)]
pub struct PackageSpec {
    /// Unique package name, the key used for selection and logging.
    pub name: String,
    /// Upstream version string.
    pub version: String,
    /// Filename of the source archive; its suffix drives format dispatch.
    pub archive: String,
    /// Download URL for the source archive.
    pub url: String,
    /// Directory the archive unpacks into, relative to the build root.
    pub source_dir: String,
    /// Shell command that configures the source tree.
    pub configure: String,
    /// Shell command that compiles the configured tree.
    pub build: String,
    /// Optional shell command that runs the package's test suite.
    pub test: Option<String>,
    /// Whether a compiler cache may shadow the toolchain for this package.
    pub allow_ccache: bool,
    /// Optional SHA-256 fingerprint of the source archive, verified while
    /// streaming when present.
    pub sha256: Option<String>,
}

impl PackageSpec {
    /// Create a spec with the common defaults: `source_dir` of
    /// `name-version`, an archive of `name-version.tar.gz`, no test command,
    /// no fingerprint, and the compiler cache disabled.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        url: impl Into<String>,
        configure: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let version = version.into();
        let source_dir = format!("{name}-{version}");
        Self {
            archive: format!("{source_dir}.tar.gz"),
            name,
            version,
            url: url.into(),
            source_dir,
            configure: configure.into(),
            build: "make".to_string(),
            test: None,
            allow_ccache: false,
            sha256: None,
        }
    }

    /// Override the archive filename.
    pub fn archive(mut self, archive: impl Into<String>) -> Self {
        self.archive = archive.into();
        self
    }

    /// Override the directory the archive unpacks into.
    pub fn source_dir(mut self, dir: impl Into<String>) -> Self {
        self.source_dir = dir.into();
        self
    }

    /// Override the build command (defaults to `make`).
    pub fn build_command(mut self, build: impl Into<String>) -> Self {
        self.build = build.into();
        self
    }

    /// Set the test command.
    pub fn test_command(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }

    /// Permit compiler-cache use for this package.
    pub fn with_ccache(mut self) -> Self {
        self.allow_ccache = true;
        self
    }

    /// Set the expected SHA-256 of the source archive.
    pub fn fingerprint(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    /// Absolute path of this package's extracted source tree.
    pub fn tree_path(&self, build_root: &Path) -> PathBuf {
        build_root.join(&self.source_dir)
    }
}

/// Look up a package by name in an ordered spec list.
pub fn find_package<'a>(specs: &'a [PackageSpec], name: &str) -> Option<&'a PackageSpec> {
    specs.iter().find(|s| s.name == name)
}
