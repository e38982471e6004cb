//! Package build orchestration.
//!
//! Drives the declared package list in order: clean the stale source tree,
//! fetch and extract the archive, then configure / build / install through
//! the step runner. Strictly sequential and fail-fast: a failure in package
//! *k* prevents any attempt at package *k+1*, and the error carries the
//! package and step context up to the driver.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::exec::{anchor_bootstrap_command, BuildEnv, StepRunner};
use crate::extract::extract;
use crate::fetch::{fetch, FetchError, Sha256Reader};
use crate::package::PackageSpec;

/// The install step is literal `make install` for every package; it is not
/// templated per package.
pub const INSTALL_COMMAND: &str = "make install";

/// Sequential, fail-fast build pipeline over an ordered package list.
#[derive(Debug)]
pub struct Pipeline {
    build_root: PathBuf,
    install_root: PathBuf,
    runner: StepRunner,
    run_tests: bool,
}

impl Pipeline {
    /// Create a pipeline with the given scratch and install roots.
    ///
    /// `ccache_dir`, when set, is offered to every package that declares
    /// compiler-cache eligibility.
    pub fn new(build_root: &Path, install_root: &Path, ccache_dir: Option<PathBuf>) -> Self {
        let env = BuildEnv::from_ambient(install_root, ccache_dir);
        let runner = StepRunner::new(env).tolerate(anchor_bootstrap_command(install_root));
        Self {
            build_root: build_root.to_path_buf(),
            install_root: install_root.to_path_buf(),
            runner,
            run_tests: false,
        }
    }

    /// Also run each package's declared test command after installing it.
    pub fn run_tests(mut self, enabled: bool) -> Self {
        self.run_tests = enabled;
        self
    }

    /// Build every package in declaration order.
    ///
    /// The install root is created on demand; the build root is re-runnable
    /// because each package's stale tree is removed before extraction.
    pub fn build_all(&self, packages: &[PackageSpec]) -> Result<()> {
        fs::create_dir_all(&self.install_root).with_context(|| {
            format!("creating install root {}", self.install_root.display())
        })?;

        for package in packages {
            tracing::info!(package = %package.name, version = %package.version, "building");
            self.build_one(package)
                .with_context(|| format!("package `{}` failed", package.name))?;
        }
        Ok(())
    }

    /// Run the trust-anchor bootstrap in the install root.
    ///
    /// Its non-zero first-run exit is the one tolerated step failure.
    pub fn bootstrap_anchor(&self) -> Result<()> {
        let command = anchor_bootstrap_command(&self.install_root);
        self.runner
            .run(&command, &self.install_root, false)
            .context("trust-anchor bootstrap")?;
        Ok(())
    }

    fn build_one(&self, package: &PackageSpec) -> Result<()> {
        self.clean(package)?;
        self.fetch_and_extract(package)
            .with_context(|| format!("fetching {}", package.url))?;

        let tree = package.tree_path(&self.build_root);
        self.runner
            .run(&package.configure, &tree, package.allow_ccache)
            .context("configure step")?;
        self.runner
            .run(&package.build, &tree, package.allow_ccache)
            .context("build step")?;
        self.runner
            .run(INSTALL_COMMAND, &tree, package.allow_ccache)
            .context("install step")?;

        if self.run_tests {
            if let Some(test) = &package.test {
                self.runner
                    .run(test, &tree, package.allow_ccache)
                    .context("test step")?;
            }
        }
        Ok(())
    }

    /// Remove a stale extracted tree so a re-run starts from clean sources.
    fn clean(&self, package: &PackageSpec) -> Result<()> {
        let tree = package.tree_path(&self.build_root);
        if tree.exists() {
            tracing::info!(package = %package.name, tree = %tree.display(), "cleaning");
            fs::remove_dir_all(&tree)
                .with_context(|| format!("removing stale tree {}", tree.display()))?;
        }
        Ok(())
    }

    fn fetch_and_extract(&self, package: &PackageSpec) -> Result<()> {
        let stream = fetch(&package.url)?;

        match &package.sha256 {
            Some(expected) => {
                let mut reader = Sha256Reader::new(stream);
                extract(&mut reader, &self.build_root, &package.archive)?;
                // The tar demuxer stops at the end-of-archive sentinel;
                // drain the trailing padding so the digest covers the
                // whole transferred file.
                io::copy(&mut reader, &mut io::sink())?;
                let actual = reader.digest();
                if !actual.eq_ignore_ascii_case(expected) {
                    return Err(FetchError::ChecksumMismatch {
                        url: package.url.clone(),
                        expected: expected.clone(),
                        actual,
                    }
                    .into());
                }
            }
            None => extract(stream, &self.build_root, &package.archive)?,
        }
        Ok(())
    }
}
