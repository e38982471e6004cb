//! Build-step execution with fail-fast semantics.
//!
//! Every configure/build/install command is an opaque shell string: the
//! runner hands it to `sh -c` unparsed, captures the combined output, and
//! reports the exit status. Errors propagate as [`StepError`] values all the
//! way up to the driver, which decides the process exit status; nothing in
//! here calls `process::exit`.

use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;

/// A build step could not be spawned or exited non-zero.
#[derive(Error, Debug)]
pub enum StepError {
    /// The shell could not be spawned or its output could not be read.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The command ran and exited non-zero.
    #[error("step `{command}` exited with code {code}")]
    Failed {
        /// The shell command text that failed.
        command: String,
        /// Exit code, or -1 if terminated by signal.
        code: i32,
    },
}

/// Exit status plus combined captured output of one executed step.
#[derive(Debug)]
pub struct CommandResult {
    /// Exit status of the shell.
    pub status: ExitStatus,
    /// Captured stdout and stderr, interleaved in write order.
    pub output: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }
}

/// Environment every build step runs in.
///
/// PATH prepend order is fixed: compiler cache, then install `bin`, then
/// install `sbin`, then the inherited PATH. Cached tools shadow installed
/// tools, which shadow system tools.
#[derive(Debug, Clone)]
pub struct BuildEnv {
    /// Root the packages install into; its `bin` and `sbin` lead the PATH.
    pub install_root: PathBuf,
    /// Directory of the compiler-cache shims, when one is configured.
    pub ccache_dir: Option<PathBuf>,
    /// PATH inherited from the ambient process environment.
    pub base_path: String,
}

impl BuildEnv {
    /// Capture the ambient PATH for the given roots.
    pub fn from_ambient(install_root: &Path, ccache_dir: Option<PathBuf>) -> Self {
        Self {
            install_root: install_root.to_path_buf(),
            ccache_dir,
            base_path: std::env::var("PATH").unwrap_or_default(),
        }
    }

    /// Construct the PATH value for one step.
    pub fn path_value(&self, with_ccache: bool) -> String {
        let mut dirs = Vec::new();
        if with_ccache {
            if let Some(ccache) = &self.ccache_dir {
                dirs.push(ccache.display().to_string());
            }
        }
        dirs.push(self.install_root.join("bin").display().to_string());
        dirs.push(self.install_root.join("sbin").display().to_string());
        if !self.base_path.is_empty() {
            dirs.push(self.base_path.clone());
        }
        dirs.join(":")
    }
}

/// Executes shell-string build steps against a fixed [`BuildEnv`].
#[derive(Debug)]
pub struct StepRunner {
    env: BuildEnv,
    tolerated: Option<String>,
}

impl StepRunner {
    /// Create a runner for the given environment.
    pub fn new(env: BuildEnv) -> Self {
        Self {
            env,
            tolerated: None,
        }
    }

    /// Designate one exact command text whose non-zero exit is tolerated.
    ///
    /// Used for the trust-anchor bootstrap: `unbound-anchor` exits non-zero
    /// on first run after priming the root key, which is benign.
    pub fn tolerate(mut self, command: impl Into<String>) -> Self {
        self.tolerated = Some(command.into());
        self
    }

    /// Run `command` through `sh -c` in `workdir`.
    ///
    /// The ambient process environment is inherited unchanged except for
    /// PATH, which is rebuilt per [`BuildEnv::path_value`]. Combined output
    /// is always printed before the result is evaluated, so diagnosing a
    /// failure never requires a re-run.
    pub fn run(
        &self,
        command: &str,
        workdir: &Path,
        allow_ccache: bool,
    ) -> Result<CommandResult, StepError> {
        tracing::debug!(command, workdir = %workdir.display(), "running step");

        // Both streams share one spool descriptor (a shared file offset),
        // so the captured output keeps its original interleaving.
        let mut spool = tempfile::tempfile()?;
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(workdir)
            .env("PATH", self.env.path_value(allow_ccache))
            .stdout(Stdio::from(spool.try_clone()?))
            .stderr(Stdio::from(spool.try_clone()?))
            .status()?;

        spool.rewind()?;
        let mut raw = Vec::new();
        spool.read_to_end(&mut raw)?;
        let output = String::from_utf8_lossy(&raw).into_owned();

        print!("{output}");

        let result = CommandResult { status, output };
        if !result.success() {
            if self.tolerated.as_deref() == Some(command) {
                tracing::warn!(command, code = result.code(), "tolerated step failure");
                return Ok(result);
            }
            return Err(StepError::Failed {
                command: command.to_string(),
                code: result.code(),
            });
        }
        Ok(result)
    }
}

/// The one command whose failure the pipeline tolerates: first-run
/// `unbound-anchor` exits non-zero after writing the primed root key.
pub fn anchor_bootstrap_command(install_root: &Path) -> String {
    format!(
        "{root}/sbin/unbound-anchor -a {root}/etc/unbound/root.key",
        root = install_root.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(base_path: &str, ccache: Option<&str>) -> BuildEnv {
        BuildEnv {
            install_root: PathBuf::from("/opt/stack"),
            ccache_dir: ccache.map(PathBuf::from),
            base_path: base_path.to_string(),
        }
    }

    #[test]
    fn path_order_is_ccache_bin_sbin_base() {
        let env = env_with("/usr/bin:/bin", Some("/opt/ccache/libexec"));
        assert_eq!(
            env.path_value(true),
            "/opt/ccache/libexec:/opt/stack/bin:/opt/stack/sbin:/usr/bin:/bin"
        );
    }

    #[test]
    fn ccache_dir_dropped_when_step_disallows_it() {
        let env = env_with("/usr/bin", Some("/opt/ccache/libexec"));
        assert_eq!(env.path_value(false), "/opt/stack/bin:/opt/stack/sbin:/usr/bin");
    }

    #[test]
    fn empty_base_path_keeps_order_without_trailing_colon() {
        let env = env_with("", None);
        assert_eq!(env.path_value(true), "/opt/stack/bin:/opt/stack/sbin");
    }

    #[test]
    fn run_captures_combined_output() {
        let runner = StepRunner::new(env_with(&std::env::var("PATH").unwrap_or_default(), None));
        let result = runner
            .run("echo out && echo err 1>&2", Path::new("/tmp"), false)
            .unwrap();
        assert!(result.success());
        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
    }

    #[test]
    fn output_preserves_write_order_across_streams() {
        let runner = StepRunner::new(env_with(&std::env::var("PATH").unwrap_or_default(), None));
        let result = runner
            .run(
                "echo one && echo two 1>&2 && echo three",
                Path::new("/tmp"),
                false,
            )
            .unwrap();
        assert_eq!(result.output, "one\ntwo\nthree\n");
    }

    #[test]
    fn nonzero_exit_is_a_step_error() {
        let runner = StepRunner::new(env_with(&std::env::var("PATH").unwrap_or_default(), None));
        let err = runner.run("exit 3", Path::new("/tmp"), false).unwrap_err();
        match err {
            StepError::Failed { command, code } => {
                assert_eq!(command, "exit 3");
                assert_eq!(code, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tolerated_command_failure_is_not_fatal() {
        let runner = StepRunner::new(env_with(&std::env::var("PATH").unwrap_or_default(), None))
            .tolerate("exit 1");
        let result = runner.run("exit 1", Path::new("/tmp"), false).unwrap();
        assert!(!result.success());

        // Only the exact command text is tolerated.
        assert!(runner.run("exit 2", Path::new("/tmp"), false).is_err());
    }

    #[test]
    fn large_output_does_not_deadlock() {
        let runner = StepRunner::new(env_with(&std::env::var("PATH").unwrap_or_default(), None));
        // Write well past a pipe buffer on both streams.
        let result = runner
            .run(
                "i=0; while [ $i -lt 5000 ]; do echo line $i; echo line $i 1>&2; i=$((i+1)); done",
                Path::new("/tmp"),
                false,
            )
            .unwrap();
        assert!(result.output.contains("line 4999"));
    }

    #[test]
    fn anchor_command_embeds_install_root() {
        let cmd = anchor_bootstrap_command(Path::new("/opt/stack"));
        assert_eq!(
            cmd,
            "/opt/stack/sbin/unbound-anchor -a /opt/stack/etc/unbound/root.key"
        );
    }
}
