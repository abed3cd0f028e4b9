use crate::BuildError;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Number of attempts for commands that talk to a registry
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Whether the output of a command is forwarded to the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Log,
    Quiet,
}

impl Output {
    pub const fn from_flag(log: bool) -> Self {
        if log {
            Self::Log
        } else {
            Self::Quiet
        }
    }
}

/// A command line to run: program, arguments and working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), cwd: None }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs external programs; implemented by [`SystemRunner`] and by test doubles
pub trait CommandRunner {
    /// Run `command` to completion and return its wall time
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Spawn`] if the program cannot be started and
    /// [`BuildError::CommandFailed`] if it exits unsuccessfully.
    fn execute(&self, command: &CommandSpec, output: Output) -> Result<Duration, BuildError>;
}

/// Runs commands with `std::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        command
    }

    fn check_status(spec: &CommandSpec, status: std::process::ExitStatus) -> Result<(), BuildError> {
        if status.success() {
            Ok(())
        } else {
            Err(BuildError::CommandFailed { command: spec.to_string(), code: status.code().unwrap_or(-1) })
        }
    }
}

fn forward_lines<R: Read>(reader: R, output: Output) {
    for line in BufReader::new(reader).lines().map_while(Result::ok) {
        if output == Output::Log {
            info!(target: "process", "{}", line.trim());
        }
    }
}

impl CommandRunner for SystemRunner {
    fn execute(&self, spec: &CommandSpec, output: Output) -> Result<Duration, BuildError> {
        let start = Instant::now();
        let mut child = Self::command(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BuildError::Spawn { command: spec.to_string(), source })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        std::thread::scope(|scope| {
            if let Some(stderr) = stderr {
                scope.spawn(move || forward_lines(stderr, output));
            }
            if let Some(stdout) = stdout {
                forward_lines(stdout, output);
            }
        });

        let status = child
            .wait()
            .map_err(|source| BuildError::Spawn { command: spec.to_string(), source })?;
        Self::check_status(spec, status)?;
        Ok(start.elapsed())
    }
}

/// Elapsed time in whole seconds, rounded up
pub fn whole_seconds(elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs();
    if elapsed.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

/// Run `command`, trying again after a failed exit up to `attempts` times
///
/// Only [`BuildError::CommandFailed`] is retried; a program that cannot be
/// started fails immediately.
///
/// # Errors
///
/// Returns the error of the last attempt.
pub fn run_with_retry<R: CommandRunner + ?Sized>(
    runner: &R,
    command: &CommandSpec,
    output: Output,
    attempts: u32,
) -> Result<Duration, BuildError> {
    let mut tries = 0_u32;
    loop {
        match runner.execute(command, output) {
            Ok(elapsed) => return Ok(elapsed),
            Err(err @ BuildError::CommandFailed { .. }) => {
                tries = tries.saturating_add(1);
                if tries >= attempts {
                    return Err(err);
                }
                warn!(target: "process", "`{}` failed, trying again ...", command.program);
            },
            Err(err) => return Err(err),
        }
    }
}

/// Whether `binary` can be found on `PATH`
pub fn which<R: CommandRunner + ?Sized>(runner: &R, binary: &str) -> bool {
    runner.execute(&CommandSpec::new("which").arg(binary), Output::Quiet).is_ok()
}

/// Binaries that are required on `PATH` but missing
pub fn missing_binaries<'a, R: CommandRunner + ?Sized>(runner: &R, binaries: &[&'a str]) -> Vec<&'a str> {
    binaries.iter().copied().filter(|binary| !which(runner, binary)).collect()
}
