use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::types::{AppError, AppResult};

/// Grace period granted after each termination request.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10 * 60);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl Invocation {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable for the child only
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::null());
        command
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// What happens to the child's standard streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// Both streams go to /dev/null
    Discard,
    /// Both streams are shared with the harness
    Inherit,
    /// Stdout is written to the file, stderr is merged into it
    Logfile(PathBuf),
    /// Stdout is collected in memory, stderr is dropped
    Stdout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Raw exit code; `128 + signal` when the process was killed by a signal
    pub code: i32,
    /// Collected stdout, empty unless [`Capture::Stdout`] was requested
    pub stdout: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Escalation state of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Running,
    SoftTerminating,
    HardTerminating,
    Killed,
}

impl Stage {
    /// Stage entered once the current stage's deadline expires
    pub fn next(self) -> Stage {
        match self {
            Stage::Running => Stage::SoftTerminating,
            Stage::SoftTerminating => Stage::HardTerminating,
            Stage::HardTerminating | Stage::Killed => Stage::Killed,
        }
    }
}

/// Runs external tools. A process that outlives its timeout is walked
/// through a fixed escalation: SIGTERM, one grace period, SIGTERM again,
/// another grace period, then SIGKILL and [`AppError::Unterminated`].
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner with a custom grace period between escalation stages
    pub fn with_grace(grace: Duration) -> Self {
        Self { grace }
    }

    /// Run `invocation` to completion.
    ///
    /// `timeout` of `None` waits for a natural exit. A non-zero exit code is
    /// not an error; only failing to spawn or to terminate the process is.
    pub fn run(
        &self,
        invocation: &Invocation,
        capture: Capture,
        timeout: Option<Duration>,
    ) -> AppResult<ProcessOutput> {
        debug!("running {invocation}, capture = {capture:?}, timeout = {timeout:?} ...");

        let mut command = invocation.command();
        match &capture {
            Capture::Discard => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
            Capture::Inherit => {
                command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            Capture::Logfile(path) => {
                let file = File::create(path)?;
                command
                    .stdout(Stdio::from(file.try_clone()?))
                    .stderr(Stdio::from(file));
            }
            Capture::Stdout => {
                command.stdout(Stdio::piped()).stderr(Stdio::null());
            }
        }

        let mut child = command.spawn()?;
        let reader = child.stdout.take().map(spawn_reader);

        let status = self.supervise(&mut child, invocation, timeout);

        // Join the reader even on failure so the pipe is not leaked
        let stdout = match reader {
            Some(handle) => handle.join().unwrap_or_default(),
            None => Vec::new(),
        };

        let status = status?;
        Ok(ProcessOutput {
            code: exit_code(status),
            stdout,
        })
    }

    fn supervise(
        &self,
        child: &mut Child,
        invocation: &Invocation,
        timeout: Option<Duration>,
    ) -> AppResult<ExitStatus> {
        let Some(timeout) = timeout else {
            return Ok(child.wait()?);
        };

        let mut stage = Stage::Running;
        let mut deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                if stage != Stage::Running {
                    debug!("{invocation} exited during {stage:?}");
                }
                return Ok(status);
            }

            let now = Instant::now();
            if now < deadline {
                thread::sleep(POLL_INTERVAL.min(deadline - now));
                continue;
            }

            stage = stage.next();
            match stage {
                Stage::SoftTerminating | Stage::HardTerminating => {
                    warn!(
                        "{} exceeded its time budget, requesting termination ({stage:?})",
                        invocation.program().to_string_lossy()
                    );
                    terminate(child);
                    deadline = Instant::now() + self.grace;
                }
                Stage::Killed => {
                    if let Err(e) = child.kill() {
                        warn!("failed to kill {invocation}: {e}");
                    }
                    let _ = child.wait();
                    let command = invocation.program().to_string_lossy().into_owned();
                    error!("process {command} did not terminate");
                    return Err(AppError::Unterminated { command });
                }
                Stage::Running => unreachable!("escalation never returns to Running"),
            }
        }
    }
}

fn spawn_reader(mut stdout: std::process::ChildStdout) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Err(e) = stdout.read_to_end(&mut buffer) {
            warn!("failed to read child output: {e}");
        }
        buffer
    })
}

fn terminate(child: &Child) {
    let pid = Pid::from_raw(child.id() as i32);
    if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
        debug!("SIGTERM to {pid} failed: {e}");
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}
