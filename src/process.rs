//! Synchronous subprocess execution with timeouts.
//!
//! Every external script and service-manager call goes through [`run`]. It
//! never panics and never returns partial state: the caller gets either the
//! collected output (whatever the exit status) or an [`InvokeError`].
use std::{
    collections::BTreeMap,
    io::Read,
    os::unix::process::{CommandExt, ExitStatusExt},
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tracing::{debug, warn};

use crate::constants::{CHILD_POLL_INTERVAL, DEFAULT_PATH};
use crate::error::InvokeError;

/// A command vector plus the knobs the invoker honours.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    /// Variables layered on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
            env: BTreeMap::new(),
        }
    }

    /// Builds a spec from a full command vector (`argv[0]` is the program).
    pub fn from_argv(argv: &[String], timeout: Duration) -> Result<Self, InvokeError> {
        let (program, args) = argv.split_first().ok_or(InvokeError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
            env: BTreeMap::new(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Printable form used in logs and diagnostics.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output of a process that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, or `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, newline-separated when both are present.
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&self.stderr);
        }
        combined
    }

    /// Lines of [`Self::combined`].
    pub fn lines(&self) -> Vec<String> {
        self.combined().lines().map(str::to_string).collect()
    }

    fn from_status(status: ExitStatus, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            exit_code: status.code(),
            signal: status.signal(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }
    }
}

fn path_is_usable(path: Option<std::ffi::OsString>) -> bool {
    path.is_some_and(|value| !value.is_empty())
}

/// Runs a command to completion, killing it once `spec.timeout` elapses.
pub fn run(spec: &CommandSpec) -> Result<CommandOutput, InvokeError> {
    if spec.program.trim().is_empty() {
        return Err(InvokeError::EmptyCommand);
    }

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    if !spec.env.contains_key("PATH") && !path_is_usable(std::env::var_os("PATH")) {
        command.env("PATH", DEFAULT_PATH);
    }
    command.envs(&spec.env);

    debug!("Running `{}` (timeout {:?})", spec.display(), spec.timeout);

    let mut child = spawn(&mut command)
        .map_err(|source| InvokeError::from_spawn(&spec.program, source))?;

    let deadline = Instant::now() + spec.timeout;
    let (tx, rx) = mpsc::channel();
    let mut readers = 0;
    if let Some(stream) = child.stdout.take() {
        spawn_reader(stream, Stream::Stdout, tx.clone());
        readers += 1;
    }
    if let Some(stream) = child.stderr.take() {
        spawn_reader(stream, Stream::Stderr, tx);
        readers += 1;
    }

    let timed_out = || {
        warn!("`{}` timed out after {:?}; killing", spec.display(), spec.timeout);
        InvokeError::Timeout {
            program: spec.program.clone(),
            after: spec.timeout,
        }
    };

    let status = match wait_until(&mut child, deadline) {
        Ok(Some(status)) => status,
        Ok(None) => {
            kill_process_group(&mut child);
            return Err(timed_out());
        }
        Err(source) => {
            kill_process_group(&mut child);
            return Err(InvokeError::Io {
                program: spec.program.clone(),
                source,
            });
        }
    };

    // Background jobs left behind by the leader keep the pipes open; they
    // share its deadline.
    let pgid = Pid::from_raw(child.id() as i32);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for _ in 0..readers {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, buf)) => stdout = buf,
            Ok((Stream::Stderr, buf)) => stderr = buf,
            Err(RecvTimeoutError::Timeout) => {
                if let Err(err) = signal::killpg(pgid, Signal::SIGKILL) {
                    debug!("killpg({pgid}) after leader exit failed: {err}");
                }
                return Err(timed_out());
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let output = CommandOutput::from_status(status, stdout, stderr);
    debug!(
        "`{}` exited with {:?} ({} bytes stdout, {} bytes stderr)",
        spec.display(),
        output.exit_code,
        output.stdout.len(),
        output.stderr.len()
    );
    Ok(output)
}

/// Spawns, retrying briefly while the executable is still open for writing
/// elsewhere (`ETXTBSY`), as happens right after a script is rewritten.
fn spawn(command: &mut Command) -> std::io::Result<Child> {
    let mut attempts = 0;
    loop {
        match command.spawn() {
            Err(err) if err.raw_os_error() == Some(Errno::ETXTBSY as i32) && attempts < 5 => {
                attempts += 1;
                thread::sleep(CHILD_POLL_INTERVAL);
            }
            result => return result,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Drains `stream` on its own thread and sends the bytes once it closes.
fn spawn_reader<R>(mut stream: R, kind: Stream, tx: Sender<(Stream, Vec<u8>)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        let _ = tx.send((kind, buf));
    });
}

/// Wait for a child process until `deadline`, returning `Ok(None)` on timeout.
fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        match child.try_wait()? {
            Some(status) => return Ok(Some(status)),
            None => {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                thread::sleep(CHILD_POLL_INTERVAL);
            }
        }
    }
}

/// Kills the child's whole process group so grandchildren holding our pipes
/// open cannot outlive the timeout.
fn kill_process_group(child: &mut Child) {
    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(err) = signal::killpg(pgid, Signal::SIGKILL) {
        debug!("killpg({pgid}) failed: {err}; falling back to kill");
        let _ = child.kill();
    }
    let _ = child.wait();
}
