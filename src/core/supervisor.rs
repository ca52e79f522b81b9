//! Process supervision
//!
//! [`ProcessSupervisor`] spawns one command, relays its output, samples the
//! host once per tick and enforces the configured timeout with a
//! terminate-then-kill escalation.
//!
//! Timeout and grace period are measured in whole ticks: each tick adds one
//! poll interval to the elapsed time, so enforcement can overshoot by up to
//! one tick plus that tick's drain and sampling work.

use crate::config::SupervisorConfig;
use crate::core::stream_relay::{start_relay, LineQueue};
use crate::error::{Result, RunError};
use crate::monitor::MonitorSampler;
use crate::sink::RunSinks;

use log::{debug, info, warn};
use serde::Serialize;
use std::io;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Outcome of a completed run
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RunResult {
    /// Exit code, `None` when it could not be determined. On Unix a child
    /// ended by a signal reports the negated signal number.
    pub exit_code: Option<i32>,
    /// Wall-clock time from start of the run to completion
    pub running_time_ms: u64,
}

/// Result of a non-blocking exit query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    Running,
    Exited(Option<i32>),
}

/// The child process as seen by the supervisor
pub trait SupervisedChild {
    fn id(&self) -> u32;

    /// Non-blocking check for exit
    fn poll(&mut self) -> io::Result<ChildState>;

    /// Ask the process to shut down (SIGTERM on Unix)
    fn terminate(&mut self) -> io::Result<()>;

    /// Force the process down and reap it
    fn kill(&mut self) -> io::Result<()>;
}

/// A child spawned by [`spawn`]
pub struct SpawnedChild {
    child: Child,
}

impl SupervisedChild for SpawnedChild {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn poll(&mut self) -> io::Result<ChildState> {
        Ok(match self.child.try_wait()? {
            Some(status) => ChildState::Exited(exit_code(status)),
            None => ChildState::Running,
        })
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        // SAFETY: plain kill(2) on a pid we own and have not reaped yet
        let ret = unsafe { libc::kill(self.child.id() as libc::pid_t, libc::SIGTERM) };
        if ret == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            // already gone
            Ok(())
        } else {
            Err(err)
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.child.kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

fn exit_code(status: ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.code().or_else(|| status.signal().map(|signal| -signal))
    }

    #[cfg(not(unix))]
    {
        status.code()
    }
}

/// Spawn `cmd` with piped stdout/stderr and no stdin
///
/// The first element is the program, the rest are passed verbatim as its
/// arguments; nothing is expanded.
pub fn spawn(cmd: &[String]) -> Result<(SpawnedChild, ChildStdout, ChildStderr)> {
    if cmd.is_empty() {
        return Err(RunError::InvalidConfiguration(
            "Command cannot be empty".to_string(),
        ));
    }

    let mut command = Command::new(&cmd[0]);
    command.args(&cmd[1..]);
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.stdin(Stdio::null());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            return Err(RunError::PermissionDenied(format!(
                "Permission denied. Cannot execute: {}",
                display_command(cmd)
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    match (stdout, stderr) {
        (Some(stdout), Some(stderr)) => Ok((SpawnedChild { child }, stdout, stderr)),
        _ => {
            let _ = child.kill();
            let _ = child.wait();
            Err(io::Error::new(io::ErrorKind::Other, "child output was not captured").into())
        }
    }
}

/// Render `cmd` as one line, quoting arguments that need it
pub fn display_command(cmd: &[String]) -> String {
    shell_words::join(cmd)
}

/// Drives one command from spawn to exit
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    sampler: MonitorSampler,
}

impl ProcessSupervisor {
    /// Supervisor sampling the live host
    pub fn new(config: SupervisorConfig) -> Result<Self> {
        Self::with_sampler(config, MonitorSampler::system())
    }

    pub fn with_sampler(config: SupervisorConfig, sampler: MonitorSampler) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, sampler })
    }

    /// Run `cmd` to completion
    ///
    /// Fails with [`RunError::PermissionDenied`] if the OS refuses to execute
    /// the command, before any relay is started, and with
    /// [`RunError::ProcTimeout`] once the timeout escalation has finished.
    pub fn execute(&mut self, cmd: &[String], sinks: &RunSinks) -> Result<RunResult> {
        let started = Instant::now();
        let command = display_command(cmd);

        let (mut child, stdout, stderr) = spawn(cmd)?;
        info!("Spawned pid {}: {}", child.id(), command);

        let relays = start_relay("stdout", stdout)
            .and_then(|out| start_relay("stderr", stderr).map(|err| (out, err)));
        let (stdout, stderr) = match relays {
            Ok(relays) => relays,
            Err(e) => {
                let _ = child.kill();
                return Err(e.into());
            }
        };

        self.supervise(&mut child, &command, &stdout, &stderr, sinks, started)
    }

    /// Poll loop over an already started child and its relays
    ///
    /// If the loop fails while the child is still running, the child is
    /// killed and reaped before the error is returned.
    pub fn supervise<C: SupervisedChild>(
        &mut self,
        child: &mut C,
        command: &str,
        stdout: &LineQueue,
        stderr: &LineQueue,
        sinks: &RunSinks,
        started: Instant,
    ) -> Result<RunResult> {
        let outcome = self.poll_until_exit(child, command, stdout, stderr, sinks, started);
        if let Err(e) = &outcome {
            if let Ok(ChildState::Running) = child.poll() {
                warn!("Killing pid {} after a failed run: {}", child.id(), e);
                if let Err(kill_err) = child.kill() {
                    warn!("Could not kill pid {}: {}", child.id(), kill_err);
                }
            }
        }
        outcome
    }

    fn poll_until_exit<C: SupervisedChild>(
        &mut self,
        child: &mut C,
        command: &str,
        stdout: &LineQueue,
        stderr: &LineQueue,
        sinks: &RunSinks,
        started: Instant,
    ) -> Result<RunResult> {
        let pid = child.id();
        let interval = self.config.poll_interval;
        let mut elapsed = Duration::ZERO;

        while child.poll()? == ChildState::Running {
            self.tick(pid, stdout, stderr, sinks)?;

            thread::sleep(interval);
            elapsed += interval;

            if let Some(timeout) = self.config.timeout {
                if elapsed > timeout {
                    warn!("pid {} exceeded its timeout of {:?}", pid, timeout);
                    let state = self.stop(child)?;
                    debug!("pid {} stopped: {:?}", pid, state);
                    return Err(RunError::ProcTimeout {
                        timeout_secs: timeout.as_secs_f64(),
                        command: command.to_string(),
                    });
                }
            }
        }

        let running_time_ms = started.elapsed().as_millis() as u64;

        // the relays may still hold the last lines written before exit
        let deadline = Instant::now() + interval;
        stdout.drain_settled(sinks.stdout.as_ref(), deadline)?;
        stderr.drain_settled(sinks.stderr.as_ref(), deadline)?;
        self.sampler.emit(pid, sinks.monitor.as_ref())?;

        let exit_code = match child.poll()? {
            ChildState::Exited(code) => code,
            ChildState::Running => None,
        };
        info!("pid {} exited with {:?} after {}ms", pid, exit_code, running_time_ms);

        Ok(RunResult {
            exit_code,
            running_time_ms,
        })
    }

    /// One tick: stdout, then stderr, then a snapshot
    fn tick(
        &mut self,
        pid: u32,
        stdout: &LineQueue,
        stderr: &LineQueue,
        sinks: &RunSinks,
    ) -> Result<()> {
        stdout.drain_all(sinks.stdout.as_ref())?;
        stderr.drain_all(sinks.stderr.as_ref())?;
        self.sampler.emit(pid, sinks.monitor.as_ref())
    }

    /// Terminate, then kill once the grace period is exceeded. Without a
    /// grace period, wait for the process to exit however long it takes.
    fn stop<C: SupervisedChild>(&self, child: &mut C) -> Result<ChildState> {
        let pid = child.id();
        let interval = self.config.poll_interval;

        info!("Sending termination signal to pid {}", pid);
        child.terminate()?;

        let mut elapsed = Duration::ZERO;
        loop {
            if let Some(grace) = self.config.shutdown {
                if elapsed > grace {
                    warn!("pid {} still running {:?} after termination, killing it", pid, grace);
                    child.kill()?;
                    return Ok(child.poll()?);
                }
            }

            let state = child.poll()?;
            if state != ChildState::Running {
                return Ok(state);
            }

            thread::sleep(interval);
            elapsed += interval;
        }
    }
}
