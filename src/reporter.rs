//! Run narration
//!
//! Wraps one supervised run with start, result and error lines written to
//! the runner sink.

use crate::config::SupervisorConfig;
use crate::core::supervisor::{display_command, ProcessSupervisor, RunResult};
use crate::error::Result;
use crate::sink::{LogSink, RunSinks};
use log::debug;

pub fn report_start_details(log: &dyn LogSink, command: &str) -> Result<()> {
    log.write_line("-- ------------------------")?;
    log.write_line(&format!("-- Executing {} ...", command))?;
    Ok(())
}

pub fn report_final_details(log: &dyn LogSink, result: &RunResult) -> Result<()> {
    let exit_code = match result.exit_code {
        Some(code) => code.to_string(),
        None => "unknown".to_string(),
    };
    log.write_line(&format!("-- Exit code: {}", exit_code))?;
    log.write_line(&format!("-- Run time: {}ms", result.running_time_ms))?;
    Ok(())
}

pub fn report_error(log: &dyn LogSink, error: &dyn std::fmt::Display) -> Result<()> {
    log.write_line(&format!("-- ERROR: {}", error))?;
    Ok(())
}

/// Run `cmd` under `supervisor`, narrating to the runner sink
///
/// Timeouts and permission errors are reported and yield `Ok(None)`. Every
/// other error is returned to the caller.
pub fn run_with(
    supervisor: &mut ProcessSupervisor,
    cmd: &[String],
    sinks: &RunSinks,
) -> Result<Option<RunResult>> {
    report_start_details(sinks.runner.as_ref(), &display_command(cmd))?;

    match supervisor.execute(cmd, sinks) {
        Ok(result) => {
            report_final_details(sinks.runner.as_ref(), &result)?;
            Ok(Some(result))
        }
        Err(e) if e.is_recoverable() => {
            debug!("Reporting {} instead of failing the run", e.kind());
            report_error(sinks.runner.as_ref(), &e)?;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Run `cmd` with a supervisor sampling the live host
pub fn run(cmd: &[String], config: SupervisorConfig, sinks: &RunSinks) -> Result<Option<RunResult>> {
    let mut supervisor = ProcessSupervisor::new(config)?;
    run_with(&mut supervisor, cmd, sinks)
}
