use clap::Parser;
use colored::*;
use env_logger::Env;
use psrun::sink::{build_sink, LogSink, RunSinks, SinkTarget};
use psrun::{RunError, SupervisorConfig};
use std::process::exit;

/// Runs a CMD, relaying its output and sampling host statistics (no shell expansion)
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// A command, e.g. "ls -la". A single argument is split into words,
    /// several arguments are used as they are. No shell expansion.
    #[clap(required = true, value_name = "CMD", trailing_var_arg = true, allow_hyphen_values = true)]
    cmd: Vec<String>,

    /// Seconds before SIGTERM (0 = never)
    #[clap(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Seconds from SIGTERM to SIGKILL (0 = never kill)
    #[clap(long, value_name = "SECONDS", default_value = "30")]
    shutdown: u64,

    /// Milliseconds between two polls of the command
    #[clap(long, value_name = "MS", default_value = "1000")]
    poll_interval_ms: u64,

    /// Where to send running info: stdout, stderr, /path/to/file.log or /dev/null
    #[clap(long, default_value = "stdout")]
    runner_log: String,

    /// Max bytes in the runner log file before rotating
    #[clap(long)]
    runner_log_max_bytes: Option<u64>,

    /// Max number of rotated runner log files to keep
    #[clap(long)]
    runner_log_max_files: Option<usize>,

    /// Where to send process info: stdout, stderr, /path/to/file.log or /dev/null
    #[clap(long, default_value = "stdout")]
    ps_log: String,

    /// Max bytes in the process info log file before rotating
    #[clap(long)]
    ps_log_max_bytes: Option<u64>,

    /// Max number of rotated process info log files to keep
    #[clap(long)]
    ps_log_max_files: Option<usize>,

    /// Where to send CMD's stdout: /dev/null, stdout, stderr or /path/to/file.log
    #[clap(long, default_value = "/dev/null")]
    stdout_log: String,

    /// Max bytes in the stdout log file before rotating
    #[clap(long)]
    stdout_log_max_bytes: Option<u64>,

    /// Max number of rotated stdout log files to keep
    #[clap(long)]
    stdout_log_max_files: Option<usize>,

    /// Where to send CMD's stderr: /dev/null, stdout, stderr or /path/to/file.log
    #[clap(long, default_value = "/dev/null")]
    stderr_log: String,

    /// Max bytes in the stderr log file before rotating
    #[clap(long)]
    stderr_log_max_bytes: Option<u64>,

    /// Max number of rotated stderr log files to keep
    #[clap(long)]
    stderr_log_max_files: Option<usize>,
}

impl Args {
    /// argv for the command
    fn command(&self) -> Result<Vec<String>, RunError> {
        match self.cmd.as_slice() {
            [single] => shell_words::split(single).map_err(|e| {
                RunError::InvalidConfiguration(format!("Cannot parse command {:?}: {}", single, e))
            }),
            words => Ok(words.to_vec()),
        }
    }

    fn config(&self) -> Result<SupervisorConfig, RunError> {
        SupervisorConfig::builder()
            .poll_interval_ms(self.poll_interval_ms)
            .timeout_secs(self.timeout.unwrap_or(0))
            .shutdown_secs(self.shutdown)
            .build()
    }

    fn sinks(&self) -> Result<RunSinks, RunError> {
        Ok(RunSinks {
            runner: sink(&self.runner_log, self.runner_log_max_bytes, self.runner_log_max_files)?,
            monitor: sink(&self.ps_log, self.ps_log_max_bytes, self.ps_log_max_files)?,
            stdout: sink(&self.stdout_log, self.stdout_log_max_bytes, self.stdout_log_max_files)?,
            stderr: sink(&self.stderr_log, self.stderr_log_max_bytes, self.stderr_log_max_files)?,
        })
    }
}

fn sink(
    selector: &str,
    max_bytes: Option<u64>,
    max_files: Option<usize>,
) -> Result<Box<dyn LogSink>, RunError> {
    build_sink(&SinkTarget::from(selector), max_bytes, max_files)
}

fn try_main(args: &Args) -> Result<(), RunError> {
    let cmd = args.command()?;
    let config = args.config()?;
    let sinks = args.sinks()?;

    psrun::run(&cmd, config, &sinks)?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::new().filter_or("PSRUN_LOG", "warn")).init();

    let args = Args::parse();
    if let Err(err) = try_main(&args) {
        eprintln!("{} - {}: {}", "Error".red().bold(), err.kind(), err);
        exit(1);
    }
}
