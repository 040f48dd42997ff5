use std::{
    fs,
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{error::ErrorKind as ClapErrorKind, Parser, Subcommand};
use controller::PwmController;
use shared::{
    domain::{ChannelState, Polarity},
    error::PwmError,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "pwmctl", version, about = "Drive a simulated PWM controller")]
struct Cli {
    /// Number of channels, overriding the config file and environment.
    #[arg(long)]
    channels: Option<u32>,
    /// Config file; defaults to ./pwmctl.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print channel snapshots as JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    Request {
        channel: u32,
        #[arg(long)]
        label: Option<String>,
    },
    Free {
        channel: u32,
    },
    Configure {
        channel: u32,
        #[arg(allow_negative_numbers = true)]
        duty_ns: i64,
        #[arg(allow_negative_numbers = true)]
        period_ns: i64,
    },
    Polarity {
        channel: u32,
        polarity: Polarity,
    },
    Enable {
        channel: u32,
    },
    Disable {
        channel: u32,
    },
    /// Print one channel's state.
    Status {
        channel: u32,
    },
    /// Print every channel's state.
    List,
    /// Run one command per line from FILE, or stdin when omitted.
    Session {
        file: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct SessionLine {
    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    init_tracing(&settings.log_filter);

    match run(&cli, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = report(&err, &mut io::stderr().lock());
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli, settings: &Settings) -> Result<()> {
    let channel_count = cli.channels.unwrap_or(settings.channels);
    let controller = PwmController::with_name(settings.name.clone(), channel_count)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Command::Session { file: Some(path) } => {
            let file = fs::File::open(path)
                .with_context(|| format!("failed to open session file '{}'", path.display()))?;
            run_session(&controller, BufReader::new(file), cli.json, &mut out)
        }
        Command::Session { file: None } => {
            run_session(&controller, io::stdin().lock(), cli.json, &mut out)
        }
        command => execute(&controller, command, cli.json, &mut out),
    }
}

/// Runs commands line by line against one controller, stopping at the
/// first failure. Blank lines and `#` comments are skipped.
fn run_session(
    controller: &PwmController,
    input: impl BufRead,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    for (line_no, line) in input.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.context("failed to read session input")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        debug!(line_no, line, "session command");
        let parsed = SessionLine::try_parse_from(line.split_whitespace())
            .with_context(|| format!("session line {line_no}: '{line}'"))?;
        if matches!(parsed.command, Command::Session { .. }) {
            let err = clap::Error::raw(
                ClapErrorKind::InvalidSubcommand,
                "sessions cannot be nested\n",
            );
            return Err(err).with_context(|| format!("session line {line_no}"));
        }

        execute(controller, &parsed.command, json, out)
            .with_context(|| format!("session line {line_no}: '{line}'"))?;
    }

    Ok(())
}

fn execute(
    controller: &PwmController,
    command: &Command,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::Request { channel, label } => match label {
            Some(label) => controller.request_labeled(*channel, label.clone())?,
            None => controller.request(*channel)?,
        },
        Command::Free { channel } => controller.free(*channel)?,
        Command::Configure {
            channel,
            duty_ns,
            period_ns,
        } => controller.configure(*channel, *duty_ns, *period_ns)?,
        Command::Polarity { channel, polarity } => controller.set_polarity(*channel, *polarity)?,
        Command::Enable { channel } => controller.enable(*channel)?,
        Command::Disable { channel } => controller.disable(*channel)?,
        Command::Status { channel } => {
            let state = controller.snapshot(*channel)?;
            print_state(&state, json, out)?;
        }
        Command::List => {
            for state in controller.snapshot_all() {
                print_state(&state, json, out)?;
            }
        }
        Command::Session { .. } => {
            anyhow::bail!("session can only be started from the command line")
        }
    }

    Ok(())
}

fn print_state(state: &ChannelState, json: bool, out: &mut dyn Write) -> Result<()> {
    if json {
        serde_json::to_writer(&mut *out, state)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{state}")?;
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(pwm) = err.downcast_ref::<PwmError>() {
        pwm.kind().exit_code()
    } else if err.downcast_ref::<clap::Error>().is_some() {
        EXIT_USAGE
    } else {
        EXIT_FAILURE
    }
}

/// Writes the `pin:<n>;error:<kind>` line for channel errors, then the message.
fn report(err: &anyhow::Error, out: &mut dyn Write) -> io::Result<()> {
    if let Some(pwm) = err.downcast_ref::<PwmError>() {
        if let Some(index) = pwm.channel() {
            writeln!(out, "pin:{index};error:{}", pwm.kind())?;
        }
    }
    writeln!(out, "error: {err:#}")
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
