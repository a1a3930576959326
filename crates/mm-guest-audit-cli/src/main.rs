#![forbid(unsafe_code)]

mod client;
mod config;
mod output;
mod prompt;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mm_guest_audit_core::{AuditOptions, Outcome, run_audit};
use output::{CliError, OutputFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::client::MattermostClient;
use crate::config::{ConfigError, Credentials, Overrides, Settings};

/// Exit code when the rendered report could not be written.
const EXIT_OUTPUT_ERROR: u8 = 4;

#[derive(Parser, Debug)]
#[command(
    name = "mm-guest-audit",
    version,
    about = "Audit guest accounts on a Mattermost server",
    long_about = "Lists every guest account with its teams, channels, last login and \
                  last post, and flags guests inactive for longer than a threshold. \
                  Read-only: nothing on the server is modified.",
    after_help = "EXAMPLES:\n    # Token auth, table output\n    mm-guest-audit --url https://mm.example.com --token <PAT>\n\n    # Guests of one team idle for 90 days, as CSV\n    mm-guest-audit --team sales --inactive-days 90 --format csv --output guests.csv\n\nEXIT CODES:\n    0 success, 1 configuration or authentication error, 2 API error,\n    3 completed with failed guest lookups, 4 output error"
)]
struct Cli {
    /// Mattermost server URL [env: MM_URL]
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Personal access token [env: MM_TOKEN]
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Username for password auth [env: MM_USERNAME]
    #[arg(long, value_name = "NAME")]
    username: Option<String>,

    /// Scope the report to a single team, by URL name.
    #[arg(long, value_name = "NAME")]
    team: Option<String>,

    /// Flag guests with no login in the last N days (0 disables).
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    inactive_days: Option<i64>,

    /// Output format.
    #[arg(long, value_enum, value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// Write the report to this file instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Read settings from this config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging to stderr.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            url: self.url.clone(),
            token: self.token.clone(),
            username: self.username.clone(),
            team: self.team.clone(),
            inactive_days: self.inactive_days,
            format: self.format,
            output: self.output.clone(),
        }
    }
}

/// A fatal error with the exit code it maps to.
struct Failure {
    code: u8,
    error: CliError,
}

impl Failure {
    fn outcome(outcome: Outcome, message: impl Into<String>) -> Self {
        let error = match outcome.hint() {
            Some(hint) => CliError::with_details(message, hint, outcome.as_str()),
            None => CliError::new(message),
        };
        Self {
            code: outcome.exit_code(),
            error,
        }
    }

    fn config(err: &ConfigError) -> Self {
        Self::outcome(Outcome::ConfigurationError, err.to_string())
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("MM_GUEST_AUDIT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "mm_guest_audit=debug,mm_guest_audit_core=debug,warn"
        } else {
            "warn"
        })
    });

    let format = env::var("MM_GUEST_AUDIT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn connect(settings: &Settings) -> Result<MattermostClient, Failure> {
    let connected = match &settings.credentials {
        Credentials::Token(token) => {
            MattermostClient::with_token(&settings.server_url, token, settings.timeout)
        }
        Credentials::Login { username } => {
            let password =
                prompt::obtain_password(env_lookup).map_err(|err| Failure::config(&err))?;
            MattermostClient::login(&settings.server_url, username, &password, settings.timeout)
        }
    };
    connected.map_err(|err| Failure::outcome(Outcome::ConfigurationError, err.to_string()))
}

fn run(cli: &Cli) -> Result<Outcome, Failure> {
    let file = config::load_file_config(cli.config.as_deref()).map_err(|err| Failure::config(&err))?;
    let settings = config::resolve_settings(&cli.overrides(), env_lookup, &file)
        .map_err(|err| Failure::config(&err))?;

    let client = connect(&settings)?;
    tracing::info!("authentication successful");

    let options = AuditOptions::new(settings.team.clone(), settings.inactive_days);
    let report = run_audit(&client, &options)
        .map_err(|err| Failure::outcome(err.outcome(), err.to_string()))?;
    tracing::debug!(requests = client.request_count(), "api requests sent");

    output::write_report(&report.result, settings.format, settings.output.as_deref()).map_err(
        |err| Failure {
            code: EXIT_OUTPUT_ERROR,
            error: CliError::with_details(
                err.to_string(),
                "Check that the output path is writable.",
                "output_error",
            ),
        },
    )?;

    if report.outcome == Outcome::PartialFailure {
        tracing::warn!(
            failed = report.result.summary.failed_lookups,
            "{}",
            report.outcome.message()
        );
    }
    Ok(report.outcome)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout and succeed; usage errors are configuration errors.
            let code = if err.use_stderr() {
                Outcome::ConfigurationError.exit_code()
            } else {
                Outcome::Success.exit_code()
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    init_tracing(cli.verbose);
    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    match run(&cli) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(failure) => {
            output::render_error(cli.format.unwrap_or_default(), &failure.error);
            ExitCode::from(failure.code)
        }
    }
}
