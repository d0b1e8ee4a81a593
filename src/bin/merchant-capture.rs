//! CLI for inspecting, resetting and replaying captured merchant sessions.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use indicatif::{ProgressBar, ProgressStyle};
use merchant_capture::bridge::{Bridge, BridgeResponse};
use merchant_capture::config::CaptureConfig;
use merchant_capture::legacy;
use merchant_capture::message::{self, Message, Reply};
use merchant_capture::models::{MerchantRecord, Platform, Snapshot};
use merchant_capture::notify::Notifier;
use merchant_capture::signal::Captured;
use merchant_capture::storage::{BlockingStorage, FileStorage};
use merchant_capture::store::{Outcome, StoreHandle};
use owo_colors::OwoColorize;
use serde::Deserialize;

/// Extra time granted after the pending timeout before the final snapshot
/// is read.
const DRAIN_MARGIN: core::time::Duration = core::time::Duration::from_millis(100);

/// Merchant capture CLI: inspect and replay captured sessions.
#[derive(Debug, Parser)]
#[command(name = "merchant-capture", version, about)]
struct Cli {
    /// Override the storage directory (default: XDG data dir).
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Show the persisted records.
    Show {
        /// Only show one platform.
        #[arg(long)]
        platform: Option<Platform>,
    },
    /// Clear all captured records.
    Reset,
    /// Feed recorded traffic and messages (JSON lines) through the store.
    Replay {
        /// File with one captured event or runtime message per line.
        file: PathBuf,
    },
    /// Answer a snapshot request as the read bridge would.
    Bridge {
        /// Origin presenting the request.
        #[arg(long)]
        origin: String,
        /// Only request one platform.
        #[arg(long)]
        platform: Option<Platform>,
    },
}

/// One line of a replay file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    /// Observed request or response.
    Captured(Captured),
    /// Runtime message.
    Message(Message),
}

/// Per-outcome counters for a replay run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ReplayTally {
    /// Lines that changed records.
    stored: usize,
    /// Credentials held for identity.
    pending: usize,
    /// Lines with no effect.
    ignored: usize,
    /// Lines that did not parse.
    unreadable: usize,
}

impl ReplayTally {
    /// Counts one outcome.
    const fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Stored => self.stored += 1,
            Outcome::Pending => self.pending += 1,
            Outcome::Ignored => self.ignored += 1,
        }
    }
}

/// Parses a replay file body, skipping blank lines.
fn parse_replay(contents: &str) -> Vec<Result<ReplayLine, serde_json::Error>> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str)
        .collect()
}

/// Runs the CLI, returning an appropriate exit code.
fn run() -> io::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let _dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match CaptureConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            writeln!(io::stderr().lock(), "{} {err}", "error:".red().bold())?;
            return Ok(ExitCode::FAILURE);
        }
    };
    let data_dir = cli.data_dir.or_else(|| config.data_dir.clone());

    let storage = match create_storage(data_dir) {
        Ok(storage) => storage,
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} failed to initialize storage: {err}",
                "error:".red().bold()
            )?;
            return Ok(ExitCode::FAILURE);
        }
    };

    dispatch(storage, &config, cli.command)
}

/// Creates the storage backend, using `data_dir` if provided or the
/// default XDG data directory otherwise.
fn create_storage(data_dir: Option<PathBuf>) -> merchant_capture::Result<FileStorage> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => FileStorage::default_dir()?,
    };
    FileStorage::new(dir)
}

/// Dispatches to the appropriate subcommand handler.
fn dispatch(storage: FileStorage, config: &CaptureConfig, command: Command) -> io::Result<ExitCode> {
    match command {
        Command::Show { platform } => cmd_show(&storage, platform),
        Command::Reset => block_on(cmd_reset(storage, config)),
        Command::Replay { file } => block_on(cmd_replay(storage, config, &file)),
        Command::Bridge { origin, platform } => {
            block_on(cmd_bridge(storage, config, &origin, platform))
        }
    }
}

/// Runs `future` on a fresh current-thread runtime.
fn block_on<F: Future<Output = io::Result<ExitCode>>>(future: F) -> io::Result<ExitCode> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?
        .block_on(future)
}

/// Starts a store over `storage`, printing a message on failure.
async fn start_store(storage: FileStorage, config: &CaptureConfig) -> io::Result<Option<StoreHandle>> {
    match StoreHandle::start(Arc::new(storage), Notifier::new(), config).await {
        Ok(store) => Ok(Some(store)),
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} failed to load captured state: {err}",
                "error:".red().bold()
            )?;
            Ok(None)
        }
    }
}

/// Stops the store, printing a message if it had already gone away.
async fn stop_store(store: StoreHandle) -> io::Result<()> {
    if let Err(err) = store.shutdown().await {
        writeln!(
            io::stderr().lock(),
            "{} store stopped early: {err}",
            "warning:".yellow().bold()
        )?;
    }
    Ok(())
}

/// Executes the `show` subcommand: prints the persisted records.
fn cmd_show<S: BlockingStorage>(storage: &S, platform: Option<Platform>) -> io::Result<ExitCode> {
    match storage.load() {
        Ok(raw) => {
            let snapshot = raw
                .map(|raw| legacy::normalize(&raw, chrono::Utc::now()))
                .unwrap_or_default();
            let snapshot = match platform {
                Some(platform) => snapshot.only(platform),
                None => snapshot,
            };
            print_snapshot(&snapshot)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} failed to read captured state: {err}",
                "error:".red().bold()
            )?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `reset` subcommand: clears every record.
async fn cmd_reset(storage: FileStorage, config: &CaptureConfig) -> io::Result<ExitCode> {
    let Some(store) = start_store(storage, config).await? else {
        return Ok(ExitCode::FAILURE);
    };
    let result = store.reset().await;
    stop_store(store).await?;
    match result {
        Ok(()) => {
            writeln!(io::stdout().lock(), "{}", "Captured data cleared.".green().bold())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} reset failed: {err}",
                "error:".red().bold()
            )?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `replay` subcommand: feeds a recorded session through the
/// store and prints the resulting records.
async fn cmd_replay(
    storage: FileStorage,
    config: &CaptureConfig,
    file: &Path,
) -> io::Result<ExitCode> {
    let contents = match fs::read_to_string(file) {
        Ok(contents) => contents,
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} cannot read {}: {err}",
                "error:".red().bold(),
                file.display()
            )?;
            return Ok(ExitCode::FAILURE);
        }
    };
    let Some(store) = start_store(storage, config).await? else {
        return Ok(ExitCode::FAILURE);
    };

    let mut tally = ReplayTally::default();
    for (index, line) in parse_replay(&contents).into_iter().enumerate() {
        let outcome = match line {
            Ok(ReplayLine::Captured(captured)) => captured.submit(&store).await,
            Ok(ReplayLine::Message(message)) => {
                message::route(&store, message)
                    .await
                    .map(|reply| match reply {
                        Reply::Submitted(outcome) => outcome,
                        Reply::Cleared => Outcome::Stored,
                        Reply::Snapshot(_) => Outcome::Ignored,
                    })
            }
            Err(err) => {
                tracing::warn!(line = index + 1, error = %err, "unreadable replay line");
                tally.unreadable += 1;
                continue;
            }
        };
        match outcome {
            Ok(outcome) => tally.record(outcome),
            Err(err) => {
                writeln!(
                    io::stderr().lock(),
                    "{} replay stopped: {err}",
                    "error:".red().bold()
                )?;
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    if tally.pending > 0 {
        let spinner = make_spinner("Waiting for pending credentials...");
        tokio::time::sleep(config.pending_timeout + DRAIN_MARGIN).await;
        spinner.finish_and_clear();
    }
    let snapshot = store.snapshot();
    stop_store(store).await?;

    print_tally(&tally)?;
    print_snapshot(&snapshot)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `bridge` subcommand: answers one snapshot request as
/// `origin` and prints the JSON response.
async fn cmd_bridge(
    storage: FileStorage,
    config: &CaptureConfig,
    origin: &str,
    platform: Option<Platform>,
) -> io::Result<ExitCode> {
    let Some(store) = start_store(storage, config).await? else {
        return Ok(ExitCode::FAILURE);
    };
    let bridge = Bridge::from_config(config, store.clone());
    let request = serde_json::json!({ "type": "GET_SNAPSHOT", "platform": platform });
    let response = bridge.handle(origin, &request);
    stop_store(store).await?;

    let authorized = !matches!(response, BridgeResponse::Unauthorized { .. });
    let json = serde_json::to_string_pretty(&response).map_err(io::Error::other)?;
    writeln!(io::stdout().lock(), "{json}")?;
    if authorized {
        Ok(ExitCode::SUCCESS)
    } else {
        writeln!(
            io::stderr().lock(),
            "{} origin {} is not allowed",
            "error:".red().bold(),
            origin.bold()
        )?;
        Ok(ExitCode::FAILURE)
    }
}

// ── Output formatting ────────────────────────────────────────────────

/// Prints both platforms' records in one table.
fn print_snapshot(snapshot: &Snapshot) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if snapshot.is_empty() {
        writeln!(out, "{}", "No captured records.".dimmed())?;
        return Ok(());
    }

    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("Platform").fg(Color::Cyan),
        Cell::new("Code").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Credential").fg(Color::Cyan),
        Cell::new("Observed").fg(Color::Cyan),
    ]);

    for platform in Platform::ALL {
        for record in snapshot.records(platform) {
            _ = table.add_row(record_row(record));
        }
    }

    writeln!(
        out,
        "{} {}",
        "Captured Merchants".green().bold(),
        format_args!("({})", snapshot.len()).dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Builds one table row for `record`.
fn record_row(record: &MerchantRecord) -> Vec<Cell> {
    let code_cell = record.business_code.as_ref().map_or_else(
        || Cell::new("unidentified").fg(Color::Yellow),
        |code| Cell::new(code.as_inner()),
    );
    let name = record.display_name.as_deref().unwrap_or("\u{2014}");
    let credential_cell = record
        .credential
        .as_ref()
        .and_then(|credential| credential.primary())
        .map_or_else(
            || Cell::new("\u{2014}").fg(Color::DarkGrey),
            |token| Cell::new(mask(token.as_inner())).fg(Color::Green),
        );
    vec![
        Cell::new(record.platform),
        code_cell,
        Cell::new(name),
        credential_cell,
        Cell::new(record.observed_at.format("%Y-%m-%d %H:%M:%S")),
    ]
}

/// Shortens a token for display, keeping only its ends.
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars.iter().take(4).collect();
    let tail: String = chars.iter().skip(chars.len() - 4).collect();
    format!("{head}\u{2026}{tail}")
}

/// Prints replay counters.
fn print_tally(tally: &ReplayTally) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", "Replay complete!".green().bold())?;
    writeln!(out)?;

    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("Outcome").fg(Color::Cyan),
        Cell::new("Lines").fg(Color::Cyan),
    ]);
    let rows: &[(&str, usize)] = &[
        ("Stored", tally.stored),
        ("Pending", tally.pending),
        ("Ignored", tally.ignored),
        ("Unreadable", tally.unreadable),
    ];
    for &(name, count) in rows {
        let count_cell = if count > 0 {
            Cell::new(count).fg(Color::Green)
        } else {
            Cell::new(count).fg(Color::DarkGrey)
        };
        _ = table.add_row(vec![Cell::new(name), count_cell]);
    }
    writeln!(out, "{table}")?;
    Ok(())
}

/// Creates a spinner with the given message.
fn make_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_owned());
    spinner.enable_steady_tick(core::time::Duration::from_millis(80));
    spinner
}

/// Entry point.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            let _ignored = writeln!(io::stderr(), "fatal I/O error: {err}");
            ExitCode::FAILURE
        }
    }
}
