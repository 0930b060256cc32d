mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use output::Output;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "contexa", version, about = "Offline tooling for Contexa SDK integrations")]
struct Cli {
    /// Print machine-readable JSON instead of tables.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[arg(long, short, global = true, default_value_t = false)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the SDK and CLI versions.
    Version,
    /// Validate a TOML settings file.
    CheckConfig { path: PathBuf },
    /// Classify a captured push payload; `-` reads stdin.
    DecodePush { path: PathBuf },
    /// Normalize a platform device token to lowercase hex.
    Token { value: String },
    /// List the environment error codes.
    ErrorCodes,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("contexa error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let output = Output::new(cli.json, cli.quiet);
    match cli.command {
        Command::Version => {
            output.emit_kv_rows(
                "version",
                &[
                    ("sdk".to_owned(), contexa_sdk::version().to_owned()),
                    ("cli".to_owned(), env!("CARGO_PKG_VERSION").to_owned()),
                ],
            );
            Ok(())
        }
        Command::CheckConfig { path } => {
            let report = commands::check_config(&path)?;
            output.emit_record("settings", &report)
        }
        Command::DecodePush { path } => {
            let raw = read_input(&path)?;
            let report = commands::decode_push(&raw)?;
            output.emit_record("push payload", &report)
        }
        Command::Token { value } => {
            output.emit_message(commands::normalize_token(&value)?);
            Ok(())
        }
        Command::ErrorCodes => {
            output.emit_rows("error codes", &["code", "name"], &commands::error_code_rows())
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw).context("failed to read stdin")?;
        return Ok(raw);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
