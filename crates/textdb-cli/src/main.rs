//! TextDB CLI
//!
//! Command-line access to a TextDB directory tree:
//! - Printing documents and subtrees
//! - Temporal queries against directories carrying a validity log
//! - Remapping record collections by a nested attribute
//! - Validating validity logs before they are committed

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use textdb_core::{format_timestamp, TemporalQuery, WILDCARD_SELECTOR};
use textdb_loader::{is_root_path, read_validity, LoaderConfig, TextDb};

#[derive(Parser, Debug)]
#[command(name = "textdb")]
#[command(author, version, about = "TextDB: versioned JSON/YAML metadata trees")]
struct Cli {
    /// Database root directory
    #[arg(long, global = true, env = "TEXTDB_PATH")]
    db: Option<PathBuf>,

    /// Loader configuration file (JSON or YAML); `--db` is appended to its roots
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a document or directory as JSON
    Show {
        /// Slash-separated path, e.g. `hardware/detectors.json` (default: root)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Resolve a directory as of a timestamp
    On {
        /// `YYYYMMDDTHHMMSSZ` or RFC 3339
        timestamp: String,
        /// Directory to resolve (default: root)
        #[arg(long, default_value = ".")]
        dir: String,
        #[arg(long, default_value = WILDCARD_SELECTOR)]
        selector: String,
        /// Only merge active keys matching this regex
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Print the active key set of a directory's validity log
    Active {
        dir: String,
        timestamp: String,
        #[arg(long, default_value = WILDCARD_SELECTOR)]
        selector: String,
    },

    /// Re-index a collection by a dotted attribute path
    Map {
        /// Directory or document holding the records
        dir: String,
        /// Dotted attribute path, e.g. `daq.card.id`
        label: String,
        /// Group records sharing a key instead of requiring uniqueness
        #[arg(long)]
        group: bool,
    },

    /// Validate files without loading a database
    Check {
        #[command(subcommand)]
        command: CheckCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CheckCommands {
    /// Parse validity logs and report targets with no matching document
    Validity {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Show { path } => cmd_show(&open_db(&cli)?, path),
        Commands::On {
            timestamp,
            dir,
            selector,
            pattern,
        } => cmd_on(&open_db(&cli)?, dir, timestamp, selector, pattern.as_deref()),
        Commands::Active {
            dir,
            timestamp,
            selector,
        } => cmd_active(&open_db(&cli)?, dir, timestamp, selector),
        Commands::Map { dir, label, group } => cmd_map(&open_db(&cli)?, dir, label, !group),
        Commands::Check { command } => match command {
            CheckCommands::Validity { files } => cmd_check_validity(files),
        },
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn loader_config(cli: &Cli) -> Result<LoaderConfig> {
    let mut config = match &cli.config {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("failed to read loader config {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.roots.push(db.clone());
    }
    if config.roots.is_empty() {
        bail!("no database given: pass --db, set TEXTDB_PATH or list roots in --config");
    }
    Ok(config)
}

fn open_db(cli: &Cli) -> Result<TextDb> {
    let config = loader_config(cli)?;
    TextDb::open(config).context("failed to load database")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_show(db: &TextDb, path: &str) -> Result<()> {
    if is_root_path(path) {
        return print_json(&db.root().to_value());
    }
    print_json(&db.get(path)?.to_value())
}

fn cmd_on(
    db: &TextDb,
    dir: &str,
    timestamp: &str,
    selector: &str,
    pattern: Option<&str>,
) -> Result<()> {
    let mut query = TemporalQuery::new(timestamp)?.with_selector(selector);
    if let Some(pattern) = pattern {
        let re = Regex::new(pattern).with_context(|| format!("invalid pattern '{pattern}'"))?;
        query = query.with_pattern(re);
    }
    let view = db.on(dir, &query)?;
    eprintln!(
        "{} {} at {} ({} = {})",
        "resolved".green().bold(),
        dir,
        format_timestamp(&query.timestamp()),
        "selector".dimmed(),
        selector
    );
    print_json(&view.to_value())
}

fn cmd_active(db: &TextDb, dir: &str, timestamp: &str, selector: &str) -> Result<()> {
    let active = db.active(dir, selector, timestamp)?;
    if active.is_empty() {
        eprintln!("{} nothing active in {} at {}", "note".yellow().bold(), dir, timestamp);
    }
    for key in &active {
        println!("{key}");
    }
    Ok(())
}

fn cmd_map(db: &TextDb, dir: &str, label: &str, unique: bool) -> Result<()> {
    let remapped = db.map(dir, label, unique)?;
    if remapped.is_empty() {
        eprintln!("{} no record in {} has a value at '{}'", "note".yellow().bold(), dir, label);
    }
    print_json(&remapped.to_value()?)
}

/// Outcome of checking one validity file.
#[derive(Debug, PartialEq)]
enum CheckOutcome {
    Ok { records: usize },
    Dangling(Vec<String>),
}

fn check_validity_file(path: &Path) -> Result<CheckOutcome> {
    let log = read_validity(path)?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let siblings = TextDb::open_path(dir)
        .with_context(|| format!("failed to load directory {}", dir.display()))?;

    let dangling: Vec<String> = log
        .dangling_targets(siblings.root())
        .into_iter()
        .map(str::to_string)
        .collect();
    if dangling.is_empty() {
        Ok(CheckOutcome::Ok { records: log.len() })
    } else {
        Ok(CheckOutcome::Dangling(dangling))
    }
}

fn cmd_check_validity(files: &[PathBuf]) -> Result<()> {
    let mut failures = 0usize;
    for file in files {
        match check_validity_file(file) {
            Ok(CheckOutcome::Ok { records }) => {
                println!("{} {} ({} records)", "ok".green().bold(), file.display(), records);
            }
            Ok(CheckOutcome::Dangling(targets)) => {
                failures += 1;
                println!(
                    "{} {}: no document for {}",
                    "fail".red().bold(),
                    file.display(),
                    targets.join(", ")
                );
            }
            Err(err) => {
                failures += 1;
                println!("{} {}: {:#}", "fail".red().bold(), file.display(), err);
            }
        }
    }
    if failures > 0 {
        return Err(anyhow!("{failures} of {} validity files failed", files.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_global_db_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["textdb", "on", "20230101T000000Z", "--db", "/srv/meta", "-vv"])
            .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/srv/meta")));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::On { dir, selector, pattern, .. } => {
                assert_eq!(dir, ".");
                assert_eq!(selector, "all");
                assert!(pattern.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn map_defaults_to_unique() {
        let cli = Cli::try_parse_from(["textdb", "map", "hardware", "daq.card.id"]).unwrap();
        assert!(matches!(cli.command, Commands::Map { group: false, .. }));
        let cli = Cli::try_parse_from(["textdb", "map", "hardware", "system", "--group"]).unwrap();
        assert!(matches!(cli.command, Commands::Map { group: true, .. }));
    }

    #[test]
    fn check_validity_requires_files() {
        assert!(Cli::try_parse_from(["textdb", "check", "validity"]).is_err());
    }

    #[test]
    fn check_reports_dangling_targets() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        let log = dir.path().join("validity.jsonl");
        fs::write(
            &log,
            concat!(
                r#"{"valid_from": "20230101T000000Z", "apply": ["a.json"]}"#,
                "\n",
                r#"{"valid_from": "20230102T000000Z", "mode": "append", "apply": ["b.json"]}"#,
            ),
        )
        .unwrap();

        assert_eq!(
            check_validity_file(&log).unwrap(),
            CheckOutcome::Dangling(vec!["b".to_string()])
        );
        assert!(cmd_check_validity(&[log.clone()]).is_err());

        fs::write(dir.path().join("b.yaml"), "x: 1\n").unwrap();
        assert_eq!(check_validity_file(&log).unwrap(), CheckOutcome::Ok { records: 2 });
        assert!(cmd_check_validity(&[log]).is_ok());
    }

    #[test]
    fn check_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("validity.jsonl");
        fs::write(&log, r#"{"valid_from": "yesterday", "apply": []}"#).unwrap();
        assert!(check_validity_file(&log).is_err());
    }

    #[test]
    fn map_refuses_keys_that_print_alike() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"x": 1}"#).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"x": "1"}"#).unwrap();
        let db = TextDb::open_path(dir.path()).unwrap();

        let err = cmd_map(&db, ".", "x", true).unwrap_err();
        assert!(err.to_string().contains("both render as key"));
        assert!(cmd_map(&db, "./", "x", false).is_err());
        assert!(cmd_show(&db, "./").is_ok());
    }

    #[test]
    fn missing_database_is_reported() {
        let cli = Cli::try_parse_from(["textdb", "show"]).unwrap();
        let cli = Cli { db: None, ..cli };
        assert!(loader_config(&cli).is_err());
    }
}
