use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(
    name = "fold",
    about = "Ledgerfold: deterministic ledger replay and reconciliation",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recompute every snapshot table from an event file
    Replay(ReplayArgs),
    /// Reconcile computed tables against a reference sample
    Validate(ValidateArgs),
    /// Show which reference fields the computed tables reproduce
    Coverage(CoverageArgs),
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON file holding an array of source batches.
    #[arg(long)]
    pub events: PathBuf,
    /// Directory the snapshot tables are written to.
    #[arg(long)]
    pub out: PathBuf,
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Entities to reconcile; all compared entities when empty.
    pub entities: Vec<String>,
    #[arg(long)]
    pub snapshots: PathBuf,
    /// JSON file mapping entity names to reference records.
    #[arg(long)]
    pub reference: Option<PathBuf>,
    #[arg(long)]
    pub samples: Option<usize>,
    /// Relative tolerance, e.g. 0.01 for 1%.
    #[arg(long)]
    pub tolerance: Option<Decimal>,
    /// Maximum timestamp skew in seconds.
    #[arg(long)]
    pub skew: Option<i64>,
    #[arg(long)]
    pub coverage_only: bool,
}

#[derive(Args, Debug)]
pub struct CoverageArgs {
    /// Entities to report; every catalogued entity when empty.
    pub entities: Vec<String>,
    #[arg(long)]
    pub snapshots: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replay() {
        let cli = Cli::try_parse_from(["fold", "replay", "--events", "events.json", "--out", "out"]).unwrap();
        let Command::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.events, PathBuf::from("events.json"));
        assert_eq!(args.workers, None);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn parses_validate_overrides() {
        let cli = Cli::try_parse_from([
            "fold",
            "validate",
            "delegator",
            "indexer",
            "--snapshots",
            "out",
            "--reference",
            "reference.json",
            "--samples",
            "5",
            "--tolerance",
            "0.005",
            "--skew",
            "2",
            "--format",
            "json",
            "--config",
            "ledgerfold.toml",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("ledgerfold.toml")));
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.entities, vec!["delegator", "indexer"]);
        assert_eq!(args.samples, Some(5));
        assert_eq!(args.tolerance, Some(Decimal::new(5, 3)));
        assert_eq!(args.skew, Some(2));
        assert!(!args.coverage_only);
    }

    #[test]
    fn coverage_needs_snapshots() {
        assert!(Cli::try_parse_from(["fold", "coverage"]).is_err());
        assert!(Cli::try_parse_from(["fold", "coverage", "--snapshots", "out", "-v"]).unwrap().verbose);
    }
}
