use std::process::ExitCode;

use anyhow::Context;
use colored::Colorize;
use tracing::info;

use fold_engine::{Engine, EngineConfig, RunStats, SnapshotSet};
use fold_reconcile::{CATALOGUE, Coverage, EntityConfig, EntityReport, ReconcileError, ReconciliationReport, entity};

use crate::cli::*;
use crate::files::{DirectorySink, JsonEventFile, load_reference, load_snapshots, write_manifest};

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    match cli.command {
        Command::Replay(args) => cmd_replay(config, args, cli.format),
        Command::Validate(args) => cmd_validate(config, args, cli.format),
        Command::Coverage(args) => cmd_coverage(config, args, cli.format),
    }
}

fn cmd_replay(mut config: EngineConfig, args: ReplayArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    config.validate()?;
    let engine = Engine::new(config);
    let (set, stats) = engine.run(&JsonEventFile::new(&args.events), &DirectorySink::new(&args.out))?;
    write_manifest(&args.out, &set, &stats)?;
    info!(out = %args.out.display(), digest = %stats.digest, "snapshots written");

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => print_run(&set, &stats),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(mut config: EngineConfig, args: ValidateArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    if let Some(samples) = args.samples {
        config.reconcile.samples = samples;
    }
    if let Some(tolerance) = args.tolerance {
        config.reconcile.tolerance = tolerance;
    }
    if args.skew.is_some() {
        config.reconcile.max_skew_secs = args.skew;
    }
    let engine = Engine::new(config);
    let set = load_snapshots(&args.snapshots)?;
    let entities = select(&args.entities, !args.coverage_only)?;

    let report = if args.coverage_only {
        engine.coverage(&set, &entities)
    } else {
        let path = args
            .reference
            .as_deref()
            .context("--reference is required unless --coverage-only is set")?;
        engine.validate(&set, &load_reference(path)?, &entities)?
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(if report.passed() { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

fn cmd_coverage(config: EngineConfig, args: CoverageArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let set = load_snapshots(&args.snapshots)?;
    let entities = select(&args.entities, false)?;
    let report = Engine::new(config).coverage(&set, &entities);
    match format {
        OutputFormat::Json => {
            let coverage: Vec<_> = report.entities.iter().map(|e| &e.coverage).collect();
            println!("{}", serde_json::to_string_pretty(&coverage)?);
        }
        OutputFormat::Text => {
            for entity in &report.entities {
                print_coverage(entity, true);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Resolve entity selectors. With none given, every catalogued entity, or
/// only the compared ones when `compared_only`.
fn select(names: &[String], compared_only: bool) -> Result<Vec<&'static EntityConfig>, ReconcileError> {
    if names.is_empty() {
        return Ok(CATALOGUE.iter().filter(|e| !compared_only || e.is_compared()).collect());
    }
    names
        .iter()
        .map(|name| entity(name).ok_or_else(|| ReconcileError::UnknownEntity(name.clone())))
        .collect()
}

fn print_run(set: &SnapshotSet, stats: &RunStats) {
    println!(
        "{} Replayed {} events over {} keys",
        "✓".green().bold(),
        stats.events.to_string().bold(),
        stats.keys
    );
    for table in set.tables.values() {
        println!("  {:<22} {} rows", table.name, table.len());
    }
    if let Some(as_of) = set.as_of {
        println!("  As of: {}", as_of.to_rfc3339().cyan());
    }
    println!("  Digest: {}", stats.digest.yellow());
    if stats.warnings > 0 {
        println!("  {} {} replay warnings", "!".yellow().bold(), stats.warnings);
        for (table, rows) in &set.warnings {
            for (id, messages) in rows {
                for message in messages {
                    println!("    {table} {}: {message}", id.dimmed());
                }
            }
        }
    }
}

fn print_report(report: &ReconciliationReport) {
    for entity in &report.entities {
        let (ok, failed) = entity.field_totals();
        let mark = if entity.passed() { "✓".green().bold() } else { "✗".red().bold() };
        if !entity.compared {
            println!("{mark} {} (coverage only)", entity.entity.bold());
        } else if let Some(error) = &entity.error {
            println!("{mark} {}: {}", entity.entity.bold(), error.red());
        } else {
            println!(
                "{mark} {}: {} sampled, {} fields passed, {} failed, {} missing",
                entity.entity.bold(),
                entity.sampled,
                ok.to_string().green(),
                failed.to_string().red(),
                entity.missing.len()
            );
        }
        if entity.compared && entity.error.is_none() && entity.sampled == 0 {
            println!("  {}", "reference sample is empty".red());
        }
        for record in &entity.records {
            for outcome in record.failures() {
                println!(
                    "  {} {} {}: expected {}, got {}{}",
                    "✗".red(),
                    record.id.dimmed(),
                    outcome.field,
                    outcome.expected.as_deref().unwrap_or("null"),
                    outcome.actual.as_deref().unwrap_or("null"),
                    outcome.detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
                );
            }
            for warning in &record.warnings {
                println!("  {} {} {}", "!".yellow(), record.id.dimmed(), warning);
            }
        }
        for id in &entity.missing {
            println!("  {} {} has no computed row", "✗".red(), id.dimmed());
        }
        print_coverage(entity, false);
    }

    let verdict = if report.passed() { "PASS".green().bold() } else { "FAIL".red().bold() };
    println!("\n{verdict}");
}

fn print_coverage(entity: &EntityReport, detailed: bool) {
    let coverage = &entity.coverage;
    if detailed {
        println!("{} ({})", entity.entity.bold(), entity.table);
        for field in &coverage.fields {
            let status = match field.coverage {
                Coverage::Covered => field.coverage.to_string().green(),
                Coverage::MappedNotStored => field.coverage.to_string().yellow(),
                Coverage::NotComputed => field.coverage.to_string().dimmed(),
            };
            println!("  {:<38} {:<18} {}", field.field, status, field.column.as_deref().unwrap_or("-"));
        }
    }
    println!(
        "  Coverage: {} covered, {} mapped-not-stored, {} not computed of {}",
        coverage.count(Coverage::Covered).to_string().green(),
        coverage.count(Coverage::MappedNotStored),
        coverage.count(Coverage::NotComputed),
        coverage.fields.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selection() {
        let compared = select(&[], true).unwrap();
        assert!(compared.iter().all(|e| e.is_compared()));
        assert_eq!(compared.len(), CATALOGUE.len());
        assert_eq!(compared[0].key, "allocation");
        assert_eq!(select(&[], false).unwrap().len(), CATALOGUE.len());
    }

    #[test]
    fn named_selection() {
        let picked = select(&["Indexer".to_string(), "signal".to_string()], true).unwrap();
        assert_eq!(picked.iter().map(|e| e.key).collect::<Vec<_>>(), vec!["indexer", "signal"]);
        assert_eq!(
            select(&["billing".to_string()], false).unwrap_err(),
            ReconcileError::UnknownEntity("billing".into())
        );
    }
}
