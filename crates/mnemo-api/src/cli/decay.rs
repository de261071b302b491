//! Retention commands: one full decay pass, individual phases, and stats.

use anyhow::Result;
use clap::Subcommand;
use console::style;

use mnemo_types::decay::{ArchiveReport, DecayReport, EntityDecayReport, PruneReport};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum DecayCommand {
    /// Run one full pass: archive conversations, decay entities, prune orphans.
    Run {
        /// Report what would change without writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Summarize and trim conversations past the retention window.
    Archive {
        #[arg(long)]
        dry_run: bool,
    },

    /// Lower confidence of entities untouched past the grace period.
    Entities {
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete orphaned summaries and weak, unconnected entities.
    Prune {
        #[arg(long)]
        dry_run: bool,
    },

    /// Show retention statistics.
    Stats,
}

impl DecayCommand {
    pub fn dry_run(&self) -> bool {
        match self {
            DecayCommand::Run { dry_run }
            | DecayCommand::Archive { dry_run }
            | DecayCommand::Entities { dry_run }
            | DecayCommand::Prune { dry_run } => *dry_run,
            DecayCommand::Stats => false,
        }
    }
}

/// Dispatch a decay subcommand.
///
/// # Examples
///
/// ```bash
/// mnemo decay run --dry-run
/// mnemo decay stats --json
/// ```
pub async fn handle(state: &AppState, action: DecayCommand, json: bool) -> Result<()> {
    match action {
        DecayCommand::Run { dry_run } => run_pass(state, dry_run, json).await,
        DecayCommand::Archive { dry_run } => {
            let report = state.decay.archive_old_conversations(dry_run).await?;
            compact(state, dry_run).await;
            if json {
                return super::print_json(&report);
            }
            print_header("Archive", dry_run);
            print_archive(&report);
            println!();
            Ok(())
        }
        DecayCommand::Entities { dry_run } => {
            let report = state.decay.apply_entity_decay(dry_run).await?;
            if json {
                return super::print_json(&report);
            }
            print_header("Entity decay", dry_run);
            print_entity_decay(&report);
            println!();
            Ok(())
        }
        DecayCommand::Prune { dry_run } => {
            let report = state.decay.prune_orphaned_data(dry_run).await?;
            compact(state, dry_run).await;
            if json {
                return super::print_json(&report);
            }
            print_header("Prune", dry_run);
            print_prune(&report);
            println!();
            Ok(())
        }
        DecayCommand::Stats => stats(state, json).await,
    }
}

/// Truncate the WAL after a real pass; deletes leave it bloated.
async fn compact(state: &AppState, dry_run: bool) {
    if dry_run {
        return;
    }
    if let Err(e) = state.db.checkpoint().await {
        tracing::warn!(error = %e, "wal checkpoint failed");
    }
}

async fn run_pass(state: &AppState, dry_run: bool, json: bool) -> Result<()> {
    let report = state.decay.run_decay_process(dry_run).await;
    compact(state, dry_run).await;

    if json {
        super::print_json(&report)?;
    } else {
        print_report(&report);
    }

    // A failed phase must surface as a non-zero exit for the scheduler.
    if !report.phase_errors.is_empty() {
        anyhow::bail!(
            "{} decay phase(s) failed: {}",
            report.phase_errors.len(),
            report.phase_errors.join("; ")
        );
    }
    Ok(())
}

fn print_header(title: &str, dry_run: bool) {
    println!();
    if dry_run {
        println!(
            "  {} {} {}",
            style("~").yellow().bold(),
            style(title).bold(),
            style("(dry run, nothing written)").dim()
        );
    } else {
        println!("  {} {}", style("✓").green().bold(), style(title).bold());
    }
    println!();
}

fn print_report(report: &DecayReport) {
    print_header("Decay pass", report.dry_run);

    println!("  {}", style("── Conversations ──").dim());
    match &report.archive {
        Some(archive) => print_archive(archive),
        None => println!("  {}", style("phase failed").red()),
    }
    println!();

    println!("  {}", style("── Entities ──").dim());
    match &report.entity_decay {
        Some(decay) => print_entity_decay(decay),
        None => println!("  {}", style("phase failed").red()),
    }
    println!();

    println!("  {}", style("── Pruning ──").dim());
    match &report.prune {
        Some(prune) => print_prune(prune),
        None => println!("  {}", style("phase failed").red()),
    }
    println!();

    for error in &report.phase_errors {
        println!("  {} {}", style("✗").red(), error);
    }

    let elapsed = report.completed_at - report.started_at;
    println!(
        "  {}",
        style(format!("Completed in {} ms", elapsed.num_milliseconds())).dim()
    );
    println!();
}

fn print_archive(report: &ArchiveReport) {
    println!("  Examined:         {}", report.conversations_examined);
    println!("  Archived:         {}", style(report.conversations_archived).green());
    println!("  Summaries:        {}", report.summaries_created);
    println!("  Messages deleted: {}", report.messages_deleted);
    if report.skipped > 0 {
        println!("  Skipped:          {}", style(report.skipped).yellow());
    }
    if report.errors > 0 {
        println!("  Errors:           {}", style(report.errors).red());
    }
}

fn print_entity_decay(report: &EntityDecayReport) {
    println!("  Examined:  {}", report.entities_examined);
    println!("  Decayed:   {}", style(report.entities_decayed).green());
    println!("  Exempt:    {}", report.exempt);
    println!("  Unchanged: {}", report.unchanged);
    if report.errors > 0 {
        println!("  Errors:    {}", style(report.errors).red());
    }
}

fn print_prune(report: &PruneReport) {
    println!("  Orphaned summaries: {}", report.orphaned_summaries_deleted);
    println!("  Entities pruned:    {}", report.entities_pruned);
    if report.errors > 0 {
        println!("  Errors:             {}", style(report.errors).red());
    }
}

async fn stats(state: &AppState, json: bool) -> Result<()> {
    let stats = state.decay.get_decay_stats().await?;

    if json {
        let value = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "stats": stats,
        });
        return super::print_json(&value);
    }

    println!();
    println!(
        "  {} mnemo v{}",
        style("◆").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Entities ──").dim());
    println!("  Total:            {}", style(stats.total_entities).bold());
    println!("  Low confidence:   {}", stats.low_confidence_entities);
    println!("  Prune candidates: {}", stats.prune_candidates);
    println!("  Avg confidence:   {:.3}", stats.average_confidence);
    println!();

    println!("  {}", style("── Conversations ──").dim());
    println!("  Total:              {}", style(stats.total_conversations).bold());
    println!("  Archivable:         {}", stats.archivable_conversations);
    println!("  Orphaned summaries: {}", stats.orphaned_summaries);
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!();

    Ok(())
}
