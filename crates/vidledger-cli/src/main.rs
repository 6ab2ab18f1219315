use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use vidledger_core::curate::{self, ReviewDecision};
use vidledger_core::transcript;
use vidledger_core::{
    BackupSnapshot, BatchReport, ConfigFile, Environment, ItemRecord, ItemStatus, LedgerError,
    MergeStats, Orchestrator, RebuildOptions, Result, UpdateOptions,
};

mod args;
use args::{BackupAction, Cli, Commands, ConfigAction, Shell, TranscriptAction};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let base_dir = resolve_base_dir(cli.base_dir);
    tracing::debug!(base_dir = %base_dir.display(), "resolved base directory");

    let result = match cli.command {
        Some(Commands::Rebuild {
            force,
            no_preserve,
            download_transcripts,
            max_transcripts,
            force_transcripts,
        }) => handle_rebuild(
            &base_dir,
            RebuildOptions {
                force,
                preserve: !no_preserve,
                download_transcripts,
                max_transcripts,
                force_transcripts,
            },
        ),
        Some(Commands::Update {
            max_items,
            download_transcripts,
        }) => handle_update(
            &base_dir,
            UpdateOptions {
                max_items,
                download_transcripts,
            },
        ),
        Some(Commands::ValidateConfig) => handle_validate_config(&base_dir),
        Some(Commands::Transcripts { action }) => handle_transcripts(action, &base_dir),
        Some(Commands::ListUncategorized { limit }) => handle_list_uncategorized(&base_dir, limit),
        Some(Commands::Review) => handle_review(&base_dir),
        Some(Commands::Categorize {
            item_id,
            categories,
            relevance,
            notes,
        }) => with_orchestrator(&base_dir, |o| {
            o.curate(|c| {
                curate::categorize(c, &item_id, &categories, relevance, notes.as_deref())
            })?;
            println!("{} {}", "Categorized:".green(), item_id);
            Ok(())
        }),
        Some(Commands::Priority {
            item_id,
            category,
            relevance,
        }) => with_orchestrator(&base_dir, |o| {
            o.curate(|c| curate::mark_priority(c, &item_id, &category, relevance))?;
            println!("{} {} ({})", "Priority:".green(), item_id, category.cyan());
            Ok(())
        }),
        Some(Commands::Topics { item_id, topics }) => with_orchestrator(&base_dir, |o| {
            o.curate(|c| curate::set_key_topics(c, &item_id, &topics))?;
            println!("{} {} -> {}", "Topics:".green(), item_id, topics.join(", "));
            Ok(())
        }),
        Some(Commands::Archive { item_id }) => with_orchestrator(&base_dir, |o| {
            o.curate(|c| curate::archive(c, &item_id))?;
            println!("{} {}", "Archived:".yellow(), item_id);
            Ok(())
        }),
        Some(Commands::Report) => handle_report(&base_dir),
        Some(Commands::Backup { action }) => handle_backup(action, &base_dir),
        Some(Commands::Config { action }) => handle_config(action, &base_dir),
        Some(Commands::Completions { shell }) => {
            handle_completions(shell);
            Ok(())
        }
        None => {
            Cli::command().print_help().ok();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Logs go to stderr; `RUST_LOG` wins over -v/-q
fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "vidledger_core=debug,vidledger=debug"
    } else if quiet {
        "error"
    } else {
        "vidledger_core=info,vidledger=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "vidledger", &mut io::stdout());
}

fn resolve_base_dir(cli_base: Option<PathBuf>) -> PathBuf {
    if let Some(base) = cli_base {
        return base;
    }

    if let Ok(base) = std::env::var("VIDLEDGER_BASE") {
        return PathBuf::from(base);
    }

    dirs::home_dir()
        .map(|h| h.join(".vidledger"))
        .unwrap_or_else(|| PathBuf::from(".vidledger"))
}

/// Process environment plus `<base_dir>/.env`, captured once
fn capture_environment(base_dir: &Path) -> Result<Environment> {
    Environment::from_pairs(std::env::vars()).with_env_file(base_dir)
}

fn open(base_dir: &Path) -> Result<Orchestrator> {
    let env = capture_environment(base_dir)?;
    Orchestrator::open(base_dir, &env)
}

fn with_orchestrator(base_dir: &Path, f: impl FnOnce(&Orchestrator) -> Result<()>) -> Result<()> {
    let orchestrator = open(base_dir)?;
    f(&orchestrator)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y") || input.trim().eq_ignore_ascii_case("yes"))
}

fn handle_rebuild(base_dir: &Path, options: RebuildOptions) -> Result<()> {
    let orchestrator = open(base_dir)?;
    let spec = orchestrator.spec();

    if !options.force {
        println!();
        println!("{}", "Rebuild master list".cyan().bold());
        println!("  Channel:   {}", spec.source_url);
        println!("  Strategy:  {}", spec.listing.name());
        println!("  Limit:     {} items", spec.rebuild_max_items);
        println!(
            "  Curation:  {}",
            if options.preserve {
                "preserved".green()
            } else {
                "RESET".red().bold()
            }
        );
        println!("  Items no longer listed upstream will be dropped.");
        println!();
        if !confirm("Continue?")? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let report = orchestrator.rebuild(options)?;

    println!();
    println!("{}", "Rebuild complete!".green().bold());
    println!("  Fetched:   {} ({})", report.fetched, report.strategy);
    print_merge_stats(&report.stats);
    println!("  Total:     {}", report.total);
    print_backup(report.backup.as_ref());
    if let Some(batch) = &report.transcripts {
        print_batch(batch);
    }
    Ok(())
}

fn handle_update(base_dir: &Path, options: UpdateOptions) -> Result<()> {
    let orchestrator = open(base_dir)?;
    let report = orchestrator.update(options)?;

    println!();
    if report.created_ids.is_empty() {
        println!("{}", "No new items.".yellow());
    } else {
        println!(
            "{} {} new item(s)",
            "Update complete:".green().bold(),
            report.created_ids.len()
        );
        for id in &report.created_ids {
            println!("  {} {}", "+".green(), id);
        }
    }
    println!("  Checked:   {} ({})", report.fetched, report.strategy);
    print_merge_stats(&report.stats);
    println!("  Total:     {}", report.total);
    print_backup(report.backup.as_ref());
    if let Some(batch) = &report.transcripts {
        print_batch(batch);
    }
    Ok(())
}

fn handle_validate_config(base_dir: &Path) -> Result<()> {
    let orchestrator = open(base_dir)?;
    println!();
    println!("{}", "Configuration is valid".green().bold());
    println!();
    for (key, value) in orchestrator.validate_config() {
        println!("  {} = {}", key.cyan(), value);
    }
    println!();
    Ok(())
}

fn handle_transcripts(action: TranscriptAction, base_dir: &Path) -> Result<()> {
    let orchestrator = open(base_dir)?;
    match action {
        TranscriptAction::Download {
            item_ids,
            max,
            force,
        } => {
            let report = orchestrator.download_transcripts(&item_ids, max, force)?;
            println!();
            println!("{} ({})", "Transcripts".cyan().bold(), report.strategy);
            print_batch(&report.batch);
            print_backup(report.backup.as_ref());
        }
        TranscriptAction::Check { item_id } => {
            let strategy = orchestrator.transcripts().strategy();
            if orchestrator.check_transcript(&item_id)? {
                println!("{} transcript available for {} ({})", "✓".green(), item_id, strategy);
            } else {
                println!("{} no transcript available for {} ({})", "✗".red(), item_id, strategy);
            }
        }
        TranscriptAction::Stats => {
            let stats = transcript::stats(&orchestrator.load()?);
            println!();
            println!("{}", "Transcript coverage".cyan().bold());
            println!("  Total items:        {}", stats.total);
            println!("  With transcript:    {}", stats.with_transcript);
            println!("  File present:       {}", stats.file_present);
            println!("  Without transcript: {}", stats.without_transcript);
        }
        TranscriptAction::Missing { limit } => {
            let collection = orchestrator.load()?;
            let missing = transcript::missing(&collection);
            if missing.is_empty() {
                println!("Every item has a transcript.");
                return Ok(());
            }
            println!();
            println!("{} ({})", "Missing transcripts".cyan().bold(), missing.len());
            for record in missing.iter().take(limit.unwrap_or(usize::MAX)) {
                print_item_line(record);
            }
        }
    }
    Ok(())
}

fn handle_list_uncategorized(base_dir: &Path, limit: Option<usize>) -> Result<()> {
    let orchestrator = open(base_dir)?;
    let collection = orchestrator.load()?;
    let pending = curate::list_uncategorized(&collection);
    if pending.is_empty() {
        println!("No uncategorized items.");
        return Ok(());
    }

    println!();
    println!("{} ({})", "Uncategorized".cyan().bold(), pending.len());
    println!();
    for record in pending.iter().take(limit.unwrap_or(usize::MAX)) {
        println!("{}", record.title.bold());
        println!("  ID:   {}", record.item_id.yellow());
        println!("  Date: {}", or_unknown(&record.upload_date));
        println!("  URL:  {}", record.url);
        if !record.description.is_empty() {
            let preview: String = record.description.chars().take(100).collect();
            println!("  {}", preview.dimmed());
        }
        println!();
    }

    let defaults = &orchestrator.spec().default_categories;
    if !defaults.is_empty() {
        println!("Suggested categories: {}", defaults.join(", ").cyan());
    }
    Ok(())
}

fn handle_review(base_dir: &Path) -> Result<()> {
    let orchestrator = open(base_dir)?;
    let defaults = orchestrator.spec().default_categories.clone();
    let summary = orchestrator.curate(|c| {
        curate::review(c, |position, pending, record| ask_review(position, pending, record, &defaults))
    })?;

    println!();
    if summary.pending == 0 {
        println!("No uncategorized items.");
        return Ok(());
    }
    println!("{}", "Review finished".green().bold());
    println!("  Categorized: {}", summary.categorized.to_string().green());
    println!("  Skipped:     {}", summary.skipped);
    println!("  Remaining:   {}", summary.pending - summary.categorized);
    Ok(())
}

fn ask_review(
    position: usize,
    pending: usize,
    record: &ItemRecord,
    defaults: &[String],
) -> Result<ReviewDecision> {
    println!();
    println!("{} {}", format!("[{}/{}]", position, pending).dimmed(), record.title.bold());
    println!("  ID:   {}", record.item_id.yellow());
    println!("  Date: {}", or_unknown(&record.upload_date));
    println!("  URL:  {}", record.url);
    if !record.description.is_empty() {
        let preview: String = record.description.chars().take(100).collect();
        println!("  {}", preview.dimmed());
    }

    loop {
        let Some(choice) = ask("[c]ategorize  [s]kip  [q]uit")? else {
            return Ok(ReviewDecision::Quit);
        };
        match choice.to_lowercase().as_str() {
            "q" | "quit" => return Ok(ReviewDecision::Quit),
            "s" | "skip" => return Ok(ReviewDecision::Skip),
            "c" | "categorize" => break,
            _ => println!("{}", "Please answer c, s or q.".yellow()),
        }
    }

    if !defaults.is_empty() {
        println!("  Suggested: {}", defaults.join(", ").cyan());
    }
    let categories: Vec<String> = ask("Categories (comma separated)")?
        .unwrap_or_default()
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if categories.is_empty() {
        println!("{}", "No categories given, skipping.".yellow());
        return Ok(ReviewDecision::Skip);
    }

    let relevance = loop {
        let answer = ask("Relevance 1-10 (optional)")?.unwrap_or_default();
        if answer.is_empty() {
            break None;
        }
        match answer.parse::<i64>() {
            Ok(value) if curate::relevance(value).is_ok() => break Some(value),
            _ => println!("{}", "Relevance must be a number from 1 to 10.".yellow()),
        }
    };
    let notes = ask("Notes (optional)")?.filter(|n| !n.is_empty());

    Ok(ReviewDecision::Categorize {
        categories,
        relevance,
        notes,
    })
}

/// One trimmed line from stdin; `None` at end of input
fn ask(prompt: &str) -> Result<Option<String>> {
    print!("{}: ", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

fn handle_report(base_dir: &Path) -> Result<()> {
    let orchestrator = open(base_dir)?;
    let collection = orchestrator.load()?;
    let report = curate::report(&collection, &orchestrator.spec().default_categories);

    println!();
    println!("{}", "Master list report".cyan().bold());
    println!("  Total items:  {}", report.total);
    println!(
        "  Last updated: {}",
        report
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("  Channel:      {}", report.source_url);
    println!("  Needs review: {}", report.needs_review);

    println!();
    println!("{}", "Status".bold());
    for (status, count) in &report.by_status {
        println!("  {:<14} {}", status.to_string(), count);
    }

    if !report.by_category.is_empty() {
        println!();
        println!("{}", "Categories".bold());
        for (category, count) in &report.by_category {
            println!("  {:<14} {}", category, count);
        }
    }

    if let Some(average) = report.average_relevance {
        println!();
        println!("{}", "Relevance".bold());
        println!("  Average: {:.1}", average);
        println!("  Scored:  {}/{}", report.scored, report.total);
    }

    if !report.recent.is_empty() {
        println!();
        println!("{}", "Recent".bold());
        for record in &report.recent {
            print_item_line(record);
        }
    }
    println!();
    Ok(())
}

fn handle_backup(action: BackupAction, base_dir: &Path) -> Result<()> {
    let orchestrator = open(base_dir)?;
    match action {
        BackupAction::List => {
            let backups = orchestrator.backups().list()?;
            if backups.is_empty() {
                println!("No backups.");
                return Ok(());
            }
            println!();
            for backup in backups {
                println!("  {}  {}", backup.display_time().dimmed(), backup.name.cyan());
            }
            println!();
        }
        BackupAction::Restore { name, force } => {
            if !force
                && !confirm(&format!(
                    "Replace {} with {}?",
                    orchestrator.store().path().display(),
                    name
                ))?
            {
                println!("Aborted.");
                return Ok(());
            }
            let outcome = orchestrator.restore_backup(&name)?;
            println!();
            println!("{}", "Backup restored!".green());
            println!("  Items: {}", outcome.items);
            print_backup(outcome.previous.as_ref());
        }
    }
    Ok(())
}

fn handle_config(action: ConfigAction, base_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = ConfigFile::init(base_dir)?;
            println!("{} {}", "Config:".green(), path.display());
        }
        ConfigAction::Show => {
            let config = ConfigFile::load(base_dir)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", ConfigFile::path(base_dir).display());
        }
        ConfigAction::Get { key } => {
            let config = ConfigFile::load(base_dir)?;
            match config.get(&key)? {
                Some(value) => println!("{}", value),
                None => {
                    return Err(LedgerError::configuration(key, "no such config key"));
                }
            }
        }
    }
    Ok(())
}

fn print_merge_stats(stats: &MergeStats) {
    println!("  Created:   {}", stats.created.to_string().green());
    println!("  Preserved: {}", stats.preserved);
    if stats.reset > 0 {
        println!("  Reset:     {}", stats.reset.to_string().red());
    }
    if stats.dropped > 0 {
        println!("  Dropped:   {}", stats.dropped.to_string().red());
    }
    if stats.retained > 0 {
        println!("  Retained:  {}", stats.retained);
    }
}

fn print_backup(backup: Option<&BackupSnapshot>) {
    if let Some(backup) = backup {
        println!("  Backup:    {}", backup.path.display().to_string().dimmed());
    }
}

fn print_batch(batch: &BatchReport) {
    println!("  Transcripts downloaded:  {}", batch.downloaded.to_string().green());
    println!("  Already present:         {}", batch.skipped);
    println!("  Not available:           {}", batch.unavailable);
    if batch.has_failures() {
        println!("  Failed:                  {}", batch.failed.len().to_string().red());
        for (item_id, kind) in &batch.failed {
            println!("    {} {} ({})", "✗".red(), item_id, kind);
        }
    }
}

fn print_item_line(record: &ItemRecord) {
    let marker = match record.status {
        ItemStatus::Categorized => "✓".green(),
        ItemStatus::Archived => "-".dimmed(),
        ItemStatus::Uncategorized => "○".yellow(),
    };
    let title: String = record.title.chars().take(50).collect();
    println!(
        "  {} {} {} ({})",
        marker,
        record.item_id.yellow(),
        title,
        or_unknown(&record.upload_date)
    );
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}
