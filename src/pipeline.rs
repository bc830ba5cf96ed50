//! One import run: categories -> parse -> (dry-run report | existence check ->
//! insert -> optional update). Every user-facing status line goes to `out`.
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use csv::ReaderBuilder;
use tracing::{info, warn};

use crate::categories::CategoryMap;
use crate::importer::{self, ImportPlan, InsertOutcome};
use crate::parse::{self, CsvRow, RowError, RowErrorKind};
use crate::report::Validation;
use crate::store::TableStore;

/// Columns a well-formed import file carries.
pub const EXPECTED_COLUMNS: [&str; 6] = [
    "title",
    "slug",
    "author",
    "excerpt",
    "category_slug",
    "content_blocks",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LoadingCategories,
    Parsing,
    DryRunReport,
    CheckingExisting,
    Inserting,
    Updating,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::LoadingCategories => "loading_categories",
            Phase::Parsing => "parsing",
            Phase::DryRunReport => "dry_run_report",
            Phase::CheckingExisting => "checking_existing",
            Phase::Inserting => "inserting",
            Phase::Updating => "updating",
            Phase::Done => "done",
        };
        f.write_str(s)
    }
}

fn enter(phase: Phase) {
    info!(%phase, "import phase");
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub csv_path: PathBuf,
    /// Validate and report only; issue no writes.
    pub dry_run: bool,
    /// Update rows whose slug already exists instead of skipping them.
    pub update: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows: usize,
    pub valid: usize,
    pub errors: usize,
    /// Rows dropped by a stopping error; the rest of `errors` are soft.
    pub rejected: usize,
    pub inserted: usize,
    pub insert_failed: bool,
    pub skipped_existing: usize,
    pub updated: usize,
    pub update_failures: usize,
}

/// Parse every record of the file at `path`. Unreadable records become row
/// errors; only failing to open the file or read its header is fatal.
pub fn read_articles(path: &std::path::Path, categories: &CategoryMap) -> Result<Validation> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = rdr
        .headers()
        .with_context(|| format!("failed to read CSV header of {}", path.display()))?
        .clone();
    let missing: Vec<&str> = EXPECTED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .collect();
    if !missing.is_empty() {
        warn!(?missing, "CSV header lacks expected columns");
    }

    let now = Utc::now();
    let mut validation = Validation::default();
    // The header is line 1.
    for (row_num, rec) in (2..).zip(rdr.deserialize::<CsvRow>()) {
        validation.rows += 1;
        let row = match rec {
            Ok(row) => row,
            Err(e) => {
                validation
                    .errors
                    .push(RowError::new(row_num, RowErrorKind::Unreadable(e.to_string())));
                continue;
            }
        };
        let parsed = parse::parse_row(&row, row_num, categories, now);
        validation.errors.extend(parsed.errors);
        validation.articles.extend(parsed.article);
    }
    info!(
        rows = validation.rows,
        valid = validation.articles.len(),
        errors = validation.errors.len(),
        rejected = validation.rejected_rows(),
        "parse pass finished"
    );
    Ok(validation)
}

/// Run one import. Errors returned here are fatal to the run (category load,
/// unreadable file, existence check); per-row and per-write failures are
/// reported to `out` and counted in the summary instead.
pub async fn run_import(
    store: &dyn TableStore,
    opts: &ImportOptions,
    out: &mut dyn Write,
) -> Result<ImportSummary> {
    enter(Phase::LoadingCategories);
    writeln!(out, "Loading categories from database...")?;
    let categories = CategoryMap::load(store).await?;
    writeln!(
        out,
        "Found {} categories: {}",
        categories.len(),
        categories.slugs().collect::<Vec<_>>().join(", ")
    )?;

    enter(Phase::Parsing);
    writeln!(out, "\nReading CSV file: {}", opts.csv_path.display())?;
    let validation = read_articles(&opts.csv_path, &categories)?;
    validation.write_report(out)?;

    let mut summary = ImportSummary {
        rows: validation.rows,
        valid: validation.articles.len(),
        errors: validation.errors.len(),
        rejected: validation.rejected_rows(),
        ..ImportSummary::default()
    };

    if opts.dry_run {
        enter(Phase::DryRunReport);
        writeln!(out, "\n[DRY RUN] No changes made to database.")?;
        return Ok(summary);
    }

    if validation.articles.is_empty() {
        enter(Phase::Done);
        writeln!(out, "\nNo valid articles to import.")?;
        return Ok(summary);
    }

    enter(Phase::CheckingExisting);
    let slugs: Vec<String> = validation.articles.iter().map(|a| a.slug.clone()).collect();
    let existing = importer::find_existing(store, &slugs)
        .await
        .context("failed to check for existing articles")?;
    let ImportPlan { mut new, existing } =
        ImportPlan::partition(validation.articles, &existing);

    writeln!(out, "\nImport Plan:")?;
    writeln!(out, "  - New articles to insert: {}", new.len())?;
    writeln!(
        out,
        "  - Existing articles to {}: {}",
        if opts.update { "update" } else { "skip" },
        existing.len()
    )?;

    enter(Phase::Inserting);
    if !new.is_empty() {
        writeln!(out, "\nInserting {} new articles...", new.len())?;
    }
    match importer::insert_new(store, &mut new, Utc::now()).await {
        InsertOutcome::Nothing => {}
        InsertOutcome::Inserted(n) => {
            summary.inserted = n;
            writeln!(out, "  ✓ Inserted {n} articles")?;
        }
        InsertOutcome::Failed(msg) => {
            summary.insert_failed = true;
            writeln!(out, "  ✗ Error inserting articles: {msg}")?;
        }
    }

    if opts.update {
        if !existing.is_empty() {
            enter(Phase::Updating);
            writeln!(out, "\nUpdating {} existing articles...", existing.len())?;
            let outcome = importer::update_existing(store, &existing).await;
            for (slug, msg) in &outcome.failures {
                writeln!(out, "  ✗ Error updating '{slug}': {msg}")?;
            }
            writeln!(out, "  ✓ Updated {} articles", outcome.updated)?;
            summary.updated = outcome.updated;
            summary.update_failures = outcome.failures.len();
        }
    } else {
        summary.skipped_existing = existing.len();
    }

    enter(Phase::Done);
    writeln!(out, "\n✓ Import complete!")?;
    Ok(summary)
}
