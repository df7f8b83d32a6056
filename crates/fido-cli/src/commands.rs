use crate::config::Settings;
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};
use fido_core::columns;
use fido_core::{
    authenticate, Priority, ProjectKey, QueueType, RecordTable, ReviewStatus, Role, User,
};
use fido_review::{
    claim_in_store, claim_status, delete_in_store, gmv_band_breakdown, ingest_csv, project_stats,
    queue_stats, release_in_store, review_in_store, reviewer_stats, sort_by_priority, to_csv,
    update_classification, update_classification_all, ExportView, ReviewEdits, UploadRequest,
};
use fido_storage::{FsStorage, LoadReport, ProjectStore, SaveReport};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
pub enum Command {
    /// Upload a CSV batch as a new project (admin)
    Upload(UploadArgs),
    /// List projects, highest priority first
    #[command(alias = "ls")]
    Projects(ProjectsArgs),
    /// Show the records of one project
    Show(ShowArgs),
    /// Delete a project (admin)
    #[command(alias = "rm")]
    Delete(KeyArgs),
    Claim(KeyArgs),
    Release(KeyArgs),
    /// Review one record
    Review(ReviewArgs),
    Stats(StatsArgs),
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub queue: QueueType,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub priority: Option<Priority>,
}

#[derive(Args, Debug)]
pub struct ProjectsArgs {
    #[arg(long)]
    pub queue: Option<QueueType>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub key: String,
    #[arg(long)]
    pub pending: bool,
    /// Show a single record
    #[arg(long)]
    pub fido: Option<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args, Debug)]
pub struct ReviewArgs {
    pub key: String,
    pub fido: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub brand: Option<String>,
    #[arg(long, alias = "comments")]
    pub comment: Option<String>,
    #[arg(long)]
    pub no_change: bool,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Limit to one project; adds GMV bands
    #[arg(long)]
    pub key: Option<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    pub key: String,
    #[arg(long, default_value = "all")]
    pub view: ExportView,
    /// Write to a file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub struct Session {
    pub store: ProjectStore<FsStorage>,
    pub settings: Settings,
    identity: Option<String>,
    role: Role,
}

impl Session {
    pub fn open(
        settings: Settings,
        store_flag: Option<PathBuf>,
        identity: Option<String>,
        role: Role,
    ) -> Self {
        let path = settings.store_path(store_flag.as_deref());
        let (store, report) = ProjectStore::open(FsStorage::new(), path);
        report_load(&report);
        Self {
            store,
            settings,
            identity,
            role,
        }
    }

    fn user(&self) -> Result<User> {
        let name = self
            .identity
            .as_deref()
            .context("--user is required for this command")?;
        Ok(authenticate(name, self.role)?)
    }

    fn key(&self, encoded: &str) -> Result<ProjectKey> {
        Ok(self.store.resolve_key(encoded)?)
    }

    fn table(&self, key: &ProjectKey) -> Result<&RecordTable> {
        Ok(self.store.get(key)?)
    }
}

pub fn handle_command(session: &mut Session, command: Command) -> Result<()> {
    match command {
        Command::Upload(args) => upload(session, &args),
        Command::Projects(args) => list_projects(session, &args),
        Command::Show(args) => show_project(session, &args),
        Command::Delete(args) => delete_project(session, &args),
        Command::Claim(args) => claim(session, &args),
        Command::Release(args) => release(session, &args),
        Command::Review(args) => review(session, &args),
        Command::Stats(args) => stats(session, &args),
        Command::Export(args) => export(session, &args),
    }
}

fn report_load(report: &LoadReport) {
    for warning in &report.warnings {
        eprintln!("Warning: {warning}");
    }
}

fn report_save(report: &SaveReport) {
    for warning in &report.warnings {
        warn!(event = "save_degraded", error = %warning);
        eprintln!("Warning: {warning}");
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn upload(session: &mut Session, args: &UploadArgs) -> Result<()> {
    let user = session.user()?;
    user.require_admin("upload")?;
    let bytes = fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let request = UploadRequest {
        queue: args.queue,
        title: args.title.clone(),
        priority: session.settings.resolve_priority(args.priority),
        uploader: user.name.clone(),
    };

    let ingested = ingest_csv(&mut session.store, &bytes, &request, Local::now().naive_local())
        .with_context(|| format!("Failed to ingest {}", args.file.display()))?;
    report_save(&ingested.save);
    println!("Uploaded {} records as {}", ingested.rows, ingested.key);
    Ok(())
}

#[derive(Serialize)]
struct ProjectSummary {
    key: String,
    queue: QueueType,
    title: String,
    priority: Priority,
    uploaded_at: String,
    records: usize,
    reviewed: usize,
    progress_pct: f64,
    gmv_sum: f64,
    claimed_by: Option<String>,
}

fn summarize(key: &ProjectKey, table: &RecordTable) -> ProjectSummary {
    let stats = project_stats(table);
    ProjectSummary {
        key: key.encode(),
        queue: key.queue,
        title: key.title.clone(),
        priority: key.priority,
        uploaded_at: key.uploaded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        records: stats.total,
        reviewed: stats.reviewed,
        progress_pct: stats.progress_pct,
        gmv_sum: stats.gmv_sum,
        claimed_by: claim_status(table).claimed_by,
    }
}

fn list_projects(session: &Session, args: &ProjectsArgs) -> Result<()> {
    let mut summaries: Vec<ProjectSummary> = session
        .store
        .iter()
        .filter(|(key, _)| args.queue.map_or(true, |queue| key.queue == queue))
        .map(|(key, table)| summarize(key, table))
        .collect();
    sort_by_priority(&mut summaries, |summary| summary.priority);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("No projects found.");
        return Ok(());
    }
    for summary in &summaries {
        let claim = summary
            .claimed_by
            .as_deref()
            .map(|name| format!(" [claimed by {name}]"))
            .unwrap_or_default();
        println!(
            "- {} ({}/{}) {}/{} reviewed ({:.1}%){}",
            summary.key,
            summary.queue.label(),
            summary.priority,
            summary.reviewed,
            summary.records,
            summary.progress_pct,
            claim
        );
    }
    Ok(())
}

fn show_project(session: &Session, args: &ShowArgs) -> Result<()> {
    let key = session.key(&args.key)?;
    let mut table = session.table(&key)?.clone();
    if let Some(fido) = &args.fido {
        let wanted = fido.trim().to_string();
        table = table.filter(|row| row.text(columns::FIDO_ID).trim() == wanted);
        if table.is_empty() {
            bail!("Record {fido} not found in {key}.");
        }
    }
    if args.pending {
        table = table.filter(|row| {
            ReviewStatus::from_cell(&row.text(columns::STATUS)) == ReviewStatus::PendingReview
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(table.rows())?);
        return Ok(());
    }

    println!("Project: {key}");
    println!("Queue: {}", key.queue.label());
    println!("Priority: {}", key.priority);
    for row in table.rows() {
        println!(
            "- [{}] ({}) {} | {} | {}",
            row.text(columns::FIDO_ID),
            row.text(columns::STATUS),
            row.text(columns::BRAND),
            row.text(columns::CATEGORY),
            row.text(columns::DESCRIPTION)
        );
        let reviewer = row.text(columns::REVIEWER);
        if !reviewer.is_empty() {
            println!(
                "    reviewed by {} on {}: {} | {} | {}",
                reviewer,
                row.text(columns::REVIEW_DATE),
                row.text(columns::UPDATED_BRAND),
                row.text(columns::UPDATED_CATEGORY),
                row.text(columns::UPDATED_DESCRIPTION)
            );
        }
    }
    Ok(())
}

fn delete_project(session: &mut Session, args: &KeyArgs) -> Result<()> {
    let user = session.user()?;
    let key = session.key(&args.key)?;
    let save = delete_in_store(&mut session.store, &key, &user)?;
    report_save(&save);
    println!("Deleted {key}.");
    Ok(())
}

fn claim(session: &mut Session, args: &KeyArgs) -> Result<()> {
    let user = session.user()?;
    let key = session.key(&args.key)?;
    let save = claim_in_store(&mut session.store, &key, &user, today())?;
    report_save(&save);
    println!("{} claimed {key}.", user.name);
    Ok(())
}

fn release(session: &mut Session, args: &KeyArgs) -> Result<()> {
    let user = session.user()?;
    let key = session.key(&args.key)?;
    let save = release_in_store(&mut session.store, &key, &user)?;
    report_save(&save);
    println!("Released {key}.");
    Ok(())
}

fn review(session: &mut Session, args: &ReviewArgs) -> Result<()> {
    let user = session.user()?;
    let key = session.key(&args.key)?;
    let table = session.table(&key)?;
    let row_id = table
        .find_row_by_fido(&args.fido)
        .with_context(|| format!("Record {} not found in {key}", args.fido))?;
    let row = table
        .row(row_id)
        .with_context(|| format!("Record {} not found in {key}", args.fido))?;

    let mut edits = ReviewEdits::prefill(row);
    if let Some(description) = &args.description {
        edits.updated_description = description.clone();
    }
    if let Some(category) = &args.category {
        edits.updated_category = category.clone();
    }
    if let Some(brand) = &args.brand {
        edits.updated_brand = brand.clone();
    }
    if let Some(comment) = &args.comment {
        edits.comments = comment.clone();
    }
    edits.no_change = args.no_change;

    let save = review_in_store(&mut session.store, &key, &args.fido, &edits, &user.name, today())?;
    report_save(&save);
    println!("Reviewed {} in {key}.", args.fido.trim());
    Ok(())
}

fn stats(session: &Session, args: &StatsArgs) -> Result<()> {
    if let Some(encoded) = &args.key {
        let key = session.key(encoded)?;
        let table = session.table(&key)?;
        let project = project_stats(table);
        let classes = update_classification(table);
        let bands = gmv_band_breakdown(table);
        let reviewers = reviewer_stats([table]);

        if args.json {
            let payload = json!({
                "key": key.encode(),
                "project": project,
                "classification": classes,
                "gmvBands": bands,
                "reviewers": reviewers,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
            return Ok(());
        }

        println!("Project: {key}");
        println!(
            "Progress: {}/{} reviewed ({:.1}%), {} pending",
            project.reviewed, project.total, project.progress_pct, project.pending
        );
        println!("GMV: {:.2} total, {:.2} reviewed", project.gmv_sum, project.reviewed_gmv);
        print_classification(&classes);
        println!("GMV bands:");
        for band in &bands {
            println!("  {:<14} {:>6} records {:>14.2}", band.band, band.count, band.gmv);
        }
        print_reviewers(&reviewers);
        return Ok(());
    }

    let queues = queue_stats(session.store.iter());
    let classes = update_classification_all(session.store.projects().values());
    let reviewers = reviewer_stats(session.store.projects().values());

    if args.json {
        let payload = json!({
            "queues": queues,
            "classification": classes,
            "reviewers": reviewers,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    for queue in &queues {
        println!(
            "{:<13} {:>3} projects {:>6}/{:<6} reviewed ({:.1}%) GMV {:.2}",
            queue.queue.label(),
            queue.projects,
            queue.reviewed,
            queue.total,
            queue.progress_pct,
            queue.gmv_sum
        );
    }
    print_classification(&classes);
    print_reviewers(&reviewers);
    Ok(())
}

fn print_classification(classes: &fido_review::UpdateClassification) {
    println!("Updates across {} reviewed records:", classes.total_reviewed);
    for (label, bucket) in [
        ("category only", &classes.category_only),
        ("brand only", &classes.brand_only),
        ("category and brand", &classes.both),
        ("no update", &classes.none),
        ("description", &classes.description_updated),
    ] {
        println!("  {:<20} {:>6} GMV {:.2}", label, bucket.count, bucket.gmv);
    }
    println!("  {:<20} {:>6}", "brand id missing", classes.brand_id_missing);
}

fn print_reviewers(reviewers: &[fido_review::ReviewerStats]) {
    if reviewers.is_empty() {
        return;
    }
    println!("Reviewers:");
    for entry in reviewers {
        println!("  {:<20} {:>6} records GMV {:.2}", entry.reviewer, entry.reviewed, entry.gmv);
    }
}

fn export(session: &Session, args: &ExportArgs) -> Result<()> {
    let key = session.key(&args.key)?;
    let csv = to_csv(session.table(&key)?, args.view)
        .with_context(|| format!("Failed to export {key}"))?;
    match &args.out {
        Some(path) => {
            fs::write(path, csv).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {key} ({}) to {}", args.view, path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}
