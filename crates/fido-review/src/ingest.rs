//! Upload boundary: parse delimited text, map headers onto the canonical
//! schema, stamp review metadata and file the batch under a fresh key.

use crate::{merge_warnings, IngestError};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use fido_core::columns;
use fido_core::{
    coerce_number, format_date, CellValue, Priority, ProjectKey, ProjectStatus, QueueType,
    RecordTable, ReviewStatus, User,
};
use fido_storage::{DurableStorage, ProjectStore, SaveReport};
use tracing::info;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub queue: QueueType,
    pub title: String,
    pub priority: Priority,
    pub uploader: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    pub key: ProjectKey,
    pub rows: usize,
    pub save: SaveReport,
}

/// Parses CSV bytes with a header row. Blank cells become null; ragged rows
/// are tolerated (missing trailing cells stay absent, extra cells are dropped).
pub fn parse_csv(bytes: &[u8]) -> Result<RecordTable, IngestError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|err| IngestError::Parse(err.to_string()))?
        .clone();
    let mut table = RecordTable::new(headers.iter().filter(|h| !h.is_empty()));

    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| {
            IngestError::Parse(format!("record {}: {err}", idx + 1))
        })?;
        table.push_row(
            headers
                .iter()
                .zip(record.iter())
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, value)| (header, csv_cell(value))),
        );
    }

    Ok(table)
}

fn csv_cell(value: &str) -> CellValue {
    if value.trim().is_empty() {
        CellValue::Null
    } else {
        CellValue::from(value)
    }
}

fn canonical_column(header: &str) -> Option<&'static str> {
    let normalized = header.trim().to_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "fido" | "fido_id" | "fidoid" => Some(columns::FIDO_ID),
        "barcode" => Some(columns::BARCODE),
        "brand_id" => Some(columns::BRAND_ID),
        "brand" => Some(columns::BRAND),
        "category" | "category_hierarchy" => Some(columns::CATEGORY),
        "description" => Some(columns::DESCRIPTION),
        "gmv" => Some(columns::GMV),
        _ => None,
    }
}

/// Maps arbitrary upload headers onto canonical names once. The first header
/// claiming a canonical name wins; later duplicates and headers with no
/// canonical counterpart keep their own name, suffixed `_2`, `_3`... on clash.
pub fn normalize_schema(raw: &RecordTable) -> RecordTable {
    let mut mapping: Vec<(String, String)> = Vec::with_capacity(raw.columns().len());
    for header in raw.columns() {
        let taken = |name: &str| mapping.iter().any(|(_, target)| target == name);
        let preferred = match canonical_column(header) {
            Some(canonical) if !taken(canonical) => canonical.to_string(),
            _ => header.clone(),
        };
        let mut target = preferred.clone();
        let mut suffix = 2;
        while taken(&target) {
            target = format!("{preferred}_{suffix}");
            suffix += 1;
        }
        mapping.push((header.clone(), target));
    }

    let mut table = RecordTable::new(mapping.iter().map(|(_, target)| target.clone()));
    for row in raw.rows() {
        table.push_row(mapping.iter().filter_map(|(source, target)| {
            row.get(source).map(|value| (target.clone(), value.clone()))
        }));
    }
    table
}

/// Picks the column GMV is read from: exact `gmv` first, otherwise the first
/// header mentioning gmv in any case.
fn gmv_source(table: &RecordTable) -> Option<String> {
    let names = table.columns();
    names
        .iter()
        .find(|name| name.eq_ignore_ascii_case(columns::GMV))
        .or_else(|| names.iter().find(|name| name.to_lowercase().contains("gmv")))
        .cloned()
}

fn canonicalize_gmv(table: &mut RecordTable) -> Result<(), IngestError> {
    let Some(source) = gmv_source(table) else {
        table.fill_column(columns::GMV, 0.0)?;
        return Ok(());
    };
    for id in table.row_ids() {
        let amount = table
            .row(id)
            .and_then(|row| row.get(&source))
            .map(coerce_number)
            .unwrap_or(0.0);
        table.set_cell(id, columns::GMV, amount)?;
    }
    Ok(())
}

/// Normalizes an uploaded table into a fresh, fully pending project table.
pub fn prepare_upload(
    raw: &RecordTable,
    request: &UploadRequest,
    today: NaiveDate,
) -> Result<RecordTable, IngestError> {
    if raw.is_empty() || raw.columns().is_empty() {
        return Err(IngestError::EmptyUpload);
    }
    let uploader = request.uploader.trim();
    if uploader.is_empty() {
        return Err(fido_core::AuthError::EmptyName.into());
    }

    let mut table = normalize_schema(raw);
    table.fill_column(columns::UPLOAD_DATE, format_date(today))?;
    table.fill_column(columns::STATUS, ReviewStatus::PendingReview.as_str())?;
    table.fill_column(columns::UPLOADER, uploader)?;
    table.fill_column(columns::REVIEWER, "")?;
    table.fill_column(columns::REVIEW_DATE, "")?;
    table.fill_column(columns::COMMENTS, "")?;
    table.fill_column(columns::PRIORITY, request.priority.as_str())?;
    canonicalize_gmv(&mut table)?;

    table.fill_column(columns::UPDATED_DESCRIPTION, "")?;
    table.fill_column(columns::UPDATED_CATEGORY, "")?;
    table.fill_column(columns::UPDATED_BRAND, "")?;
    table.fill_column(columns::NO_CHANGE, false)?;
    table.fill_column(columns::CLAIMED_BY, "")?;
    table.fill_column(columns::CLAIMED_DATE, "")?;
    table.fill_column(columns::PROJECT_STATUS, ProjectStatus::Available.as_str())?;
    Ok(table)
}

/// Files `raw` as a new project and persists the store. On any validation
/// failure the store is untouched. The store is refreshed before the key is
/// picked so projects written by other sessions survive the save.
pub fn ingest<S: DurableStorage>(
    store: &mut ProjectStore<S>,
    raw: &RecordTable,
    request: &UploadRequest,
    now: NaiveDateTime,
) -> Result<Ingested, IngestError> {
    let table = prepare_upload(raw, request, now.date())?;

    let loaded = store.refresh();
    let mut key = ProjectKey::new(request.queue, &request.title, request.priority, now)?;
    while store.contains(&key) {
        key = key.with_uploaded_at(key.uploaded_at + Duration::seconds(1));
    }

    let rows = table.len();
    info!(
        event = "project_ingested",
        key = %key,
        rows,
        uploader = %request.uploader.trim()
    );
    let save = merge_warnings(loaded.warnings, store.put(key.clone(), table));
    Ok(Ingested { key, rows, save })
}

pub fn ingest_csv<S: DurableStorage>(
    store: &mut ProjectStore<S>,
    bytes: &[u8],
    request: &UploadRequest,
    now: NaiveDateTime,
) -> Result<Ingested, IngestError> {
    let raw = parse_csv(bytes)?;
    ingest(store, &raw, request, now)
}

/// Admin removal of a whole project. Refreshes first so the save does not
/// drop projects other sessions wrote; a key already gone is a no-op.
pub fn delete_in_store<S: DurableStorage>(
    store: &mut ProjectStore<S>,
    key: &ProjectKey,
    user: &User,
) -> Result<SaveReport, IngestError> {
    user.require_admin("delete")?;
    let loaded = store.refresh();
    let save = store.delete(key);
    info!(event = "project_delete_requested", key = %key, user = %user.name);
    Ok(merge_warnings(loaded.warnings, save))
}
