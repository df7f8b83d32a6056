//! Advisory project claims. A claim tells other reviewers someone is already
//! working a batch; it is not a lock and admins may always take over.

use crate::{merge_warnings, ReviewError};
use chrono::NaiveDate;
use fido_core::columns;
use fido_core::{format_date, ProjectKey, ProjectStatus, RecordTable, User};
use fido_storage::{DurableStorage, ProjectStore, SaveReport};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimState {
    pub status: ProjectStatus,
    pub claimed_by: Option<String>,
    pub claimed_date: Option<String>,
}

impl ClaimState {
    fn available() -> Self {
        Self {
            status: ProjectStatus::Available,
            claimed_by: None,
            claimed_date: None,
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Claim fields are copied onto every row; the first row speaks for the project.
pub fn claim_status(table: &RecordTable) -> ClaimState {
    let Some(row) = table.rows().first() else {
        return ClaimState::available();
    };
    let claimed_by = non_blank(row.text(columns::CLAIMED_BY));
    let status = match (&claimed_by, ProjectStatus::from_cell(&row.text(columns::PROJECT_STATUS))) {
        (Some(_), ProjectStatus::Claimed) => ProjectStatus::Claimed,
        _ => ProjectStatus::Available,
    };
    if status == ProjectStatus::Available {
        return ClaimState::available();
    }
    ClaimState {
        status,
        claimed_by,
        claimed_date: non_blank(row.text(columns::CLAIMED_DATE)),
    }
}

pub fn claim_project(
    table: &mut RecordTable,
    user: &User,
    today: NaiveDate,
) -> Result<(), ReviewError> {
    let current = claim_status(table);
    if let Some(holder) = current.claimed_by {
        if holder == user.name {
            return Ok(());
        }
        if !user.is_admin() {
            return Err(ReviewError::AlreadyClaimed(holder));
        }
    }

    table.fill_column(columns::CLAIMED_BY, user.name.as_str())?;
    table.fill_column(columns::CLAIMED_DATE, format_date(today))?;
    table.fill_column(columns::PROJECT_STATUS, ProjectStatus::Claimed.as_str())?;
    Ok(())
}

pub fn release_project(table: &mut RecordTable, user: &User) -> Result<(), ReviewError> {
    let current = claim_status(table);
    let Some(holder) = current.claimed_by else {
        return Ok(());
    };
    if holder != user.name && !user.is_admin() {
        return Err(ReviewError::NotClaimant {
            user: user.name.clone(),
            claimed_by: holder,
        });
    }

    table.fill_column(columns::CLAIMED_BY, "")?;
    table.fill_column(columns::CLAIMED_DATE, "")?;
    table.fill_column(columns::PROJECT_STATUS, ProjectStatus::Available.as_str())?;
    Ok(())
}

pub fn claim_in_store<S: DurableStorage>(
    store: &mut ProjectStore<S>,
    key: &ProjectKey,
    user: &User,
    today: NaiveDate,
) -> Result<SaveReport, ReviewError> {
    let loaded = store.refresh();
    let mut table = store.get(key)?.clone();
    claim_project(&mut table, user, today)?;
    info!(event = "project_claimed", key = %key, user = %user.name);
    Ok(merge_warnings(loaded.warnings, store.put(key.clone(), table)))
}

pub fn release_in_store<S: DurableStorage>(
    store: &mut ProjectStore<S>,
    key: &ProjectKey,
    user: &User,
) -> Result<SaveReport, ReviewError> {
    let loaded = store.refresh();
    let mut table = store.get(key)?.clone();
    release_project(&mut table, user)?;
    info!(event = "project_released", key = %key, user = %user.name);
    Ok(merge_warnings(loaded.warnings, store.put(key.clone(), table)))
}
