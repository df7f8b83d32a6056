use crate::{merge_warnings, ReviewError};
use chrono::NaiveDate;
use fido_core::columns;
use fido_core::{format_date, relevant_category, ProjectKey, RecordTable, ReviewStatus, Row, RowId};
use fido_storage::{DurableStorage, ProjectStore, SaveReport};
use serde::{Deserialize, Serialize};
use tracing::info;

/// What a reviewer submits for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEdits {
    pub updated_description: String,
    pub updated_category: String,
    pub updated_brand: String,
    pub comments: String,
    pub no_change: bool,
}

impl ReviewEdits {
    /// Form defaults for `row`: the previous edit if the record was already
    /// reviewed, otherwise the original values with the category cut down to
    /// its most specific segment.
    pub fn prefill(row: &Row) -> Self {
        let reviewed =
            ReviewStatus::from_cell(&row.text(columns::STATUS)) == ReviewStatus::Reviewed;
        if reviewed {
            return Self {
                updated_description: row.text(columns::UPDATED_DESCRIPTION),
                updated_category: row.text(columns::UPDATED_CATEGORY),
                updated_brand: row.text(columns::UPDATED_BRAND),
                comments: row.text(columns::COMMENTS),
                no_change: row.flag(columns::NO_CHANGE),
            };
        }
        Self {
            updated_description: row.text(columns::DESCRIPTION),
            updated_category: relevant_category(&row.text(columns::CATEGORY)).to_string(),
            updated_brand: row.text(columns::BRAND),
            comments: String::new(),
            no_change: false,
        }
    }

    /// True when the edits differ from the record's original values or carry
    /// a comment. Category is compared against its most specific segment only.
    pub fn is_changed(&self, row: &Row) -> bool {
        let original_category = row.text(columns::CATEGORY);
        self.updated_description.trim() != row.text(columns::DESCRIPTION).trim()
            || self.updated_category.trim() != relevant_category(&original_category)
            || self.updated_brand.trim() != row.text(columns::BRAND).trim()
            || !self.comments.trim().is_empty()
    }

    fn validate(&self, row: &Row) -> Result<(), ReviewError> {
        match (self.is_changed(row), self.no_change) {
            (true, true) => Err(ReviewError::ConflictingReview),
            (false, false) => Err(ReviewError::IncompleteReview),
            _ => Ok(()),
        }
    }
}

/// Records one review. Validation runs before any cell is written, so a
/// rejected submission leaves the table exactly as it was. Original
/// description, category and brand are never touched.
pub fn submit_review(
    table: &mut RecordTable,
    row_id: RowId,
    edits: &ReviewEdits,
    reviewer: &str,
    today: NaiveDate,
) -> Result<(), ReviewError> {
    let reviewer = reviewer.trim();
    if reviewer.is_empty() {
        return Err(ReviewError::MissingReviewer);
    }
    let row = table
        .row(row_id)
        .ok_or(fido_core::TableError::RowNotFound(row_id))?;
    edits.validate(row)?;

    table.set_cell(row_id, columns::UPDATED_DESCRIPTION, edits.updated_description.trim())?;
    table.set_cell(row_id, columns::UPDATED_CATEGORY, edits.updated_category.trim())?;
    table.set_cell(row_id, columns::UPDATED_BRAND, edits.updated_brand.trim())?;
    table.set_cell(row_id, columns::NO_CHANGE, edits.no_change)?;
    table.set_cell(row_id, columns::COMMENTS, edits.comments.trim())?;
    table.set_cell(row_id, columns::STATUS, ReviewStatus::Reviewed.as_str())?;
    table.set_cell(row_id, columns::REVIEWER, reviewer)?;
    table.set_cell(row_id, columns::REVIEW_DATE, format_date(today))?;
    Ok(())
}

/// Refreshes the store, applies one review to the record addressed by
/// `fido_id` and writes the project straight back.
pub fn review_in_store<S: DurableStorage>(
    store: &mut ProjectStore<S>,
    key: &ProjectKey,
    fido_id: &str,
    edits: &ReviewEdits,
    reviewer: &str,
    today: NaiveDate,
) -> Result<SaveReport, ReviewError> {
    let loaded = store.refresh();
    let mut table = store.get(key)?.clone();
    let row_id = table
        .find_row_by_fido(fido_id)
        .ok_or_else(|| ReviewError::RecordNotFound(fido_id.to_string()))?;

    submit_review(&mut table, row_id, edits, reviewer, today)?;
    info!(
        event = "record_reviewed",
        key = %key,
        fido_id,
        reviewer = reviewer.trim(),
        no_change = edits.no_change
    );
    Ok(merge_warnings(loaded.warnings, store.put(key.clone(), table)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 1).expect("date")
    }

    fn pending_table() -> RecordTable {
        let mut table = RecordTable::new([
            columns::FIDO_ID,
            columns::BRAND,
            columns::CATEGORY,
            columns::DESCRIPTION,
            columns::STATUS,
        ]);
        table.push_row([
            (columns::FIDO_ID, "F-100"),
            (columns::BRAND, "Acme"),
            (columns::CATEGORY, "Food > Snacks > Chips"),
            (columns::DESCRIPTION, "Acme Chips 8oz"),
            (columns::STATUS, "Pending Review"),
        ]);
        table
    }

    fn untouched(table: &RecordTable) -> ReviewEdits {
        ReviewEdits::prefill(&table.rows()[0])
    }

    #[test]
    fn prefill_uses_most_specific_category() {
        let table = pending_table();
        let edits = untouched(&table);
        assert_eq!(edits.updated_category, "Chips");
        assert_eq!(edits.updated_brand, "Acme");
        assert!(!edits.is_changed(&table.rows()[0]));
    }

    #[test]
    fn brand_edit_marks_reviewed_and_keeps_original() {
        let mut table = pending_table();
        let mut edits = untouched(&table);
        edits.updated_brand = "Acme Inc".to_string();

        submit_review(&mut table, RowId(0), &edits, "riley", today()).expect("review");

        let row = &table.rows()[0];
        assert_eq!(row.text(columns::STATUS), "Reviewed");
        assert_eq!(row.text(columns::BRAND), "Acme");
        assert_eq!(row.text(columns::UPDATED_BRAND), "Acme Inc");
        assert_eq!(row.text(columns::REVIEWER), "riley");
        assert_eq!(row.text(columns::REVIEW_DATE), "2025-07-01");
    }

    #[test]
    fn unchanged_with_no_change_flag_succeeds() {
        let mut table = pending_table();
        let mut edits = untouched(&table);
        edits.no_change = true;

        submit_review(&mut table, RowId(0), &edits, "riley", today()).expect("review");
        assert_eq!(table.rows()[0].text(columns::STATUS), "Reviewed");
        assert!(table.rows()[0].flag(columns::NO_CHANGE));
    }

    #[test]
    fn conflicting_review_leaves_table_untouched() {
        let mut table = pending_table();
        let before = table.clone();
        let mut edits = untouched(&table);
        edits.updated_description = "Acme Potato Chips 8oz".to_string();
        edits.no_change = true;

        assert_eq!(
            submit_review(&mut table, RowId(0), &edits, "riley", today()),
            Err(ReviewError::ConflictingReview)
        );
        assert_eq!(table, before);
    }

    #[test]
    fn comment_alone_counts_as_change() {
        let mut table = pending_table();
        let mut edits = untouched(&table);
        edits.comments = "looks like a false positive".to_string();
        edits.no_change = true;
        assert_eq!(
            submit_review(&mut table, RowId(0), &edits, "riley", today()),
            Err(ReviewError::ConflictingReview)
        );
    }

    #[test]
    fn nothing_changed_and_no_flag_is_incomplete() {
        let mut table = pending_table();
        let before = table.clone();
        let edits = untouched(&table);
        assert_eq!(
            submit_review(&mut table, RowId(0), &edits, "riley", today()),
            Err(ReviewError::IncompleteReview)
        );
        assert_eq!(table, before);
    }

    #[test]
    fn full_hierarchy_in_category_edit_is_a_change() {
        let table = pending_table();
        let mut edits = untouched(&table);
        edits.updated_category = "Food > Snacks > Chips".to_string();
        assert!(edits.is_changed(&table.rows()[0]));
    }

    #[test]
    fn re_review_overwrites_previous_edit() {
        let mut table = pending_table();
        let mut first = untouched(&table);
        first.updated_brand = "Acme Inc".to_string();
        submit_review(&mut table, RowId(0), &first, "riley", today()).expect("first");

        let mut second = ReviewEdits::prefill(&table.rows()[0]);
        assert_eq!(second.updated_brand, "Acme Inc");
        second.updated_brand = "Acme".to_string();
        second.no_change = true;
        submit_review(&mut table, RowId(0), &second, "sam", today()).expect("second");

        let row = &table.rows()[0];
        assert_eq!(row.text(columns::UPDATED_BRAND), "Acme");
        assert_eq!(row.text(columns::REVIEWER), "sam");
    }

    #[test]
    fn blank_reviewer_and_unknown_rows_are_rejected() {
        let mut table = pending_table();
        let mut edits = untouched(&table);
        edits.no_change = true;
        assert_eq!(
            submit_review(&mut table, RowId(0), &edits, "  ", today()),
            Err(ReviewError::MissingReviewer)
        );
        assert!(matches!(
            submit_review(&mut table, RowId(7), &edits, "riley", today()),
            Err(ReviewError::Table(_))
        ));
    }
}
