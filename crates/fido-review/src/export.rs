use crate::ExportError;
use fido_core::columns;
use fido_core::{RecordTable, ReviewStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExportView {
    AllRows,
    ReviewedOnly,
}

impl ExportView {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportView::AllRows => "all",
            ExportView::ReviewedOnly => "reviewed",
        }
    }
}

impl Default for ExportView {
    fn default() -> Self {
        ExportView::AllRows
    }
}

impl fmt::Display for ExportView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportView {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "all" | "all-rows" => Ok(ExportView::AllRows),
            "reviewed" | "reviewed-only" => Ok(ExportView::ReviewedOnly),
            other => Err(format!("unknown export view: {other}")),
        }
    }
}

const DROPPED_FROM_REVIEWED: [&str; 3] = [columns::BRAND, columns::CATEGORY, columns::DESCRIPTION];

const REVIEWED_RENAMES: [(&str, &str); 6] = [
    (columns::UPDATED_BRAND, "BRAND"),
    (columns::UPDATED_CATEGORY, "CATEGORY"),
    (columns::UPDATED_DESCRIPTION, "DESCRIPTION"),
    (columns::COMMENTS, "REVIEW_COMMENTS"),
    (columns::REVIEWER, "REVIEWER"),
    (columns::REVIEW_DATE, "REVIEW_DATE"),
];

fn export_name(column: &str) -> &str {
    REVIEWED_RENAMES
        .iter()
        .find(|(from, _)| *from == column)
        .map(|(_, to)| *to)
        .unwrap_or(column)
}

/// Shapes a project for download. The reviewed view keeps only reviewed rows
/// and presents the reviewer's values under the original headers.
pub fn export_table(table: &RecordTable, view: ExportView) -> RecordTable {
    match view {
        ExportView::AllRows => table.clone(),
        ExportView::ReviewedOnly => {
            let kept: Vec<&String> = table
                .columns()
                .iter()
                .filter(|name| !DROPPED_FROM_REVIEWED.contains(&name.as_str()))
                .collect();
            let mut shaped = RecordTable::new(kept.iter().map(|name| export_name(name)));
            for row in table.rows().iter().filter(|row| {
                ReviewStatus::from_cell(&row.text(columns::STATUS)) == ReviewStatus::Reviewed
            }) {
                shaped.push_row(kept.iter().filter_map(|name| {
                    row.get(name).map(|value| (export_name(name), value.clone()))
                }));
            }
            shaped
        }
    }
}

pub fn to_csv(table: &RecordTable, view: ExportView) -> Result<String, ExportError> {
    let shaped = export_table(table, view);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(shaped.columns())?;
    for row in shaped.rows() {
        writer.write_record(shaped.columns().iter().map(|name| row.text(name)))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Encoding(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ExportError::Encoding(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reviewed_table() -> RecordTable {
        let mut table = RecordTable::new([
            columns::FIDO_ID,
            columns::BRAND,
            columns::CATEGORY,
            columns::DESCRIPTION,
            columns::GMV,
            columns::UPDATED_BRAND,
            columns::UPDATED_CATEGORY,
            columns::UPDATED_DESCRIPTION,
            columns::COMMENTS,
            columns::STATUS,
            columns::REVIEWER,
            columns::REVIEW_DATE,
        ]);
        table.push_row([
            (columns::FIDO_ID, "F-1"),
            (columns::BRAND, "Acme"),
            (columns::CATEGORY, "Food > Chips"),
            (columns::DESCRIPTION, "chips"),
            (columns::GMV, "12"),
            (columns::UPDATED_BRAND, "Acme Inc"),
            (columns::UPDATED_CATEGORY, "Chips"),
            (columns::UPDATED_DESCRIPTION, "chips"),
            (columns::COMMENTS, "brand, renamed"),
            (columns::STATUS, "Reviewed"),
            (columns::REVIEWER, "riley"),
            (columns::REVIEW_DATE, "2025-07-01"),
        ]);
        table.push_row([
            (columns::FIDO_ID, "F-2"),
            (columns::BRAND, "Zed"),
            (columns::STATUS, "Pending Review"),
        ]);
        table
    }

    #[test]
    fn reviewed_view_renames_and_drops_originals() {
        let shaped = export_table(&reviewed_table(), ExportView::ReviewedOnly);
        assert_eq!(
            shaped.columns(),
            [
                "fido_id",
                "gmv",
                "BRAND",
                "CATEGORY",
                "DESCRIPTION",
                "REVIEW_COMMENTS",
                "status",
                "REVIEWER",
                "REVIEW_DATE"
            ]
        );
        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped.rows()[0].text("BRAND"), "Acme Inc");
    }

    #[test]
    fn all_rows_view_is_the_table_as_stored() {
        let table = reviewed_table();
        assert_eq!(export_table(&table, ExportView::AllRows), table);
    }

    #[test]
    fn csv_quotes_embedded_delimiters() {
        let text = to_csv(&reviewed_table(), ExportView::ReviewedOnly).expect("csv");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(
                "fido_id,gmv,BRAND,CATEGORY,DESCRIPTION,REVIEW_COMMENTS,status,REVIEWER,REVIEW_DATE"
            )
        );
        assert_eq!(
            lines.next(),
            Some("F-1,12,Acme Inc,Chips,chips,\"brand, renamed\",Reviewed,riley,2025-07-01")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn view_parses_from_cli_words() {
        assert_eq!("Reviewed".parse::<ExportView>(), Ok(ExportView::ReviewedOnly));
        assert_eq!(" all ".parse::<ExportView>(), Ok(ExportView::AllRows));
        assert!("nope".parse::<ExportView>().is_err());
    }
}
