//! Read-only summaries over project tables. Nothing here mutates its input.

use fido_core::columns;
use fido_core::{relevant_category, Priority, ProjectKey, QueueType, RecordTable, ReviewStatus, Row};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectStats {
    pub total: usize,
    pub reviewed: usize,
    pub pending: usize,
    pub progress_pct: f64,
    pub gmv_sum: f64,
    pub reviewed_gmv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStats {
    pub queue: QueueType,
    pub projects: usize,
    pub total: usize,
    pub reviewed: usize,
    pub progress_pct: f64,
    pub gmv_sum: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BucketTotals {
    pub count: usize,
    pub gmv: f64,
}

impl BucketTotals {
    fn add(&mut self, gmv: f64) {
        self.count += 1;
        self.gmv += gmv;
    }

    fn merge(&mut self, other: &BucketTotals) {
        self.count += other.count;
        self.gmv += other.gmv;
    }
}

/// Reviewed rows split by which fields the reviewer actually changed.
/// The four buckets partition the reviewed rows; `description_updated` and
/// `brand_id_missing` are independent overlapping counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateClassification {
    pub total_reviewed: usize,
    pub category_only: BucketTotals,
    pub brand_only: BucketTotals,
    pub both: BucketTotals,
    pub none: BucketTotals,
    pub description_updated: BucketTotals,
    pub brand_id_missing: usize,
}

impl UpdateClassification {
    pub fn is_consistent(&self) -> bool {
        self.category_only.count + self.brand_only.count + self.both.count + self.none.count
            == self.total_reviewed
    }

    pub fn merge(&mut self, other: &UpdateClassification) {
        self.total_reviewed += other.total_reviewed;
        self.category_only.merge(&other.category_only);
        self.brand_only.merge(&other.brand_only);
        self.both.merge(&other.both);
        self.none.merge(&other.none);
        self.description_updated.merge(&other.description_updated);
        self.brand_id_missing += other.brand_id_missing;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewerStats {
    pub reviewer: String,
    pub reviewed: usize,
    pub gmv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GmvBand {
    pub band: &'static str,
    pub count: usize,
    pub gmv: f64,
}

const GMV_BANDS: [&str; 6] = [
    "$0",
    "$1 - $499",
    "$500 - $999",
    "$1000 - $4999",
    "$5000 - $9999",
    "$10000+",
];

fn is_reviewed(row: &Row) -> bool {
    ReviewStatus::from_cell(&row.text(columns::STATUS)) == ReviewStatus::Reviewed
}

fn progress(reviewed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (reviewed as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn project_stats(table: &RecordTable) -> ProjectStats {
    let mut stats = ProjectStats {
        total: table.len(),
        ..ProjectStats::default()
    };
    for row in table.rows() {
        let gmv = row.number(columns::GMV);
        stats.gmv_sum += gmv;
        if is_reviewed(row) {
            stats.reviewed += 1;
            stats.reviewed_gmv += gmv;
        }
    }
    stats.pending = stats.total - stats.reviewed;
    stats.progress_pct = progress(stats.reviewed, stats.total);
    stats
}

/// One rollup per queue, always in `QueueType::ALL` order, empty queues included.
pub fn queue_stats<'a, I>(projects: I) -> Vec<QueueStats>
where
    I: IntoIterator<Item = (&'a ProjectKey, &'a RecordTable)>,
{
    let mut rollups: BTreeMap<QueueType, QueueStats> = QueueType::ALL
        .into_iter()
        .map(|queue| {
            (
                queue,
                QueueStats {
                    queue,
                    projects: 0,
                    total: 0,
                    reviewed: 0,
                    progress_pct: 0.0,
                    gmv_sum: 0.0,
                },
            )
        })
        .collect();

    for (key, table) in projects {
        let stats = project_stats(table);
        if let Some(rollup) = rollups.get_mut(&key.queue) {
            rollup.projects += 1;
            rollup.total += stats.total;
            rollup.reviewed += stats.reviewed;
            rollup.gmv_sum += stats.gmv_sum;
        }
    }

    QueueType::ALL
        .into_iter()
        .filter_map(|queue| rollups.remove(&queue))
        .map(|mut rollup| {
            rollup.progress_pct = progress(rollup.reviewed, rollup.total);
            rollup
        })
        .collect()
}

pub fn update_classification(table: &RecordTable) -> UpdateClassification {
    let mut summary = UpdateClassification::default();
    for row in table.rows().iter().filter(|row| is_reviewed(row)) {
        summary.total_reviewed += 1;
        let gmv = row.number(columns::GMV);

        let original_category = row.text(columns::CATEGORY);
        let category_changed =
            row.text(columns::UPDATED_CATEGORY).trim() != relevant_category(&original_category);
        let brand_changed =
            row.text(columns::UPDATED_BRAND).trim() != row.text(columns::BRAND).trim();

        let bucket = match (category_changed, brand_changed) {
            (true, false) => &mut summary.category_only,
            (false, true) => &mut summary.brand_only,
            (true, true) => &mut summary.both,
            (false, false) => &mut summary.none,
        };
        bucket.add(gmv);

        if row.text(columns::UPDATED_DESCRIPTION).trim() != row.text(columns::DESCRIPTION).trim() {
            summary.description_updated.add(gmv);
        }
        if row.get(columns::BRAND_ID).map_or(true, |value| value.is_blank()) {
            summary.brand_id_missing += 1;
        }
    }
    summary
}

pub fn update_classification_all<'a, I>(tables: I) -> UpdateClassification
where
    I: IntoIterator<Item = &'a RecordTable>,
{
    let mut summary = UpdateClassification::default();
    for table in tables {
        summary.merge(&update_classification(table));
    }
    summary
}

/// Reviewed row counts per reviewer, busiest first, ties by name.
pub fn reviewer_stats<'a, I>(tables: I) -> Vec<ReviewerStats>
where
    I: IntoIterator<Item = &'a RecordTable>,
{
    let mut by_reviewer: BTreeMap<String, ReviewerStats> = BTreeMap::new();
    for table in tables {
        for row in table.rows().iter().filter(|row| is_reviewed(row)) {
            let reviewer = row.text(columns::REVIEWER);
            let entry = by_reviewer
                .entry(reviewer.clone())
                .or_insert_with(|| ReviewerStats {
                    reviewer,
                    reviewed: 0,
                    gmv: 0.0,
                });
            entry.reviewed += 1;
            entry.gmv += row.number(columns::GMV);
        }
    }
    let mut stats: Vec<ReviewerStats> = by_reviewer.into_values().collect();
    stats.sort_by_key(|entry| Reverse(entry.reviewed));
    stats
}

/// Only an exact zero is `$0`; negative net GMV falls in the lowest paid band.
pub fn gmv_band(amount: f64) -> &'static str {
    let idx = if amount == 0.0 {
        0
    } else if amount < 500.0 {
        1
    } else if amount < 1_000.0 {
        2
    } else if amount < 5_000.0 {
        3
    } else if amount < 10_000.0 {
        4
    } else {
        5
    };
    GMV_BANDS[idx]
}

/// Row count and GMV per band, every band listed in ascending order.
pub fn gmv_band_breakdown(table: &RecordTable) -> Vec<GmvBand> {
    let mut bands: Vec<GmvBand> = GMV_BANDS
        .iter()
        .map(|band| GmvBand {
            band: *band,
            count: 0,
            gmv: 0.0,
        })
        .collect();
    for row in table.rows() {
        let gmv = row.number(columns::GMV);
        let label = gmv_band(gmv);
        if let Some(band) = bands.iter_mut().find(|band| band.band == label) {
            band.count += 1;
            band.gmv += gmv;
        }
    }
    bands
}

/// Stable sort by priority rank, highest first; equal priorities keep their order.
pub fn sort_by_priority<T, F>(items: &mut [T], priority: F)
where
    F: Fn(&T) -> Priority,
{
    items.sort_by_key(|item| Reverse(priority(item).rank()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reviewed_row(
        table: &mut RecordTable,
        category: &str,
        updated_category: &str,
        brand: &str,
        updated_brand: &str,
        gmv: &str,
    ) {
        table.push_row([
            (columns::CATEGORY, category),
            (columns::UPDATED_CATEGORY, updated_category),
            (columns::BRAND, brand),
            (columns::UPDATED_BRAND, updated_brand),
            (columns::DESCRIPTION, "desc"),
            (columns::UPDATED_DESCRIPTION, "desc"),
            (columns::STATUS, "Reviewed"),
            (columns::REVIEWER, "riley"),
            (columns::GMV, gmv),
        ]);
    }

    fn mixed_table() -> RecordTable {
        let mut table = RecordTable::default();
        reviewed_row(&mut table, "A > Chips", "Crisps", "Acme", "Acme", "100");
        reviewed_row(&mut table, "A > Chips", "Chips", "Acme", "Acme Inc", "50");
        reviewed_row(&mut table, "A > Chips", "Crisps", "Acme", "Acme Inc", "bad");
        reviewed_row(&mut table, "A > Chips", "Chips", "Acme", "Acme", "25");
        table.push_row([
            (columns::STATUS, "Pending Review"),
            (columns::GMV, "1000"),
        ]);
        table
    }

    #[test]
    fn project_stats_counts_and_sums() {
        let stats = project_stats(&mixed_table());
        assert_eq!(stats.total, 5);
        assert_eq!(stats.reviewed, 4);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.progress_pct, 80.0);
        assert_eq!(stats.gmv_sum, 1175.0);
        assert_eq!(stats.reviewed_gmv, 175.0);
    }

    #[test]
    fn empty_table_has_zero_progress() {
        let stats = project_stats(&RecordTable::default());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.progress_pct, 0.0);
    }

    #[test]
    fn classification_partitions_reviewed_rows() {
        let summary = update_classification(&mixed_table());
        assert_eq!(summary.total_reviewed, 4);
        assert_eq!(summary.category_only, BucketTotals { count: 1, gmv: 100.0 });
        assert_eq!(summary.brand_only, BucketTotals { count: 1, gmv: 50.0 });
        assert_eq!(summary.both, BucketTotals { count: 1, gmv: 0.0 });
        assert_eq!(summary.none, BucketTotals { count: 1, gmv: 25.0 });
        assert_eq!(summary.description_updated.count, 0);
        assert_eq!(summary.brand_id_missing, 4);
        assert!(summary.is_consistent());
    }

    #[test]
    fn queue_stats_cover_every_queue() {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("ts");
        let licensed = ProjectKey::new(QueueType::Licensed, "L", Priority::Low, ts).expect("key");
        let table = mixed_table();

        let stats = queue_stats([(&licensed, &table)]);
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].queue, QueueType::Nonlicensed);
        assert_eq!(stats[0].progress_pct, 0.0);
        assert_eq!(stats[1].queue, QueueType::Licensed);
        assert_eq!(stats[1].projects, 1);
        assert_eq!(stats[1].reviewed, 4);
        assert_eq!(stats[1].progress_pct, 80.0);
    }

    #[test]
    fn gmv_bands_follow_thresholds() {
        assert_eq!(gmv_band(0.0), "$0");
        assert_eq!(gmv_band(-25.0), "$1 - $499");
        assert_eq!(gmv_band(499.99), "$1 - $499");
        assert_eq!(gmv_band(500.0), "$500 - $999");
        assert_eq!(gmv_band(4_999.0), "$1000 - $4999");
        assert_eq!(gmv_band(9_999.0), "$5000 - $9999");
        assert_eq!(gmv_band(10_000.0), "$10000+");

        let bands = gmv_band_breakdown(&mixed_table());
        assert_eq!(bands.len(), 6);
        assert_eq!(bands[0].count, 1);
        assert_eq!(bands[1].count, 3);
        assert_eq!(bands[3].gmv, 1000.0);
    }

    #[test]
    fn reviewer_stats_groups_by_name() {
        let table = mixed_table();
        let stats = reviewer_stats([&table, &table]);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].reviewer, "riley");
        assert_eq!(stats[0].reviewed, 8);
    }

    #[test]
    fn priority_sort_is_descending_and_stable() {
        let mut items = vec![
            ("a", Priority::Low),
            ("b", Priority::High),
            ("c", Priority::Medium),
            ("d", Priority::High),
            ("e", Priority::Low),
        ];
        sort_by_priority(&mut items, |item| item.1);
        let order: Vec<&str> = items.iter().map(|item| item.0).collect();
        assert_eq!(order, vec!["b", "d", "c", "a", "e"]);
    }
}
