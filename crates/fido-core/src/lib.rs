pub mod columns;
pub mod key;
pub mod table;

pub use key::{KeyError, ProjectKey};
pub use table::{coerce_number, CellValue, RecordTable, Row, RowId, TableError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Date format used for `upload_date`, `review_date` and `claimed_date` cells.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Timestamp format embedded in project keys.
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    Nonlicensed,
    Licensed,
    Catq,
}

impl QueueType {
    pub const ALL: [QueueType; 3] = [QueueType::Nonlicensed, QueueType::Licensed, QueueType::Catq];

    /// Code used as the first segment of a project key.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueType::Nonlicensed => "nonlicensed",
            QueueType::Licensed => "licensed",
            QueueType::Catq => "catq",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QueueType::Nonlicensed => "Non-licensed",
            QueueType::Licensed => "Licensed",
            QueueType::Catq => "CATQ",
        }
    }

    /// Strict lookup by key code, used when decoding keys.
    pub fn from_code(code: &str) -> Option<Self> {
        QueueType::ALL
            .into_iter()
            .find(|queue| queue.as_str() == code)
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueType {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "nonlicensed" | "non-licensed" | "non_licensed" | "non licensed" => {
                Ok(QueueType::Nonlicensed)
            }
            "licensed" => Ok(QueueType::Licensed),
            "catq" => Ok(QueueType::Catq),
            other => Err(format!("Unknown queue: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Display ordering weight: higher sorts first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("Unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReviewStatus {
    #[serde(rename = "Pending Review")]
    PendingReview,
    #[serde(rename = "Reviewed")]
    Reviewed,
}

impl Default for ReviewStatus {
    fn default() -> Self {
        Self::PendingReview
    }
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::PendingReview => "Pending Review",
            ReviewStatus::Reviewed => "Reviewed",
        }
    }

    /// Tolerant read of a status cell; anything unrecognised counts as pending.
    pub fn from_cell(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "pending review" | "pending" => Ok(ReviewStatus::PendingReview),
            "reviewed" => Ok(ReviewStatus::Reviewed),
            other => Err(format!("Unknown review status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProjectStatus {
    Available,
    Claimed,
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Available => "Available",
            ProjectStatus::Claimed => "Claimed",
        }
    }

    pub fn from_cell(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "available" => Ok(ProjectStatus::Available),
            "claimed" => Ok(ProjectStatus::Claimed),
            other => Err(format!("Unknown project status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reviewer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reviewer => "reviewer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "reviewer" => Ok(Role::Reviewer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("user name cannot be empty")]
    EmptyName,
    #[error("{action} requires the admin role ({user} is a {role})")]
    AdminRequired {
        user: String,
        role: Role,
        action: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self, action: &str) -> Result<(), AuthError> {
        if self.is_admin() {
            return Ok(());
        }
        Err(AuthError::AdminRequired {
            user: self.name.clone(),
            role: self.role,
            action: action.to_string(),
        })
    }
}

/// Roles are flat; the only check is that someone typed a name.
pub fn authenticate(name: &str, role: Role) -> Result<User, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::EmptyName);
    }
    Ok(User {
        name: name.to_string(),
        role,
    })
}

/// Most specific segment of a `>`-delimited category hierarchy.
pub fn relevant_category(hierarchy: &str) -> &str {
    match hierarchy.rfind('>') {
        Some(idx) => hierarchy[idx + 1..].trim(),
        None => hierarchy.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevant_category_takes_last_segment() {
        assert_eq!(relevant_category("Food > Snacks > Chips"), "Chips");
        assert_eq!(relevant_category("Beverages"), "Beverages");
        assert_eq!(relevant_category("Food >"), "");
        assert_eq!(relevant_category(""), "");
    }

    #[test]
    fn queue_accepts_display_labels_and_codes() {
        assert_eq!("Non-licensed".parse::<QueueType>(), Ok(QueueType::Nonlicensed));
        assert_eq!("CATQ".parse::<QueueType>(), Ok(QueueType::Catq));
        assert_eq!(" licensed ".parse::<QueueType>(), Ok(QueueType::Licensed));
        assert!("licensed2".parse::<QueueType>().is_err());
        assert_eq!(QueueType::from_code("Licensed"), None);
    }

    #[test]
    fn priority_rank_orders_high_first() {
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn status_cells_round_trip_through_labels() {
        assert_eq!(
            ReviewStatus::from_cell("Reviewed"),
            ReviewStatus::Reviewed
        );
        assert_eq!(
            ReviewStatus::from_cell("garbage"),
            ReviewStatus::PendingReview
        );
        assert_eq!(
            serde_json::to_string(&ReviewStatus::PendingReview).expect("serialize"),
            "\"Pending Review\""
        );
        assert_eq!(ProjectStatus::from_cell("Claimed"), ProjectStatus::Claimed);
    }

    #[test]
    fn authenticate_rejects_blank_names_and_gates_admin_actions() {
        assert_eq!(authenticate("   ", Role::Admin), Err(AuthError::EmptyName));

        let reviewer = authenticate(" dana ", Role::Reviewer).expect("reviewer");
        assert_eq!(reviewer.name, "dana");
        assert!(reviewer.require_admin("upload").is_err());

        let admin = authenticate("root", Role::Admin).expect("admin");
        assert!(admin.require_admin("upload").is_ok());
    }
}
