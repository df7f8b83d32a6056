use crate::{Priority, QueueType, KEY_TIMESTAMP_FORMAT};
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DELIMITER: char = '_';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("project title cannot be empty")]
    EmptyTitle,
    #[error("malformed project key '{key}': {reason}")]
    Malformed { key: String, reason: String },
}

/// Identity of one uploaded batch.
///
/// Encodes to `{queue}_{title}_{priority}_{YYYYMMDD_HHMMSS}`. Decoding reads the
/// fixed-shape segments from both ends, so titles may contain underscores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectKey {
    pub queue: QueueType,
    pub title: String,
    pub priority: Priority,
    pub uploaded_at: NaiveDateTime,
}

impl ProjectKey {
    pub fn new(
        queue: QueueType,
        title: &str,
        priority: Priority,
        uploaded_at: NaiveDateTime,
    ) -> Result<Self, KeyError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(KeyError::EmptyTitle);
        }
        Ok(Self {
            queue,
            title: title.to_string(),
            priority,
            uploaded_at: truncate_to_seconds(uploaded_at),
        })
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
            self.queue,
            self.title,
            self.priority,
            self.uploaded_at.format(KEY_TIMESTAMP_FORMAT)
        )
    }

    pub fn with_uploaded_at(&self, uploaded_at: NaiveDateTime) -> Self {
        Self {
            uploaded_at: truncate_to_seconds(uploaded_at),
            ..self.clone()
        }
    }

    /// First delimited segment of an encoded key, without decoding the rest.
    pub fn queue_segment(encoded: &str) -> &str {
        encoded.split(DELIMITER).next().unwrap_or_default()
    }
}

fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

fn malformed(key: &str, reason: impl Into<String>) -> KeyError {
    KeyError::Malformed {
        key: key.to_string(),
        reason: reason.into(),
    }
}

impl FromStr for ProjectKey {
    type Err = KeyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = input.split(DELIMITER).collect();
        if parts.len() < 5 {
            return Err(malformed(input, "expected queue, title, priority, date and time"));
        }

        let n = parts.len();
        let queue = QueueType::from_code(parts[0])
            .ok_or_else(|| malformed(input, format!("unknown queue '{}'", parts[0])))?;
        let priority = Priority::from_str(parts[n - 3]).map_err(|err| malformed(input, err))?;
        let stamp = format!("{}{DELIMITER}{}", parts[n - 2], parts[n - 1]);
        let uploaded_at = NaiveDateTime::parse_from_str(&stamp, KEY_TIMESTAMP_FORMAT)
            .map_err(|err| malformed(input, format!("bad timestamp '{stamp}': {err}")))?;
        let title = parts[1..n - 3].join(&DELIMITER.to_string());
        if title.is_empty() {
            return Err(malformed(input, "empty title"));
        }

        Ok(Self {
            queue,
            title,
            priority,
            uploaded_at,
        })
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl TryFrom<String> for ProjectKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectKey> for String {
    fn from(key: ProjectKey) -> Self {
        key.encode()
    }
}

// Upload time first so map iteration follows insertion order.
impl Ord for ProjectKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uploaded_at
            .cmp(&other.uploaded_at)
            .then_with(|| self.queue.cmp(&other.queue))
            .then_with(|| self.title.cmp(&other.title))
            .then_with(|| self.priority.cmp(&other.priority))
    }
}

impl PartialOrd for ProjectKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
