use serde::{Deserialize, Serialize};

/// Status of a live dedup record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// A handler execution holds the key
    Consuming,
    /// The handler succeeded; redeliveries are duplicates
    Consumed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Consuming => "CONSUMING",
            RecordStatus::Consumed => "CONSUMED",
        }
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONSUMING" => Ok(RecordStatus::Consuming),
            "CONSUMED" => Ok(RecordStatus::Consumed),
            _ => Err(format!("Unknown record status: {}", s)),
        }
    }
}

/// What a store read returned for a live record.
///
/// Stores are free-form underneath (a Redis string, a text column), so a value
/// that is neither status is surfaced as `Unknown` rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredStatus {
    Consuming,
    Consumed,
    Unknown(String),
}

impl StoredStatus {
    pub fn from_raw(raw: &str) -> Self {
        match raw.parse::<RecordStatus>() {
            Ok(status) => status.into(),
            Err(_) => StoredStatus::Unknown(raw.to_string()),
        }
    }
}

impl From<RecordStatus> for StoredStatus {
    fn from(status: RecordStatus) -> Self {
        match status {
            RecordStatus::Consuming => StoredStatus::Consuming,
            RecordStatus::Consumed => StoredStatus::Consumed,
        }
    }
}
