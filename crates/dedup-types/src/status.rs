use serde::{Deserialize, Serialize};

/// What the consumer reports back to the transport for a message or batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumeStatus {
    /// Handled; the transport may commit past it
    Success,
    /// Not handled; the transport must deliver it again
    ReconsumeLater,
}

impl ConsumeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ConsumeStatus::Success)
    }
}
