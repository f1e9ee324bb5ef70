use std::fmt;

use crate::message::Message;

/// Identifies one logical unit of work for deduplication.
///
/// Two keys with equal tuples are the same unit of work, whatever delivery id
/// the transport attached to each copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub application: String,
    pub topic: String,
    pub tag: String,
    pub fingerprint: String,
}

impl DedupKey {
    pub fn new(
        application: impl Into<String>,
        topic: impl Into<String>,
        tag: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            application: application.into(),
            topic: topic.into(),
            tag: tag.into(),
            fingerprint: fingerprint.into(),
        }
    }

    /// Build the key for `message` using an already computed fingerprint.
    /// `None` is kept as an empty fingerprint.
    pub fn for_message(application: &str, message: &Message, fingerprint: Option<String>) -> Self {
        Self::new(
            application,
            message.topic.as_str(),
            message.tag.as_str(),
            fingerprint.unwrap_or_default(),
        )
    }

    /// Without a fingerprint the message cannot be deduplicated at all.
    pub fn has_fingerprint(&self) -> bool {
        !self.fingerprint.is_empty()
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.application, self.topic)?;
        if !self.tag.is_empty() {
            write!(f, ":{}", self.tag)?;
        }
        write!(f, ":{}", self.fingerprint)
    }
}
