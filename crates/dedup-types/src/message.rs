use serde::{Deserialize, Serialize};

/// A message as delivered by the transport.
///
/// Only the attributes the dedup layer cares about are modelled; the body is
/// opaque bytes handed through to the handler untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Topic the message was published to
    pub topic: String,

    /// Routing tag; a missing tag is stored as the empty string
    #[serde(default)]
    pub tag: String,

    /// Broker-assigned message id (changes on every physical redelivery
    /// for some transports)
    pub msg_id: String,

    /// Producer-assigned unique id, stable across redeliveries when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    /// Opaque payload
    #[serde(default)]
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(
        topic: impl Into<String>,
        tag: Option<&str>,
        msg_id: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            tag: tag.unwrap_or_default().to_string(),
            msg_id: msg_id.into(),
            unique_id: None,
            body: body.into(),
        }
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// The transport's delivery id: the producer's unique id when it has one,
    /// the broker message id otherwise.
    pub fn delivery_id(&self) -> &str {
        match self.unique_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => &self.msg_id,
        }
    }

    /// Body decoded as UTF-8, lossy
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
