//! Wire types of the CRM API.

use serde::{Deserialize, Serialize};

/// A comment on a lead's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    /// Some deployments return `null` for attachment-only comments.
    #[serde(default)]
    pub text: Option<String>,
}

/// Who wrote a chat entry, from the CRM's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatDirection {
    /// Written by the end-user (what we mirror in).
    #[serde(rename = "in", alias = "incoming", alias = "inbound")]
    Inbound,
    /// Written by an operator inside the CRM.
    #[serde(rename = "out", alias = "outgoing", alias = "outbound")]
    Outbound,
}

/// One entry of a lead's live chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// CRM-formatted timestamp, see [`crate::timestamp::parse_timestamp_ms`].
    pub timestamp: String,
    #[serde(default)]
    pub message: String,
    pub direction: ChatDirection,
}

/// A lead custom field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadField {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub id: i64,
    pub value: String,
}

/// Payload for lead creation. The CRM insists on at least one contact
/// detail, hence the synthesized e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<CustomFieldValue>,
}
