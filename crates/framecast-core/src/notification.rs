//! The Notification Record and its inbound draft.
//!
//! Producers send a [`NotificationDraft`]: every field is optional and the
//! `type` is kept as a raw string. The broker turns a draft into a
//! [`NotificationRecord`] by assigning the ID and timestamp, filling in the
//! source, and coercing the type. Records are what consumers receive and what
//! the history buffer stores.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::NotificationId;

/// Severity of a notification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum NotificationType {
    /// Informational (also the target of coercion).
    #[default]
    Info,
    /// Something completed successfully.
    Success,
    /// Needs attention soon.
    Warning,
    /// Something failed.
    Error,
}

impl NotificationType {
    /// Map a wire string to a type; anything unrecognised becomes [`Info`](Self::Info).
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "success" => Self::Success,
            "warning" => Self::Warning,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl From<String> for NotificationType {
    fn from(raw: String) -> Self {
        Self::coerce(&raw)
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Producer-supplied notification fields, before the broker normalises them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationDraft {
    /// Optional producer-chosen ID; kept only if it is not already buffered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Headline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Producer app ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Producer correlation ID (order number, ticket, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Raw type string, coerced on normalisation.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Whether `link` should be rendered as an action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actionable: Option<bool>,
    /// Action target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Request an SMS side-channel dispatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_enabled: Option<bool>,
    /// Phone number for the SMS side channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_recipient: Option<String>,
}

impl NotificationDraft {
    /// Draft with the three fields every producer must supply.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Names of required fields (`title`, `description`, `type`) that are absent or empty.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().is_none_or(str::is_empty);
        let mut missing = Vec::new();
        if blank(&self.title) {
            missing.push("title");
        }
        if blank(&self.description) {
            missing.push("description");
        }
        if blank(&self.kind) {
            missing.push("type");
        }
        missing
    }
}

/// Canonical notification as stored and broadcast by the broker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Unique within the history buffer.
    pub id: NotificationId,
    /// Headline.
    pub title: String,
    /// Body text.
    pub description: String,
    /// App ID of the producer.
    pub source: String,
    /// Producer correlation ID, possibly empty.
    #[serde(default)]
    pub source_id: String,
    /// Severity.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Creation time, assigned by the broker.
    pub timestamp: DateTime<Utc>,
    /// Whether `link` is meaningful.
    #[serde(default)]
    pub actionable: bool,
    /// Action target, meaningful only when `actionable`.
    #[serde(default)]
    pub link: String,
    /// Whether the SMS side channel was requested.
    #[serde(default)]
    pub sms_enabled: bool,
    /// SMS recipient, consulted only when `sms_enabled`.
    #[serde(default)]
    pub sms_recipient: String,
}

impl NotificationRecord {
    /// Build a record from a draft with broker-assigned fields.
    ///
    /// `source` is used when the draft carries none. The timestamp is
    /// truncated to millisecond precision.
    pub fn from_draft(
        draft: NotificationDraft,
        id: NotificationId,
        source: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: draft.title.unwrap_or_default(),
            description: draft.description.unwrap_or_default(),
            source: draft
                .source
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| source.to_owned()),
            source_id: draft.source_id.unwrap_or_default(),
            kind: draft
                .kind
                .as_deref()
                .map(NotificationType::coerce)
                .unwrap_or_default(),
            timestamp: timestamp.trunc_subsecs(3),
            actionable: draft.actionable.unwrap_or(false),
            link: draft.link.unwrap_or_default(),
            sms_enabled: draft.sms_enabled.unwrap_or(false),
            sms_recipient: draft.sms_recipient.unwrap_or_default(),
        }
    }

    /// Recipient for the SMS side channel, if one was requested.
    pub fn sms_target(&self) -> Option<&str> {
        (self.sms_enabled && !self.sms_recipient.is_empty()).then_some(self.sms_recipient.as_str())
    }

    /// Text used for the SMS side channel.
    pub fn sms_body(&self) -> String {
        format!("{}: {}", self.title, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T10:00:00.123456Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn coerce_known_types() {
        assert_eq!(NotificationType::coerce("info"), NotificationType::Info);
        assert_eq!(NotificationType::coerce("success"), NotificationType::Success);
        assert_eq!(NotificationType::coerce("warning"), NotificationType::Warning);
        assert_eq!(NotificationType::coerce("error"), NotificationType::Error);
    }

    #[test]
    fn coerce_unknown_type_to_info() {
        assert_eq!(NotificationType::coerce("urgent"), NotificationType::Info);
        assert_eq!(NotificationType::coerce(""), NotificationType::Info);
        assert_eq!(NotificationType::coerce("ERROR"), NotificationType::Info);
    }

    #[test]
    fn type_deserialize_coerces() {
        let t: NotificationType = serde_json::from_value(json!("bogus")).unwrap();
        assert_eq!(t, NotificationType::Info);
        let t: NotificationType = serde_json::from_value(json!("warning")).unwrap();
        assert_eq!(t, NotificationType::Warning);
    }

    #[test]
    fn type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(NotificationType::Success).unwrap(),
            json!("success")
        );
    }

    #[test]
    fn draft_missing_fields() {
        let draft = NotificationDraft {
            title: Some("t".into()),
            description: Some(String::new()),
            ..NotificationDraft::default()
        };
        assert_eq!(draft.missing_required_fields(), vec!["description", "type"]);
        assert!(NotificationDraft::new("t", "d", "info")
            .missing_required_fields()
            .is_empty());
    }

    #[test]
    fn draft_parses_camel_case() {
        let draft: NotificationDraft = serde_json::from_value(json!({
            "title": "Order Placed",
            "description": "Order #100",
            "type": "success",
            "sourceId": "100",
            "smsEnabled": true,
            "smsRecipient": "+15551234567"
        }))
        .unwrap();
        assert_eq!(draft.source_id.as_deref(), Some("100"));
        assert_eq!(draft.sms_enabled, Some(true));
        assert_eq!(draft.kind.as_deref(), Some("success"));
    }

    #[test]
    fn record_from_draft_fills_defaults() {
        let draft = NotificationDraft::new("Title", "Body", "nonsense");
        let record =
            NotificationRecord::from_draft(draft, NotificationId::from("n1"), "appA", fixed_time());
        assert_eq!(record.id.as_str(), "n1");
        assert_eq!(record.source, "appA");
        assert_eq!(record.source_id, "");
        assert_eq!(record.kind, NotificationType::Info);
        assert!(!record.actionable);
        assert_eq!(record.link, "");
        assert!(record.sms_target().is_none());
    }

    #[test]
    fn record_keeps_draft_source() {
        let mut draft = NotificationDraft::new("Title", "Body", "info");
        draft.source = Some("orders-app".into());
        let record =
            NotificationRecord::from_draft(draft, NotificationId::new(), "fallback", fixed_time());
        assert_eq!(record.source, "orders-app");
    }

    #[test]
    fn record_timestamp_truncated_to_millis() {
        let record = NotificationRecord::from_draft(
            NotificationDraft::new("t", "d", "info"),
            NotificationId::new(),
            "a",
            fixed_time(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["timestamp"], "2026-03-01T10:00:00.123Z");
    }

    #[test]
    fn record_serializes_camel_case() {
        let mut draft = NotificationDraft::new("t", "d", "error");
        draft.sms_enabled = Some(true);
        draft.sms_recipient = Some("+15550001111".into());
        draft.source_id = Some("INV-9".into());
        let record =
            NotificationRecord::from_draft(draft, NotificationId::from("x"), "inv", fixed_time());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["sourceId"], "INV-9");
        assert_eq!(json["smsEnabled"], true);
        assert_eq!(json["smsRecipient"], "+15550001111");
        assert_eq!(record.sms_target(), Some("+15550001111"));
    }

    #[test]
    fn sms_target_requires_recipient() {
        let mut draft = NotificationDraft::new("t", "d", "info");
        draft.sms_enabled = Some(true);
        let record =
            NotificationRecord::from_draft(draft, NotificationId::new(), "a", fixed_time());
        assert!(record.sms_target().is_none());
    }

    #[test]
    fn sms_body_joins_title_and_description() {
        let record = NotificationRecord::from_draft(
            NotificationDraft::new("Low stock", "Frame 16x20: 5 left", "warning"),
            NotificationId::new(),
            "inventory",
            fixed_time(),
        );
        assert_eq!(record.sms_body(), "Low stock: Frame 16x20: 5 left");
    }
}
