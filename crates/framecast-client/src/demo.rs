//! Synthetic data for demo mode.

use chrono::{DateTime, Duration, Utc};
use framecast_core::{NotificationDraft, NotificationId, NotificationRecord, NotificationType};

struct Sample {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    source: &'static str,
    source_id: &'static str,
    kind: NotificationType,
    age_secs: i64,
    link: &'static str,
    read: bool,
}

const SAMPLES: [Sample; 4] = [
    Sample {
        id: "1",
        title: "New Order Received",
        description: "A new custom frame order has been placed for 8x10 standard frame.",
        source: "orders-app",
        source_id: "12345",
        kind: NotificationType::Success,
        age_secs: 300,
        link: "/orders/12345",
        read: false,
    },
    Sample {
        id: "2",
        title: "Low Inventory Alert",
        description: "Black metal frame (16x20) is running low. Current stock: 5 units",
        source: "inventory-app",
        source_id: "inv-12345",
        kind: NotificationType::Warning,
        age_secs: 3_600,
        link: "/inventory/restock",
        read: false,
    },
    Sample {
        id: "3",
        title: "Customer Support Request",
        description: "John Smith has a question about order #33456",
        source: "support-app",
        source_id: "ticket-12345",
        kind: NotificationType::Info,
        age_secs: 86_400,
        link: "/support/tickets/2345",
        read: true,
    },
    Sample {
        id: "4",
        title: "Payment Processing Failed",
        description: "Unable to process payment for Order #78901. Please contact customer.",
        source: "payment-app",
        source_id: "payment-12345",
        kind: NotificationType::Error,
        age_secs: 172_800,
        link: "/payments/failed/78901",
        read: true,
    },
];

/// The fixed sample set with its read flags, newest first.
pub fn sample_notifications(now: DateTime<Utc>) -> Vec<(NotificationRecord, bool)> {
    SAMPLES
        .iter()
        .map(|s| {
            let record = NotificationRecord {
                id: NotificationId::from(s.id),
                title: s.title.to_owned(),
                description: s.description.to_owned(),
                source: s.source.to_owned(),
                source_id: s.source_id.to_owned(),
                kind: s.kind,
                timestamp: now - Duration::seconds(s.age_secs),
                actionable: true,
                link: s.link.to_owned(),
                sms_enabled: false,
                sms_recipient: String::new(),
            };
            (record, s.read)
        })
        .collect()
}

/// A locally built record standing in for one the broker would have returned.
pub fn synthetic_record(draft: NotificationDraft, app_id: &str) -> NotificationRecord {
    let id = draft
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .map_or_else(NotificationId::new, NotificationId::from);
    NotificationRecord::from_draft(draft, id, app_id, Utc::now())
}
