//! Field implementations, and the per-scope field set built from configuration.

pub mod almanac;
pub mod birthday;
pub mod double_hour;
pub mod event;
mod fortune;
pub mod moon;

use std::sync::Arc;

use almanac_core::{AnniversaryEntry, ScopeConfig};
use chrono::NaiveDate;
use serde::Serialize;

use crate::provider::CalendarProvider;
use crate::registry::{DroppedEntry, FieldSpec, NotificationRequest};

pub use almanac::AlmanacKey;

pub(crate) fn for_scope(
    scope: &Arc<ScopeConfig>,
    provider: &dyn CalendarProvider,
    dropped: &mut Vec<DroppedEntry>,
) -> Vec<FieldSpec> {
    let mut specs = almanac::specs(scope, dropped);
    if scope.birthday_enabled {
        specs.extend(birthday::specs(scope, provider, dropped));
    }
    if scope.event_enabled {
        specs.extend(event::specs(scope, dropped));
    }
    specs
}

fn signature<T: Serialize + ?Sized>(kind: &str, value: &T) -> String {
    format!("{kind}:{}", serde_json::to_string(value).unwrap_or_default())
}

fn join_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(" ")
    }
}

/// The entry's notification, if it carries one.
fn notification_for(entry: &AnniversaryEntry, days: i64, date: NaiveDate) -> Option<NotificationRequest> {
    entry.notification.as_ref().map(|n| NotificationRequest {
        service: n.service.clone(),
        template: n.message.clone(),
        name: entry.name.clone(),
        days,
        date: date.format("%Y-%m-%d").to_string(),
    })
}
