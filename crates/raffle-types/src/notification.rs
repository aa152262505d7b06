//! User facing notifications.
//!
//! Notifications are fire-and-forget: the sink renders them transiently and
//! nothing waits for an acknowledgment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
	Info,
	Success,
	Warning,
	Error,
}

/// Where a front end should render the notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
	#[serde(rename = "topL")]
	TopLeft,
	#[default]
	#[serde(rename = "topR")]
	TopRight,
	#[serde(rename = "bottomL")]
	BottomLeft,
	#[serde(rename = "bottomR")]
	BottomRight,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
	pub kind: NotificationKind,
	pub title: String,
	pub message: String,
	pub placement: Placement,
}

impl Notification {
	pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			kind,
			title: title.into(),
			message: message.into(),
			placement: Placement::default(),
		}
	}

	/// Notification shown once an entry transaction is confirmed.
	pub fn transaction_complete() -> Self {
		Self::new(
			NotificationKind::Success,
			"Transaction Complete!",
			"Transaction Notification",
		)
	}
}

impl fmt::Display for Notification {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.title, self.message)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_transaction_complete_defaults_to_top_right() {
		let notification = Notification::transaction_complete();
		assert_eq!(notification.kind, NotificationKind::Success);
		assert_eq!(notification.placement, Placement::TopRight);

		let json = serde_json::to_string(&notification).unwrap();
		assert!(json.contains("\"topR\""));
		assert!(json.contains("\"success\""));
	}
}
