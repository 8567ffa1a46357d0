//! Notification text and deep links.

use stakewatch_common::types::{NotificationDecision, NotificationPayload};

/// Builds payloads for a deployment's front-end.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    app_base_url: String,
}

impl PayloadBuilder {
    pub fn new(app_base_url: impl Into<String>) -> Self {
        Self {
            app_base_url: app_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Payload for a decision, or `None` when nothing should be sent.
    pub fn for_decision(&self, decision: NotificationDecision) -> Option<NotificationPayload> {
        match decision {
            NotificationDecision::None => None,
            NotificationDecision::Available => Some(NotificationPayload {
                title: "XPR reward ready to claim".to_string(),
                body: "Your XPR staking reward can be claimed now.".to_string(),
                url: format!("{}/claim", self.app_base_url),
            }),
            NotificationDecision::Upcoming(hours) => Some(NotificationPayload {
                title: "XPR reward coming up".to_string(),
                body: format!(
                    "About {} hour(s) left until your XPR staking reward can be claimed.",
                    hours
                ),
                url: format!("{}/status", self.app_base_url),
            }),
        }
    }

    /// Payload sent by the manual test-push endpoint.
    pub fn test_payload() -> NotificationPayload {
        NotificationPayload {
            title: "Test notification".to_string(),
            body: "This notification was sent for testing purposes.".to_string(),
            url: "/".to_string(),
        }
    }
}
