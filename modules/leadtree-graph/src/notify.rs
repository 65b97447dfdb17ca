use tracing::warn;
use uuid::Uuid;

use leadtree_common::LeadSource;

use crate::events::EventLog;
use crate::GraphClient;

/// Fire-and-forget bookkeeping after a lead is created.
///
/// Dispatch runs on a detached task with its own failure channel: an
/// error is logged and goes nowhere else, so the creation that triggered
/// it is never failed or rolled back. No retry.
#[derive(Clone)]
pub struct Notifier {
    events: EventLog,
}

impl Notifier {
    pub fn new(client: GraphClient) -> Self {
        Self {
            events: EventLog::new(client),
        }
    }

    /// Select the side effect by the new lead's source. The match is
    /// exhaustive: adding a source variant without a notification path
    /// is a compile error.
    pub fn dispatch(&self, source: LeadSource, parent: Uuid, lead: Uuid) {
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = match source {
                LeadSource::Invitation => events.invited_friend(parent, lead).await.map(|_| ()),
                LeadSource::Unknown => events.viewed_profile(lead).await.map(|_| ()),
            };
            if let Err(err) = result {
                warn!(%lead, %parent, source = %source, error = %err, "lead notification failed");
            }
        });
    }
}
