use chrono::{DateTime, Utc};
use neo4rs::query;
use uuid::Uuid;

use leadtree_common::{ids, EventKind, EventRecord, LeadTreeError, Reward};

use crate::store::parse_datetime_prop;
use crate::GraphClient;

/// Append-only event log hanging off leads, plus reward grants.
///
/// Events are facts about what happened to a lead (a profile view, an
/// accepted invitation) and are never mutated after the fact.
#[derive(Clone)]
pub struct EventLog {
    client: GraphClient,
}

impl EventLog {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Append an event under a lead. `NotFound` if the lead is missing.
    pub async fn record(
        &self,
        lead: Uuid,
        kind: EventKind,
    ) -> Result<EventRecord, LeadTreeError> {
        let id = ids::new_id();
        let created_at = Utc::now();

        let q = query(
            "MATCH (l:Lead { id: $lead })
             CREATE (e:Event { id: $id, type: $type, created_at: $created_at })
             CREATE (l)-[:HAS_EVENT]->(e)
             RETURN e",
        )
        .param("lead", lead.to_string())
        .param("id", id.to_string())
        .param("type", kind.as_str())
        .param("created_at", created_at.to_rfc3339());

        let mut stream = self.client.graph.execute(q).await?;
        if stream.next().await?.is_none() {
            return Err(LeadTreeError::not_found("lead", lead.to_string()));
        }
        while stream.next().await?.is_some() {}

        Ok(EventRecord {
            id,
            kind,
            created_at,
        })
    }

    /// A profile view through this lead.
    pub async fn viewed_profile(&self, lead: Uuid) -> Result<EventRecord, LeadTreeError> {
        self.record(lead, EventKind::ViewedProfile).await
    }

    /// An accepted invitation: the inviting (parent) lead gets the event
    /// and receives a reward caused by the newly created lead.
    pub async fn invited_friend(
        &self,
        parent: Uuid,
        lead: Uuid,
    ) -> Result<EventRecord, LeadTreeError> {
        let event = self.record(parent, EventKind::InvitedFriend).await?;
        self.grant_reward(parent, lead).await?;
        Ok(event)
    }

    /// Grant a reward: `received_by` benefited, `caused_by` triggered it.
    pub async fn grant_reward(
        &self,
        received_by: Uuid,
        caused_by: Uuid,
    ) -> Result<Reward, LeadTreeError> {
        let id = ids::new_id();
        let created_at = Utc::now();

        let q = query(
            "MATCH (a:Lead { id: $received_by })
             MATCH (b:Lead { id: $caused_by })
             CREATE (r:Reward { id: $id, created_at: $created_at })
             CREATE (a)-[:RECEIVED_REWARD]->(r)
             CREATE (b)-[:CAUSED_REWARD]->(r)
             RETURN r",
        )
        .param("received_by", received_by.to_string())
        .param("caused_by", caused_by.to_string())
        .param("id", id.to_string())
        .param("created_at", created_at.to_rfc3339());

        let mut stream = self.client.graph.execute(q).await?;
        if stream.next().await?.is_none() {
            return Err(LeadTreeError::not_found(
                "lead for reward",
                format!("{received_by}/{caused_by}"),
            ));
        }
        while stream.next().await?.is_some() {}

        Ok(Reward { id, created_at })
    }

    /// All events recorded under a lead, oldest first.
    pub async fn events_for_lead(&self, lead: Uuid) -> Result<Vec<EventRecord>, LeadTreeError> {
        let q = query(
            "MATCH (:Lead { id: $lead })-[:HAS_EVENT]->(e:Event)
             RETURN e ORDER BY e.created_at",
        )
        .param("lead", lead.to_string());
        self.fetch_events(q).await
    }

    /// Events of one type recorded under a lead, oldest first.
    pub async fn events_for_lead_of_type(
        &self,
        lead: Uuid,
        kind: EventKind,
    ) -> Result<Vec<EventRecord>, LeadTreeError> {
        let q = query(
            "MATCH (:Lead { id: $lead })-[:HAS_EVENT]->(e:Event { type: $type })
             RETURN e ORDER BY e.created_at",
        )
        .param("lead", lead.to_string())
        .param("type", kind.as_str());
        self.fetch_events(q).await
    }

    async fn fetch_events(&self, q: neo4rs::Query) -> Result<Vec<EventRecord>, LeadTreeError> {
        let mut stream = self.client.graph.execute(q).await?;
        let mut events = Vec::new();
        while let Some(row) = stream.next().await? {
            if let Some(event) = row_to_event(&row) {
                events.push(event);
            }
        }
        Ok(events)
    }
}

fn row_to_event(row: &neo4rs::Row) -> Option<EventRecord> {
    let n: neo4rs::Node = row.get("e").ok()?;

    let id_str: String = n.get("id").ok()?;
    let id = Uuid::parse_str(&id_str).ok()?;

    let kind_str: String = n.get("type").unwrap_or_default();
    let kind = match kind_str.as_str() {
        "viewed-profile" => EventKind::ViewedProfile,
        "invited-friend" => EventKind::InvitedFriend,
        other => {
            tracing::warn!(event = %id, kind = other, "skipping event of unknown type");
            return None;
        }
    };

    let created_at: DateTime<Utc> = parse_datetime_prop(&n, "created_at");

    Some(EventRecord {
        id,
        kind,
        created_at,
    })
}
