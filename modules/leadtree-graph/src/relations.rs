use neo4rs::query;
use uuid::Uuid;

use leadtree_common::{
    EventKind, EventRecord, Lead, LeadAtDepth, LeadSource, LeadTreeError, Profile, User,
};

use crate::events::EventLog;
use crate::store::LeadStore;
use crate::GraphClient;

/// Eagerly-declared relation resolution for a lead: one explicit method
/// per relation, each running its own typed lookup. The transport that
/// mounts these (GraphQL or otherwise) lives elsewhere.
#[derive(Clone)]
pub struct LeadRelations {
    client: GraphClient,
    store: LeadStore,
    events: EventLog,
}

impl LeadRelations {
    pub fn new(client: GraphClient) -> Self {
        Self {
            store: LeadStore::new(client.clone()),
            events: EventLog::new(client.clone()),
            client,
        }
    }

    /// The profile hanging off this lead, if any.
    pub async fn profile(&self, lead: &Lead) -> Result<Option<Profile>, LeadTreeError> {
        let q = query("MATCH (p:Profile)-[:HAS_LEAD]->(:Lead { id: $id }) RETURN p LIMIT 1")
            .param("id", lead.id.to_string());
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            if let Some(profile) = row_to_profile(&row) {
                return Ok(Some(profile));
            }
        }
        Ok(None)
    }

    /// The user who owns this lead.
    pub async fn user(&self, lead: &Lead) -> Result<Option<User>, LeadTreeError> {
        let q = query("MATCH (u:User)-[:HAS_LEAD]->(:Lead { id: $id }) RETURN u LIMIT 1")
            .param("id", lead.id.to_string());
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            if let Some(user) = row_to_user(&row) {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    /// Direct parent lead.
    pub async fn parent(&self, lead: &Lead) -> Result<Option<Lead>, LeadTreeError> {
        self.store.get_parent(lead.id).await
    }

    /// Ancestors at any depth, excluding leads the viewer owns.
    pub async fn parents(
        &self,
        lead: &Lead,
        viewer: Uuid,
    ) -> Result<Vec<LeadAtDepth>, LeadTreeError> {
        self.store.find_parents(lead.id, viewer).await
    }

    /// Children created through invitations.
    pub async fn invited(&self, lead: &Lead) -> Result<Vec<Lead>, LeadTreeError> {
        self.store
            .get_children_by_source(lead.id, LeadSource::Invitation)
            .await
    }

    /// Events under this lead, optionally filtered by type.
    pub async fn events(
        &self,
        lead: &Lead,
        of_type: Option<EventKind>,
    ) -> Result<Vec<EventRecord>, LeadTreeError> {
        match of_type {
            Some(kind) => self.events.events_for_lead_of_type(lead.id, kind).await,
            None => self.events.events_for_lead(lead.id).await,
        }
    }
}

fn row_to_user(row: &neo4rs::Row) -> Option<User> {
    let n: neo4rs::Node = row.get("u").ok()?;
    let id_str: String = n.get("id").ok()?;
    let id = Uuid::parse_str(&id_str).ok()?;
    Some(User { id })
}

fn row_to_profile(row: &neo4rs::Row) -> Option<Profile> {
    let n: neo4rs::Node = row.get("p").ok()?;
    let id_str: String = n.get("id").ok()?;
    let id = Uuid::parse_str(&id_str).ok()?;
    Some(Profile { id })
}
