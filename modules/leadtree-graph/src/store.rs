use chrono::{DateTime, Utc};
use neo4rs::query;
use tracing::info;
use uuid::Uuid;

use leadtree_common::{
    ids, Lead, LeadAtDepth, LeadSource, LeadTreeError, NewLead,
};

use crate::notify::Notifier;
use crate::GraphClient;

/// Persistence for Lead nodes and their HAS_LEAD edges.
///
/// Leads form a forest: a parent Lead points at each child via HAS_LEAD,
/// and the owning User points at the lead through an edge of the same
/// type. All traversals run as Cypher against the injected client; rows
/// come back through explicit typed mappers, never reshaped dynamically.
#[derive(Clone)]
pub struct LeadStore {
    client: GraphClient,
    notifier: Notifier,
}

impl LeadStore {
    pub fn new(client: GraphClient) -> Self {
        let notifier = Notifier::new(client.clone());
        Self { client, notifier }
    }

    /// Create a lead under an existing parent lead, owned by an existing
    /// user. Node and both edges are written in a single statement, so a
    /// non-root lead never exists without its parent and owner.
    ///
    /// Fails with `NotFound` when the parent lead or the user is missing.
    /// On success a notification selected by the lead's source is
    /// dispatched fire-and-forget; its failure never affects the creation.
    pub async fn create_lead(
        &self,
        parent: Uuid,
        user: Uuid,
        attrs: NewLead,
    ) -> Result<Lead, LeadTreeError> {
        let id = attrs.id.unwrap_or_else(ids::new_id);
        let hash = attrs.hash.unwrap_or_else(ids::new_hash);
        let color = attrs.color.unwrap_or_else(ids::random_color);
        let created_at = Utc::now();

        let q = query(
            "MATCH (b:Lead { id: $parent })
             MATCH (c:User { id: $user })
             CREATE (a:Lead {
                 id: $id,
                 created_at: $created_at,
                 hash: $hash,
                 source: $source,
                 motivation: $motivation,
                 status: $status,
                 score: CASE WHEN $has_score THEN $score ELSE null END,
                 color: $color
             })
             CREATE (b)-[:HAS_LEAD]->(a)
             CREATE (c)-[:HAS_LEAD]->(a)
             RETURN a",
        )
        .param("parent", parent.to_string())
        .param("user", user.to_string())
        .param("id", id.to_string())
        .param("created_at", created_at.to_rfc3339())
        .param("hash", hash.as_str())
        .param("source", attrs.source.as_str())
        .param("motivation", attrs.motivation.unwrap_or_default())
        .param("status", attrs.status.unwrap_or_default())
        .param("has_score", attrs.score.is_some())
        .param("score", attrs.score.unwrap_or(0.0))
        .param("color", color.as_str());

        let mut stream = self.client.graph.execute(q).await?;
        let Some(row) = stream.next().await? else {
            // The MATCH found nothing, so nothing was created. Probe which
            // side is missing for a precise error.
            if self.get_lead(parent).await?.is_none() {
                return Err(LeadTreeError::not_found("parent lead", parent.to_string()));
            }
            return Err(LeadTreeError::not_found("user", user.to_string()));
        };
        let lead = row_to_lead(&row)
            .ok_or_else(|| LeadTreeError::not_found("created lead", id.to_string()))?;

        info!(lead = %lead.id, %parent, %user, source = %lead.source, "created lead");
        self.notifier.dispatch(lead.source, parent, lead.id);

        Ok(lead)
    }

    /// Point lookup by id. Absence is `None`, not an error.
    pub async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, LeadTreeError> {
        let q = query("MATCH (a:Lead { id: $id }) RETURN a").param("id", id.to_string());
        self.fetch_one(q).await
    }

    /// Point lookup by shareable hash.
    pub async fn get_lead_by_hash(&self, hash: &str) -> Result<Option<Lead>, LeadTreeError> {
        let q = query("MATCH (a:Lead { hash: $hash }) RETURN a").param("hash", hash);
        self.fetch_one(q).await
    }

    /// All non-root leads (leads attached under a parent lead).
    pub async fn get_leads(&self) -> Result<Vec<Lead>, LeadTreeError> {
        let q = query("MATCH (a:Lead)<-[:HAS_LEAD]-(:Lead) RETURN a");
        self.fetch_many(q).await
    }

    /// Leads directly owned by a user.
    pub async fn find_leads_for_user(&self, user: Uuid) -> Result<Vec<Lead>, LeadTreeError> {
        let q = query("MATCH (a:Lead)<-[:HAS_LEAD]-(:User { id: $id }) RETURN a")
            .param("id", user.to_string());
        self.fetch_many(q).await
    }

    /// Leads reachable at any depth along the lead chain of a profile,
    /// excluding leads owned by the profile's owner. Each match carries
    /// the maximum depth at which it was reached.
    pub async fn find_leads_for_profile(
        &self,
        profile: Uuid,
    ) -> Result<Vec<LeadAtDepth>, LeadTreeError> {
        let q = query(
            "MATCH (a:Lead)<-[r:HAS_LEAD*]-(:Profile { id: $id })<-[:HAS_PROFILE]-(owner:User)
             MATCH (a)<-[:HAS_LEAD]-(user:User)
             WHERE NOT user.id = owner.id
             WITH a, max(size(r)) AS depth
             RETURN a, depth",
        )
        .param("id", profile.to_string());
        self.fetch_many_at_depth(q).await
    }

    /// Ancestors of a lead at any depth, excluding leads owned by
    /// `exclude_user`. Depth is the longest ancestor path, so duplicate
    /// edges can never shorten a reported depth.
    pub async fn find_parents(
        &self,
        lead: Uuid,
        exclude_user: Uuid,
    ) -> Result<Vec<LeadAtDepth>, LeadTreeError> {
        let q = query(
            "MATCH (:Lead { id: $id })<-[r:HAS_LEAD*]-(a:Lead)<-[:HAS_LEAD]-(u:User)
             WHERE NOT u.id = $user
             WITH a, max(size(r)) AS depth
             RETURN a, depth",
        )
        .param("id", lead.to_string())
        .param("user", exclude_user.to_string());
        self.fetch_many_at_depth(q).await
    }

    /// Direct parent only.
    pub async fn get_parent(&self, id: Uuid) -> Result<Option<Lead>, LeadTreeError> {
        let q = query("MATCH (:Lead { id: $id })<-[:HAS_LEAD]-(a:Lead) RETURN a LIMIT 1")
            .param("id", id.to_string());
        self.fetch_one(q).await
    }

    /// Direct children filtered by their source attribute.
    pub async fn get_children_by_source(
        &self,
        id: Uuid,
        source: LeadSource,
    ) -> Result<Vec<Lead>, LeadTreeError> {
        let q = query(
            "MATCH (a:Lead { source: $source })<-[:HAS_LEAD]-(:Lead { id: $id }) RETURN a",
        )
        .param("id", id.to_string())
        .param("source", source.as_str());
        self.fetch_many(q).await
    }

    /// The lead owned by `user` that is tagged with `hash` directly, or
    /// descends from the lead tagged with `hash`. At most one match.
    pub async fn find_lead_for_user_and_hash(
        &self,
        user: Uuid,
        hash: &str,
    ) -> Result<Option<Lead>, LeadTreeError> {
        let q = query(
            "MATCH (u:User { id: $user })-[:HAS_LEAD]->(a:Lead)
             WHERE (a)<-[:HAS_LEAD*]-(:Lead { hash: $hash })
                OR a.hash = $hash
             RETURN a LIMIT 1",
        )
        .param("user", user.to_string())
        .param("hash", hash);
        self.fetch_one(q).await
    }

    /// The lead a profile hangs off.
    pub async fn find_lead_by_profile(
        &self,
        profile: Uuid,
    ) -> Result<Option<Lead>, LeadTreeError> {
        let q = query("MATCH (a:Lead)<-[:HAS_LEAD]-(:Profile { id: $id }) RETURN a LIMIT 1")
            .param("id", profile.to_string());
        self.fetch_one(q).await
    }

    /// Reverse lookup: the lead an event was recorded under.
    pub async fn get_lead_by_event(&self, event: Uuid) -> Result<Option<Lead>, LeadTreeError> {
        let q = query("MATCH (a:Lead)-[:HAS_EVENT]->(:Event { id: $id }) RETURN a LIMIT 1")
            .param("id", event.to_string());
        self.fetch_one(q).await
    }

    /// Reverse lookup: the lead that benefited from a reward.
    pub async fn get_lead_by_reward(&self, reward: Uuid) -> Result<Option<Lead>, LeadTreeError> {
        let q = query("MATCH (a:Lead)-[:RECEIVED_REWARD]->(:Reward { id: $id }) RETURN a LIMIT 1")
            .param("id", reward.to_string());
        self.fetch_one(q).await
    }

    /// Reverse lookup: the lead whose action triggered a reward.
    pub async fn get_lead_that_caused_reward(
        &self,
        reward: Uuid,
    ) -> Result<Option<Lead>, LeadTreeError> {
        let q = query("MATCH (a:Lead)-[:CAUSED_REWARD]->(:Reward { id: $id }) RETURN a LIMIT 1")
            .param("id", reward.to_string());
        self.fetch_one(q).await
    }

    async fn fetch_one(&self, q: neo4rs::Query) -> Result<Option<Lead>, LeadTreeError> {
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            if let Some(lead) = row_to_lead(&row) {
                return Ok(Some(lead));
            }
        }
        Ok(None)
    }

    async fn fetch_many(&self, q: neo4rs::Query) -> Result<Vec<Lead>, LeadTreeError> {
        let mut stream = self.client.graph.execute(q).await?;
        let mut leads = Vec::new();
        while let Some(row) = stream.next().await? {
            if let Some(lead) = row_to_lead(&row) {
                leads.push(lead);
            }
        }
        Ok(leads)
    }

    async fn fetch_many_at_depth(
        &self,
        q: neo4rs::Query,
    ) -> Result<Vec<LeadAtDepth>, LeadTreeError> {
        let mut stream = self.client.graph.execute(q).await?;
        let mut leads = Vec::new();
        while let Some(row) = stream.next().await? {
            if let Some(lead) = row_to_lead_at_depth(&row) {
                leads.push(lead);
            }
        }
        Ok(leads)
    }
}

/// Map a row's `a` column to a typed Lead. Rows without a well-formed
/// lead node are skipped rather than failing the whole read.
pub fn row_to_lead(row: &neo4rs::Row) -> Option<Lead> {
    let n: neo4rs::Node = row.get("a").ok()?;

    let id_str: String = n.get("id").ok()?;
    let id = Uuid::parse_str(&id_str).ok()?;

    let hash: String = n.get("hash").unwrap_or_default();
    let source_str: String = n.get("source").unwrap_or_default();
    let motivation: String = n.get("motivation").unwrap_or_default();
    let status: String = n.get("status").unwrap_or_default();
    let score: Option<f64> = n.get("score").ok();
    let color: String = n.get("color").unwrap_or_default();

    Some(Lead {
        id,
        created_at: parse_datetime_prop(&n, "created_at"),
        hash,
        source: LeadSource::parse(&source_str),
        motivation: if motivation.is_empty() {
            None
        } else {
            Some(motivation)
        },
        status: if status.is_empty() {
            None
        } else {
            Some(status)
        },
        score,
        color,
    })
}

fn row_to_lead_at_depth(row: &neo4rs::Row) -> Option<LeadAtDepth> {
    let lead = row_to_lead(row)?;
    let depth: i64 = row.get("depth").unwrap_or(0);
    Some(LeadAtDepth {
        lead,
        depth: depth.max(0) as u32,
    })
}

pub(crate) fn parse_datetime_prop(n: &neo4rs::Node, prop: &str) -> DateTime<Utc> {
    // Stored as RFC3339 strings by the writers in this crate.
    if let Ok(s) = n.get::<String>(prop) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
            return dt.with_timezone(&Utc);
        }
    }
    Utc::now()
}
