use async_trait::async_trait;
use neo4rs::query;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use leadtree_common::{Lead, LeadTreeError, NewLead, User};

use crate::store::LeadStore;
use crate::GraphClient;

/// Status stamped on leads created through a redirect.
const REDIRECTED_STATUS: &str = "redirected";

/// Identity collaborator: turns a session token into a user.
#[async_trait]
pub trait Identity: Send + Sync {
    async fn create_user_from_session(&self, token: &str) -> Result<User, LeadTreeError>;
}

/// Graph-backed identity. Derives a deterministic user id from the
/// session token and MERGEs the User node, so repeated calls for the same
/// session always yield the same user.
#[derive(Clone)]
pub struct GraphIdentity {
    client: GraphClient,
}

impl GraphIdentity {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Identity for GraphIdentity {
    async fn create_user_from_session(&self, token: &str) -> Result<User, LeadTreeError> {
        let id = user_id_for_session(token);

        let q = query("MERGE (u:User { id: $id }) RETURN u").param("id", id.to_string());
        let mut stream = self.client.graph.execute(q).await?;
        while stream.next().await?.is_some() {}

        Ok(User { id })
    }
}

/// Deterministic uuid from a session token: the first 16 bytes of its
/// sha256 digest.
pub fn user_id_for_session(token: &str) -> Uuid {
    let digest = Sha256::digest(token.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Resolves a shared hash into a lead for the resolving user, creating
/// one under the hash's target lead when the user has none yet.
pub struct RedirectResolver<I: Identity = GraphIdentity> {
    store: LeadStore,
    identity: I,
}

impl RedirectResolver<GraphIdentity> {
    /// Wire the resolver with the graph-backed identity over the same
    /// connection as the store.
    pub fn new(client: GraphClient) -> Self {
        Self {
            store: LeadStore::new(client.clone()),
            identity: GraphIdentity::new(client),
        }
    }
}

impl<I: Identity> RedirectResolver<I> {
    pub fn with_identity(store: LeadStore, identity: I) -> Self {
        Self { store, identity }
    }

    /// Find or create the lead for (user, hash).
    ///
    /// Idempotent per (user, hash): redeeming the same hash twice for the
    /// same user returns the existing lead. The check-then-create is not
    /// atomic, so two concurrent redirects for the same pair can still
    /// race and create duplicate sibling leads.
    ///
    /// The new lead inherits the target's hash, so a redeemed link can be
    /// re-shared indefinitely down the tree. `NotFound` when the hash
    /// resolves to no lead.
    pub async fn redirect(
        &self,
        hash: &str,
        session_token: &str,
        existing_user: Option<User>,
    ) -> Result<Lead, LeadTreeError> {
        let user = match existing_user {
            Some(user) => user,
            None => {
                self.identity
                    .create_user_from_session(session_token)
                    .await?
            }
        };

        if let Some(lead) = self.store.find_lead_for_user_and_hash(user.id, hash).await? {
            info!(user = %user.id, hash, lead = %lead.id, "redirect hit existing lead");
            return Ok(lead);
        }

        let target = self
            .store
            .get_lead_by_hash(hash)
            .await?
            .ok_or_else(|| LeadTreeError::not_found("lead for hash", hash))?;

        self.store
            .create_lead(
                target.id,
                user.id,
                NewLead {
                    hash: Some(target.hash.clone()),
                    status: Some(REDIRECTED_STATUS.to_string()),
                    ..Default::default()
                },
            )
            .await
    }

    pub fn store(&self) -> &LeadStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_user_ids_are_deterministic() {
        assert_eq!(
            user_id_for_session("session-a"),
            user_id_for_session("session-a")
        );
        assert_ne!(
            user_id_for_session("session-a"),
            user_id_for_session("session-b")
        );
    }
}
