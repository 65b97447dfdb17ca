//! Integration tests for the redirect flow and its notifications.
//!
//! Requirements: Docker (for Neo4j via testcontainers)
//!
//! Run with: cargo test -p leadtree-graph --features test-utils --test redirect_test

#![cfg(feature = "test-utils")]

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use leadtree_common::{EventKind, LeadSource, LeadTreeError, NewLead, User};
use leadtree_graph::{
    query, EventLog, GraphClient, LeadStore, RedirectResolver,
};

async fn setup() -> (impl std::any::Any, GraphClient) {
    leadtree_graph::testutil::neo4j_container().await
}

async fn create_user(client: &GraphClient, id: Uuid) {
    let q = query("MERGE (u:User { id: $id })").param("id", id.to_string());
    client.inner().run(q).await.expect("Failed to create user");
}

async fn create_root_lead(client: &GraphClient, id: Uuid, hash: &str, owner: Uuid) {
    let q = query(
        "MATCH (u:User { id: $owner })
         CREATE (a:Lead {
             id: $id,
             created_at: $created_at,
             hash: $hash,
             source: 'unknown',
             motivation: '',
             status: '',
             color: '#aabbcc'
         })
         CREATE (u)-[:HAS_LEAD]->(a)",
    )
    .param("owner", owner.to_string())
    .param("id", id.to_string())
    .param("created_at", Utc::now().to_rfc3339())
    .param("hash", hash);
    client
        .inner()
        .run(q)
        .await
        .expect("Failed to create root lead");
}

/// Give fire-and-forget notification tasks time to land.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(500)).await;
}

#[tokio::test]
async fn redirect_creates_a_lead_under_the_hash_target() {
    let (_container, client) = setup().await;
    let resolver = RedirectResolver::new(client.clone());

    let owner = Uuid::new_v4();
    let root = Uuid::new_v4();
    create_user(&client, owner).await;
    create_root_lead(&client, root, "abc", owner).await;

    let lead = resolver
        .redirect("abc", "session-u2", None)
        .await
        .expect("redirect failed");

    // Inherits the shareable hash so the link can be re-shared onward.
    assert_eq!(lead.hash, "abc");
    assert_eq!(lead.status.as_deref(), Some("redirected"));
    assert_ne!(lead.id, root);

    let parent = resolver
        .store()
        .get_parent(lead.id)
        .await
        .expect("get_parent failed")
        .expect("redirected lead has no parent");
    assert_eq!(parent.id, root);
}

#[tokio::test]
async fn redirect_is_idempotent_per_user_and_hash() {
    let (_container, client) = setup().await;
    let resolver = RedirectResolver::new(client.clone());

    let owner = Uuid::new_v4();
    let root = Uuid::new_v4();
    create_user(&client, owner).await;
    create_root_lead(&client, root, "abc", owner).await;

    let first = resolver
        .redirect("abc", "session-u2", None)
        .await
        .expect("first redirect failed");
    let second = resolver
        .redirect("abc", "session-u2", None)
        .await
        .expect("second redirect failed");

    assert_eq!(first.id, second.id, "second redeem created a duplicate");

    // Still one lead under the root.
    let children = resolver
        .store()
        .get_leads()
        .await
        .expect("get_leads failed");
    assert_eq!(children.len(), 1);
}

#[tokio::test]
async fn redirect_accepts_a_supplied_user() {
    let (_container, client) = setup().await;
    let resolver = RedirectResolver::new(client.clone());

    let owner = Uuid::new_v4();
    let existing = Uuid::new_v4();
    let root = Uuid::new_v4();
    create_user(&client, owner).await;
    create_user(&client, existing).await;
    create_root_lead(&client, root, "abc", owner).await;

    let user = User { id: existing };
    let lead = resolver
        .redirect("abc", "ignored-session", Some(user.clone()))
        .await
        .expect("redirect failed");

    let owned = resolver
        .store()
        .find_leads_for_user(existing)
        .await
        .expect("find_leads_for_user failed");
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, lead.id);

    // Same supplied user again: same lead.
    let again = resolver
        .redirect("abc", "other-session", Some(user))
        .await
        .expect("redirect failed");
    assert_eq!(again.id, lead.id);
}

#[tokio::test]
async fn redirect_fails_for_an_unknown_hash() {
    let (_container, client) = setup().await;
    let resolver = RedirectResolver::new(client.clone());

    let err = resolver
        .redirect("nope", "session", None)
        .await
        .expect_err("redirect for unknown hash succeeded");
    assert!(matches!(err, LeadTreeError::NotFound { .. }));
}

#[tokio::test]
async fn default_creation_records_a_profile_view() {
    let (_container, client) = setup().await;
    let store = LeadStore::new(client.clone());
    let events = EventLog::new(client.clone());

    let owner = Uuid::new_v4();
    let redeemer = Uuid::new_v4();
    let root = Uuid::new_v4();
    create_user(&client, owner).await;
    create_user(&client, redeemer).await;
    create_root_lead(&client, root, "abc", owner).await;

    let lead = store
        .create_lead(root, redeemer, NewLead::default())
        .await
        .expect("create_lead failed");
    settle().await;

    let recorded = events
        .events_for_lead(lead.id)
        .await
        .expect("events_for_lead failed");
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].kind, EventKind::ViewedProfile);
}

#[tokio::test]
async fn invitation_rewards_the_inviting_lead() {
    let (_container, client) = setup().await;
    let store = LeadStore::new(client.clone());
    let events = EventLog::new(client.clone());

    let owner = Uuid::new_v4();
    let invited_user = Uuid::new_v4();
    let root = Uuid::new_v4();
    create_user(&client, owner).await;
    create_user(&client, invited_user).await;
    create_root_lead(&client, root, "abc", owner).await;

    let lead = store
        .create_lead(
            root,
            invited_user,
            NewLead {
                source: LeadSource::Invitation,
                ..Default::default()
            },
        )
        .await
        .expect("create_lead failed");
    settle().await;

    // The parent lead carries the invited-friend event, not the new lead.
    let on_parent = events
        .events_for_lead_of_type(root, EventKind::InvitedFriend)
        .await
        .expect("events_for_lead_of_type failed");
    assert_eq!(on_parent.len(), 1);
    assert!(events
        .events_for_lead(lead.id)
        .await
        .expect("events_for_lead failed")
        .is_empty());

    // Reward links: parent received it, the new lead caused it.
    let q = query("MATCH (r:Reward) RETURN r.id AS id");
    let mut stream = client.inner().execute(q).await.expect("reward query failed");
    let row = stream
        .next()
        .await
        .expect("reward stream failed")
        .expect("no reward granted");
    let reward_id: String = row.get("id").expect("reward id missing");
    let reward = Uuid::parse_str(&reward_id).expect("reward id not a uuid");

    let received = store
        .get_lead_by_reward(reward)
        .await
        .expect("get_lead_by_reward failed")
        .expect("no receiving lead");
    assert_eq!(received.id, root);

    let caused = store
        .get_lead_that_caused_reward(reward)
        .await
        .expect("get_lead_that_caused_reward failed")
        .expect("no causing lead");
    assert_eq!(caused.id, lead.id);

    // And the event reverse lookup resolves to the parent lead.
    let via_event = store
        .get_lead_by_event(on_parent[0].id)
        .await
        .expect("get_lead_by_event failed")
        .expect("event's lead not found");
    assert_eq!(via_event.id, root);
}
