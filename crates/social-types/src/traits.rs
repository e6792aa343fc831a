//! Traits for the profile repository and graph storage backends.

use crate::{
    CreatedProfile, GraphDirection, GraphNode, NodeNeighborhood, Profile, ProfileAggregate,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Graph store abstraction: labeled nodes with an integer identity key and typed, directed edges.
///
/// Every method is one logical session. Writes are atomic: the existence check and the write of a
/// merge happen under the same transaction, so repeated merges never create duplicates.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create the node if `(label, key)` is absent. An existing node is left untouched.
    /// Returns `true` when a node was created.
    async fn merge_node(
        &self,
        label: &str,
        key: i64,
        properties: &HashMap<String, serde_json::Value>,
    ) -> Result<bool, GraphStoreError>;

    /// Get one node by identity.
    async fn get_node(&self, label: &str, key: i64) -> Result<Option<GraphNode>, GraphStoreError>;

    /// Up to `limit` nodes carrying `label`. Order is store-defined.
    async fn list_nodes(&self, label: &str, limit: usize) -> Result<Vec<GraphNode>, GraphStoreError>;

    /// Nodes whose string `property` contains `needle`, ignoring case. An empty needle matches all.
    async fn search_nodes(
        &self,
        label: &str,
        property: &str,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<GraphNode>, GraphStoreError>;

    /// Create edge `from -[relation]-> to` if absent. Fails with `NodeNotFound` when either
    /// endpoint is missing. Returns `true` when an edge was created.
    async fn merge_edge(
        &self,
        label: &str,
        from: i64,
        to: i64,
        relation: &str,
    ) -> Result<bool, GraphStoreError>;

    /// Delete edge `from -[relation]-> to`. Returns `true` when an edge was removed.
    async fn delete_edge(
        &self,
        label: &str,
        from: i64,
        to: i64,
        relation: &str,
    ) -> Result<bool, GraphStoreError>;

    /// Distinct nodes one hop away. Empty when the node has no such edges or does not exist.
    async fn get_neighbors(
        &self,
        label: &str,
        key: i64,
        relation: &str,
        direction: GraphDirection,
    ) -> Result<Vec<GraphNode>, GraphStoreError>;

    /// The node plus its distinct inbound and outbound neighbors, read in one session.
    async fn get_neighborhood(
        &self,
        label: &str,
        key: i64,
        relation: &str,
    ) -> Result<Option<NodeNeighborhood>, GraphStoreError>;

    /// Verify the store is reachable.
    async fn ping(&self) -> Result<(), GraphStoreError>;
}

/// Typed repository contract over the social graph.
///
/// List results are ordered by `user_id`; callers should not rely on any other ordering.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Insert a profile. A duplicate `user_id` refers to the same entity and is a no-op; the
    /// stored profile is returned either way.
    async fn create_profile(&self, profile: &Profile) -> Result<CreatedProfile, ProfileError>;

    /// Up to `limit` profiles. `limit <= 0` is `InvalidArgument`.
    async fn get_all_profiles(&self, limit: i64) -> Result<Vec<Profile>, ProfileError>;

    /// Profile plus deduplicated followers/following. `NotFound` if the profile is absent.
    async fn get_profile_aggregate(&self, user_id: i64) -> Result<ProfileAggregate, ProfileError>;

    /// Profiles following `user_id`. Empty, not `NotFound`, when there are none.
    async fn get_followers(&self, user_id: i64) -> Result<Vec<Profile>, ProfileError>;

    /// Profiles `user_id` follows. Empty, not `NotFound`, when there are none.
    async fn get_following(&self, user_id: i64) -> Result<Vec<Profile>, ProfileError>;

    /// `follower_id` follows `user_id`. Idempotent.
    async fn follow(&self, user_id: i64, follower_id: i64) -> Result<(), ProfileError>;

    /// `follower_id` stops following `user_id`. Succeeds when no edge exists.
    async fn unfollow(&self, user_id: i64, follower_id: i64) -> Result<(), ProfileError>;

    /// Case-insensitive substring match on username, capped at `limit` (or the repository default).
    async fn search_by_username(
        &self,
        substring: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Profile>, ProfileError>;

    /// Verify the backing store is reachable.
    async fn check_connection(&self) -> Result<(), ProfileError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GraphStoreError {
    #[error("graph store unavailable: {0}")]
    Unavailable(String),
    #[error("node not found: {label}({key})")]
    NodeNotFound { label: String, key: i64 },
    #[error("graph store decode error: {0}")]
    Decode(String),
    #[error("graph store error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("store error: {0}")]
    Store(String),
}

impl From<GraphStoreError> for ProfileError {
    fn from(e: GraphStoreError) -> Self {
        match e {
            GraphStoreError::Unavailable(msg) => ProfileError::StoreUnavailable(msg),
            GraphStoreError::NodeNotFound { label, key } => {
                ProfileError::NotFound(format!("{}({})", label, key))
            }
            e @ (GraphStoreError::Decode(_) | GraphStoreError::Other(_)) => {
                ProfileError::Store(e.to_string())
            }
        }
    }
}
