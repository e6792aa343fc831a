//! GraphProfileRepository: profile/follow operations over a labeled graph store.

use social_types::{
    CreatedProfile, GraphDirection, GraphNode, GraphStore, GraphStoreError, Profile,
    ProfileAggregate,
    ProfileError, ProfileRepository,
};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Node label for profiles.
pub const PROFILE_LABEL: &str = "SocialProfile";
/// Edge type for `follower -> followed`.
pub const FOLLOWS: &str = "FOLLOWS";

/// Cap applied to username searches when the caller gives no limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 100;
/// Deadline for a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

const USER_ID_PROPERTY: &str = "userId";
const USERNAME_PROPERTY: &str = "username";

/// Profile repository backed by any [`GraphStore`].
///
/// Holds no mutable state of its own; every call is one store session bounded by the store
/// timeout. A call that outlives it is dropped, which releases its session, and surfaces as
/// `StoreUnavailable`. Nothing is retried here.
pub struct GraphProfileRepository<G> {
    pub(crate) graph: G,
    store_timeout: Duration,
    search_limit: usize,
}

impl<G> GraphProfileRepository<G>
where
    G: GraphStore + Send + Sync,
{
    pub fn new(graph: G) -> Self {
        Self {
            graph,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    /// Run one store call under the deadline; store failures are logged here and nowhere else.
    async fn bounded<T, F>(&self, op: &'static str, call: F) -> Result<T, ProfileError>
    where
        F: Future<Output = Result<T, GraphStoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e @ GraphStoreError::NodeNotFound { .. })) => {
                tracing::debug!(op, error = %e, "profile missing");
                Err(e.into())
            }
            Ok(Err(e)) => {
                tracing::warn!(op, error = %e, "graph store call failed");
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(
                    op,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "graph store call exceeded deadline"
                );
                Err(ProfileError::StoreUnavailable(format!(
                    "{} exceeded deadline of {:?}",
                    op, self.store_timeout
                )))
            }
        }
    }

    fn decode_profiles(nodes: Vec<GraphNode>) -> Result<Vec<Profile>, ProfileError> {
        nodes.iter().map(decode_profile).collect()
    }

    fn positive_limit(limit: i64, what: &str) -> Result<usize, ProfileError> {
        if limit <= 0 {
            return Err(ProfileError::InvalidArgument(format!(
                "{} must be positive, got {}",
                what, limit
            )));
        }
        Ok(usize::try_from(limit).unwrap_or(usize::MAX))
    }
}

/// Map a stored node to a profile. The key is the user id; `username` must be a string and a
/// stored `userId` property, when present, must agree with the key.
fn decode_profile(node: &GraphNode) -> Result<Profile, ProfileError> {
    let mismatch = |detail: String| {
        tracing::warn!(label = %node.label, key = node.key, %detail, "profile schema mismatch");
        ProfileError::Store(format!(
            "schema mismatch for {}({}): {}",
            node.label, node.key, detail
        ))
    };

    if let Some(stored) = node.properties.get(USER_ID_PROPERTY) {
        if stored.as_i64() != Some(node.key) {
            return Err(mismatch(format!("{} is {}", USER_ID_PROPERTY, stored)));
        }
    }
    let username = node
        .str_property(USERNAME_PROPERTY)
        .ok_or_else(|| mismatch(format!("missing string property {}", USERNAME_PROPERTY)))?;

    Ok(Profile {
        user_id: node.key,
        username: username.to_string(),
    })
}

#[async_trait::async_trait]
impl<G> ProfileRepository for GraphProfileRepository<G>
where
    G: GraphStore + Send + Sync,
{
    async fn create_profile(&self, profile: &Profile) -> Result<CreatedProfile, ProfileError> {
        if profile.username.trim().is_empty() {
            return Err(ProfileError::InvalidArgument(
                "username must not be empty".to_string(),
            ));
        }
        let mut properties = HashMap::new();
        properties.insert(
            USER_ID_PROPERTY.to_string(),
            serde_json::Value::from(profile.user_id),
        );
        properties.insert(
            USERNAME_PROPERTY.to_string(),
            serde_json::Value::String(profile.username.clone()),
        );

        let created = self
            .bounded(
                "create_profile",
                self.graph
                    .merge_node(PROFILE_LABEL, profile.user_id, &properties),
            )
            .await?;
        if created {
            tracing::info!(user_id = profile.user_id, username = %profile.username, "profile created");
            return Ok(CreatedProfile {
                profile: profile.clone(),
                created,
            });
        }

        tracing::debug!(user_id = profile.user_id, "profile already exists");
        let stored = self
            .bounded(
                "create_profile",
                self.graph.get_node(PROFILE_LABEL, profile.user_id),
            )
            .await?
            .ok_or_else(|| ProfileError::NotFound(format!("profile {}", profile.user_id)))?;
        Ok(CreatedProfile {
            profile: decode_profile(&stored)?,
            created,
        })
    }

    async fn get_all_profiles(&self, limit: i64) -> Result<Vec<Profile>, ProfileError> {
        let limit = Self::positive_limit(limit, "limit")?;
        let nodes = self
            .bounded(
                "get_all_profiles",
                self.graph.list_nodes(PROFILE_LABEL, limit),
            )
            .await?;
        Self::decode_profiles(nodes)
    }

    async fn get_profile_aggregate(&self, user_id: i64) -> Result<ProfileAggregate, ProfileError> {
        let hood = self
            .bounded(
                "get_profile_aggregate",
                self.graph.get_neighborhood(PROFILE_LABEL, user_id, FOLLOWS),
            )
            .await?
            .ok_or_else(|| ProfileError::NotFound(format!("profile {}", user_id)))?;

        Ok(ProfileAggregate {
            profile: decode_profile(&hood.node)?,
            followers: Self::decode_profiles(hood.inbound)?,
            following: Self::decode_profiles(hood.outbound)?,
        })
    }

    async fn get_followers(&self, user_id: i64) -> Result<Vec<Profile>, ProfileError> {
        let nodes = self
            .bounded(
                "get_followers",
                self.graph
                    .get_neighbors(PROFILE_LABEL, user_id, FOLLOWS, GraphDirection::Inbound),
            )
            .await?;
        Self::decode_profiles(nodes)
    }

    async fn get_following(&self, user_id: i64) -> Result<Vec<Profile>, ProfileError> {
        let nodes = self
            .bounded(
                "get_following",
                self.graph
                    .get_neighbors(PROFILE_LABEL, user_id, FOLLOWS, GraphDirection::Outbound),
            )
            .await?;
        Self::decode_profiles(nodes)
    }

    async fn follow(&self, user_id: i64, follower_id: i64) -> Result<(), ProfileError> {
        if user_id == follower_id {
            return Err(ProfileError::InvalidArgument(format!(
                "profile {} cannot follow itself",
                user_id
            )));
        }
        let created = self
            .bounded(
                "follow",
                self.graph
                    .merge_edge(PROFILE_LABEL, follower_id, user_id, FOLLOWS),
            )
            .await?;
        if created {
            tracing::info!(user_id, follower_id, "follow created");
        }
        Ok(())
    }

    async fn unfollow(&self, user_id: i64, follower_id: i64) -> Result<(), ProfileError> {
        let removed = self
            .bounded(
                "unfollow",
                self.graph
                    .delete_edge(PROFILE_LABEL, follower_id, user_id, FOLLOWS),
            )
            .await?;
        if removed {
            tracing::info!(user_id, follower_id, "follow removed");
        }
        Ok(())
    }

    async fn search_by_username(
        &self,
        substring: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Profile>, ProfileError> {
        let limit = match limit {
            Some(l) => Self::positive_limit(l, "search limit")?,
            None => self.search_limit,
        };
        let nodes = self
            .bounded(
                "search_by_username",
                self.graph
                    .search_nodes(PROFILE_LABEL, USERNAME_PROPERTY, substring, limit),
            )
            .await?;
        Self::decode_profiles(nodes)
    }

    async fn check_connection(&self) -> Result<(), ProfileError> {
        self.bounded("check_connection", self.graph.ping()).await
    }
}
