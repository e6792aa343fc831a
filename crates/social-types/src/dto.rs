//! Domain entities and request/response DTOs for the profile API.

use serde::{Deserialize, Serialize};

/// A user's identity record in the social graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: i64,
    pub username: String,
}

impl Profile {
    pub fn new(user_id: i64, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }
}

/// Outcome of a create: the profile as stored, and whether this call inserted it.
///
/// When the `user_id` already existed, `profile` is the existing record, not the submitted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedProfile {
    pub profile: Profile,
    pub created: bool,
}

/// Derived read-only view: a profile plus its current followers and following sets.
///
/// Serializes flat (`userId`, `username`, `followers`, `following`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileAggregate {
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(default)]
    pub followers: Vec<Profile>,
    #[serde(default)]
    pub following: Vec<Profile>,
}

/// `follower_id` starts following `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub user_id: i64,
    pub follower_id: i64,
}

/// Undo of a [`FollowRequest`]: `followed_id` stops following `user_id`.
///
/// Fields are positional with `FollowRequest`, so echoing `{userId, followerId}` back as
/// `{userId, followedId}` removes the same edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnfollowRequest {
    pub user_id: i64,
    pub followed_id: i64,
}

/// Username substring search. An empty `username` matches every profile up to the limit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Response envelope shared by every endpoint. `code` mirrors the HTTP status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "default_code")]
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn default_code() -> u16 {
    200
}

impl<T> ApiResponse<T> {
    pub fn success(code: u16, data: T) -> Self {
        Self {
            code,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    /// Envelope without data: errors, and writes that return nothing.
    pub fn empty(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(code: u16, message: impl Into<String>) -> Self {
        Self::empty(code, message)
    }
}
