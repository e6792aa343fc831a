//! Axum server and routes.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use social_types::{
    ApiResponse, FollowRequest, Profile, ProfileAggregate, ProfileError, ProfileRepository,
    SearchRequest, UnfollowRequest,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Limit used by `GET /profiles` when the query omits one.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

pub struct AppState {
    pub repo: Arc<dyn ProfileRepository + Send + Sync>,
}

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/profiles", post(handle_create).get(handle_list))
        .route("/profiles/search", get(handle_search))
        .route("/profile/:user_id", get(handle_aggregate))
        .route("/profiles/followers/:user_id", get(handle_followers))
        .route("/profiles/following/:user_id", get(handle_following))
        .route("/profiles/recommend/:user_id", get(handle_recommend))
        .route("/profiles/follow", post(handle_follow))
        .route("/profiles/unfollow", post(handle_unfollow))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn reply<T>(status: StatusCode, data: T) -> Reply<T> {
    (status, Json(ApiResponse::success(status.as_u16(), data)))
}

fn bad_request<T>(message: impl Into<String>) -> Reply<T> {
    let status = StatusCode::BAD_REQUEST;
    (status, Json(ApiResponse::failure(status.as_u16(), message)))
}

/// The only place repository errors become HTTP statuses.
fn error_reply<T>(e: ProfileError) -> Reply<T> {
    let status = match &e {
        ProfileError::NotFound(_) => StatusCode::NOT_FOUND,
        ProfileError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        ProfileError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ProfileError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::failure(status.as_u16(), e.to_string())))
}

fn respond<T>(status: StatusCode, result: Result<T, ProfileError>) -> Reply<T> {
    match result {
        Ok(data) => reply(status, data),
        Err(e) => error_reply(e),
    }
}

fn parse_user_id(raw: &str) -> Result<i64, String> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid userId: {:?}", raw))
}

async fn handle_create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Profile>, JsonRejection>,
) -> Reply<Profile> {
    let Json(profile) = match body {
        Ok(b) => b,
        Err(e) => return bad_request(e.body_text()),
    };
    match state.repo.create_profile(&profile).await {
        Ok(stored) if stored.created => reply(StatusCode::CREATED, stored.profile),
        Ok(stored) => {
            let mut res = ApiResponse::success(StatusCode::OK.as_u16(), stored.profile);
            res.message = "Profile already exists".to_string();
            (StatusCode::OK, Json(res))
        }
        Err(e) => error_reply(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

async fn handle_list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Reply<Vec<Profile>> {
    let Query(q) = match query {
        Ok(q) => q,
        Err(e) => return bad_request(e.body_text()),
    };
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    respond(StatusCode::OK, state.repo.get_all_profiles(limit).await)
}

async fn handle_search(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchRequest>, QueryRejection>,
) -> Reply<Vec<Profile>> {
    let Query(req) = match query {
        Ok(q) => q,
        Err(e) => return bad_request(e.body_text()),
    };
    respond(
        StatusCode::OK,
        state.repo.search_by_username(&req.username, req.limit).await,
    )
}

async fn handle_aggregate(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Reply<ProfileAggregate> {
    let user_id = match parse_user_id(&raw) {
        Ok(id) => id,
        Err(msg) => return bad_request(msg),
    };
    respond(StatusCode::OK, state.repo.get_profile_aggregate(user_id).await)
}

async fn handle_followers(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Reply<Vec<Profile>> {
    let user_id = match parse_user_id(&raw) {
        Ok(id) => id,
        Err(msg) => return bad_request(msg),
    };
    respond(StatusCode::OK, state.repo.get_followers(user_id).await)
}

async fn handle_following(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Reply<Vec<Profile>> {
    let user_id = match parse_user_id(&raw) {
        Ok(id) => id,
        Err(msg) => return bad_request(msg),
    };
    respond(StatusCode::OK, state.repo.get_following(user_id).await)
}

async fn handle_recommend(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Reply<Vec<Profile>> {
    let user_id = match parse_user_id(&raw) {
        Ok(id) => id,
        Err(msg) => return bad_request(msg),
    };
    respond(
        StatusCode::OK,
        social_profile::recommend(state.repo.as_ref(), user_id).await,
    )
}

async fn handle_follow(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FollowRequest>, JsonRejection>,
) -> Reply<()> {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => return bad_request(e.body_text()),
    };
    match state.repo.follow(req.user_id, req.follower_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::empty(StatusCode::OK.as_u16(), "Followed")),
        ),
        Err(e) => error_reply(e),
    }
}

async fn handle_unfollow(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UnfollowRequest>, JsonRejection>,
) -> Reply<()> {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => return bad_request(e.body_text()),
    };
    match state.repo.unfollow(req.user_id, req.followed_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::empty(StatusCode::OK.as_u16(), "Unfollowed")),
        ),
        Err(e) => error_reply(e),
    }
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Reply<()> {
    match state.repo.check_connection().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::empty(StatusCode::OK.as_u16(), "ok")),
        ),
        Err(e) => error_reply(e),
    }
}
