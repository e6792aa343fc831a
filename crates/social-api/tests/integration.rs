//! Integration tests: create/list, follow/unfollow, aggregate, recommend, search, errors.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use social_api::server::{self, AppState};
use social_graph::InMemoryGraphStore;
use social_profile::{
    CreatedProfile, GraphProfileRepository, Profile, ProfileAggregate, ProfileError,
    ProfileRepository,
};
use std::sync::Arc;
use tower::util::ServiceExt;

fn test_app() -> axum::Router {
    let repo: Arc<dyn ProfileRepository + Send + Sync> =
        Arc::new(GraphProfileRepository::new(InMemoryGraphStore::new()));
    server::router(Arc::new(AppState { repo }))
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    let j: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, j)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

async fn post(app: &axum::Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

async fn create(app: &axum::Router, user_id: i64, username: &str) {
    let (status, j) = post(app, "/profiles", json!({ "userId": user_id, "username": username })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(j["code"], 201);
}

fn user_ids(j: &serde_json::Value) -> Vec<i64> {
    j.as_array()
        .unwrap()
        .iter()
        .map(|p| p["userId"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn create_then_list() {
    let app = test_app();
    let (status, j) = post(&app, "/profiles", json!({ "userId": 2, "username": "bob" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(j["data"]["userId"], 2);
    assert_eq!(j["data"]["username"], "bob");
    create(&app, 1, "anna").await;

    let (status, j) = get(&app, "/profiles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["code"], 200);
    assert_eq!(user_ids(&j["data"]), vec![1, 2]);

    let (_, j) = get(&app, "/profiles?limit=1").await;
    assert_eq!(user_ids(&j["data"]), vec![1]);
}

#[tokio::test]
async fn follow_then_unfollow_updates_both_sides() {
    let app = test_app();
    create(&app, 1, "A").await;
    create(&app, 2, "B").await;

    // 1 follows 2.
    let (status, j) = post(&app, "/profiles/follow", json!({ "userId": 2, "followerId": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["code"], 200);
    // Following twice is idempotent.
    let (status, _) = post(&app, "/profiles/follow", json!({ "userId": 2, "followerId": 1 })).await;
    assert_eq!(status, StatusCode::OK);

    let (_, j) = get(&app, "/profiles/followers/2").await;
    assert_eq!(user_ids(&j["data"]), vec![1]);
    let (_, j) = get(&app, "/profiles/following/1").await;
    assert_eq!(user_ids(&j["data"]), vec![2]);

    let (status, j) = get(&app, "/profile/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["data"]["userId"], 2);
    assert_eq!(j["data"]["username"], "B");
    assert_eq!(user_ids(&j["data"]["followers"]), vec![1]);
    assert!(j["data"]["following"].as_array().unwrap().is_empty());

    // Same pair as the follow: 1 stops following 2.
    let (status, _) = post(&app, "/profiles/unfollow", json!({ "userId": 2, "followedId": 1 })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, j) = get(&app, "/profiles/followers/2").await;
    assert!(j["data"].as_array().unwrap().is_empty());
    let (_, j) = get(&app, "/profiles/following/1").await;
    assert!(j["data"].as_array().unwrap().is_empty());

    // Unfollowing again is a no-op.
    let (status, _) = post(&app, "/profiles/unfollow", json!({ "userId": 2, "followedId": 1 })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_profile_is_404_but_empty_lists_are_200() {
    let app = test_app();
    let (status, j) = get(&app, "/profile/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(j["code"], 404);
    assert!(j.get("data").is_none());

    create(&app, 7, "lonely").await;
    let (status, j) = get(&app, "/profiles/followers/7").await;
    assert_eq!(status, StatusCode::OK);
    assert!(j["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn follow_unknown_profile_is_404() {
    let app = test_app();
    create(&app, 1, "A").await;
    let (status, j) = post(&app, "/profiles/follow", json!({ "userId": 99, "followerId": 1 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(j["code"], 404);
}

#[tokio::test]
async fn recommend_second_degree() {
    let app = test_app();
    for (id, name) in [(1, "A"), (2, "B"), (3, "C"), (4, "D")] {
        create(&app, id, name).await;
    }
    // A -> B, B -> C, B -> D
    for (followed, follower) in [(2, 1), (3, 2), (4, 2)] {
        let (status, _) = post(
            &app,
            "/profiles/follow",
            json!({ "userId": followed, "followerId": follower }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, j) = get(&app, "/profiles/recommend/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user_ids(&j["data"]), vec![3, 4]);
    assert_eq!(j["data"][0]["username"], "C");

    let (_, j) = get(&app, "/profiles/recommend/4").await;
    assert!(j["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn search_is_case_insensitive_substring() {
    let app = test_app();
    create(&app, 1, "Anna").await;
    create(&app, 2, "joanne").await;
    create(&app, 3, "bob").await;

    let (status, j) = get(&app, "/profiles/search?username=ann").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user_ids(&j["data"]), vec![1, 2]);

    let (_, j) = get(&app, "/profiles/search?username=ANN&limit=1").await;
    assert_eq!(user_ids(&j["data"]), vec![1]);

    let (_, j) = get(&app, "/profiles/search?username=zed").await;
    assert!(j["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_input_is_400() {
    let app = test_app();
    create(&app, 1, "A").await;

    let (status, j) = post(&app, "/profiles/follow", json!({ "userId": 1, "followerId": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(j["code"], 400);

    let (status, j) = get(&app, "/profile/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(j["code"], 400);

    let (status, _) = get(&app, "/profiles?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/profiles", json!({ "userId": 5, "username": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("POST")
        .uri("/profiles")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, j) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(j["code"], 400);
}

#[tokio::test]
async fn duplicate_create_keeps_first_username() {
    let app = test_app();
    create(&app, 1, "first").await;
    let (status, j) = post(&app, "/profiles", json!({ "userId": 1, "username": "second" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["code"], 200);
    assert_eq!(j["message"], "Profile already exists");
    assert_eq!(j["data"]["username"], "first");

    let (_, j) = get(&app, "/profiles").await;
    assert_eq!(user_ids(&j["data"]), vec![1]);
    assert_eq!(j["data"][0]["username"], "first");
}

#[tokio::test]
async fn health_ok() {
    let app = test_app();
    let (status, j) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(j["code"], 200);
}

#[tokio::test]
async fn reversed_unfollow_pair_leaves_edge() {
    let app = test_app();
    create(&app, 1, "A").await;
    create(&app, 2, "B").await;
    post(&app, "/profiles/follow", json!({ "userId": 2, "followerId": 1 })).await;

    let (status, _) = post(&app, "/profiles/unfollow", json!({ "userId": 1, "followedId": 2 })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, j) = get(&app, "/profiles/followers/2").await;
    assert_eq!(user_ids(&j["data"]), vec![1]);
}

/// Repository where every call fails with the same error.
struct BrokenRepository {
    error: fn(String) -> ProfileError,
}

impl BrokenRepository {
    fn fail<T>(&self, op: &str) -> Result<T, ProfileError> {
        Err((self.error)(format!("{} failed", op)))
    }
}

#[async_trait]
impl ProfileRepository for BrokenRepository {
    async fn create_profile(&self, _: &Profile) -> Result<CreatedProfile, ProfileError> {
        self.fail("create_profile")
    }
    async fn get_all_profiles(&self, _: i64) -> Result<Vec<Profile>, ProfileError> {
        self.fail("get_all_profiles")
    }
    async fn get_profile_aggregate(&self, _: i64) -> Result<ProfileAggregate, ProfileError> {
        self.fail("get_profile_aggregate")
    }
    async fn get_followers(&self, _: i64) -> Result<Vec<Profile>, ProfileError> {
        self.fail("get_followers")
    }
    async fn get_following(&self, _: i64) -> Result<Vec<Profile>, ProfileError> {
        self.fail("get_following")
    }
    async fn follow(&self, _: i64, _: i64) -> Result<(), ProfileError> {
        self.fail("follow")
    }
    async fn unfollow(&self, _: i64, _: i64) -> Result<(), ProfileError> {
        self.fail("unfollow")
    }
    async fn search_by_username(&self, _: &str, _: Option<i64>) -> Result<Vec<Profile>, ProfileError> {
        self.fail("search_by_username")
    }
    async fn check_connection(&self) -> Result<(), ProfileError> {
        self.fail("check_connection")
    }
}

fn broken_app(error: fn(String) -> ProfileError) -> axum::Router {
    let repo: Arc<dyn ProfileRepository + Send + Sync> = Arc::new(BrokenRepository { error });
    server::router(Arc::new(AppState { repo }))
}

#[tokio::test]
async fn unavailable_store_is_503() {
    let app = broken_app(ProfileError::StoreUnavailable);
    for uri in ["/profile/1", "/profiles/recommend/1", "/health"] {
        let (status, j) = get(&app, uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        assert_eq!(j["code"], 503, "{}", uri);
        assert!(j.get("data").is_none());
    }
    let (status, j) = post(&app, "/profiles/follow", json!({ "userId": 2, "followerId": 1 })).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(j["code"], 503);
}

#[tokio::test]
async fn store_failure_is_500() {
    let app = broken_app(ProfileError::Store);
    for uri in ["/profile/1", "/profiles/recommend/1", "/profiles/search?username=a", "/health"] {
        let (status, j) = get(&app, uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
        assert_eq!(j["code"], 500, "{}", uri);
    }
}
