//! HTTP surface: routes, request parsing, and JSON response shapes.
//!
//! Every error body is `{ "message": ... }` with a status code from
//! [`ApiError`]. Request bodies and responses use camelCase field names.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use swipe_core::{
    InteractionMetrics, InteractionType, MediaKind, MediaTypePreference, TagPreference,
    display_name,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::engine::{Engine, EngineError, SelectionRequest, Served};

// ---------------------------------------------------------------------------
// State and router
// ---------------------------------------------------------------------------

/// Request-size limits applied at the HTTP edge.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub default_batch_count: usize,
    pub max_batch_count: usize,
    pub default_page_limit: usize,
    pub max_page_limit: usize,
}

impl From<&Config> for Limits {
    fn from(config: &Config) -> Self {
        Self {
            default_batch_count: config.default_batch_count,
            max_batch_count: config.max_batch_count,
            default_page_limit: config.default_page_limit,
            max_page_limit: config.max_page_limit,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub limits: Limits,
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/characters", get(list_characters))
        .route("/api/characters/random", get(random_character))
        .route("/api/characters/random/batch", get(random_batch))
        .route("/api/users/preferences/interact", post(interact))
        .route("/api/users/{user_id}/preferences", get(user_preferences))
        .route("/api/health", get(health))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Allow-listed browser origins. Requests without an `Origin` header are not
/// subject to CORS and pass through.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin '{o}'");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    ServiceUnavailable(String),
    BadGateway(String),
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::CatalogUnavailable => ApiError::ServiceUnavailable(e.to_string()),
            EngineError::NoCandidates => ApiError::NotFound(e.to_string()),
            EngineError::MediaExhausted { .. } => ApiError::BadGateway(e.to_string()),
            EngineError::Invalid(msg) => ApiError::BadRequest(msg),
            EngineError::Store(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::BadGateway(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Internal(m) => {
                tracing::error!("internal error: {m}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct RandomParams {
    media_type: Option<String>,
    exclude_ids: Option<String>,
    blacklisted_tags: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchParams {
    count: Option<String>,
    media_type: Option<String>,
    exclude_ids: Option<String>,
    blacklisted_tags: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    page: Option<String>,
    limit: Option<String>,
    seed: Option<String>,
    media_type: Option<String>,
    exclude_ids: Option<String>,
    blacklisted_tags: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// Comma-separated list, trimmed, blanks dropped.
fn split_csv(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Positive integer, or `None` for anything missing or unparsable.
fn positive(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
}

fn selection_request(
    media_type: Option<&str>,
    exclude_ids: Option<&str>,
    blacklisted_tags: Option<&str>,
    user_id: Option<&str>,
) -> Result<SelectionRequest, ApiError> {
    let media_type = match media_type.map(str::trim) {
        Some(m) if !m.is_empty() => m
            .parse::<MediaTypePreference>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        _ => {
            return Err(ApiError::BadRequest(
                "Media type preference is required".to_string(),
            ));
        }
    };
    Ok(SelectionRequest {
        user_id: user_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        excluded: split_csv(exclude_ids),
        blacklisted: split_csv(blacklisted_tags),
        media_type,
    })
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterCard {
    pub name: String,
    pub original_tag: String,
    pub source_count: u64,
    pub image_url: Option<String>,
    pub file_type: MediaKind,
}

impl From<Served> for CharacterCard {
    fn from(served: Served) -> Self {
        let (image_url, file_type) = match served.media {
            Some(m) => (Some(m.url), m.kind),
            None => (None, MediaKind::Unknown),
        };
        Self {
            name: display_name(&served.entity.name),
            original_tag: served.entity.name,
            source_count: served.entity.post_count,
            image_url,
            file_type,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RandomResponse {
    character: CharacterCard,
    total_characters: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchResponse {
    characters: Vec<CharacterCard>,
    total_characters: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    characters: Vec<CharacterCard>,
    current_page: usize,
    total_pages: usize,
    total_characters_in_system: usize,
}

/// Stored record plus the derived averages.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreferenceView {
    #[serde(flatten)]
    record: TagPreference,
    avg_view_time: f64,
    avg_swipe_speed: f64,
    avg_session_swipe_count: f64,
    avg_action_streak_count: f64,
}

impl From<TagPreference> for PreferenceView {
    fn from(record: TagPreference) -> Self {
        Self {
            avg_view_time: record.avg_view_time(),
            avg_swipe_speed: record.avg_swipe_speed(),
            avg_session_swipe_count: record.avg_session_swipe_count(),
            avg_action_streak_count: record.avg_action_streak_count(),
            record,
        }
    }
}

#[derive(Debug, Serialize)]
struct InteractResponse {
    message: &'static str,
    preference: PreferenceView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AffinitiesResponse {
    user_id: String,
    affinities: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    catalog_size: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/characters
async fn list_characters(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let req = selection_request(
        params.media_type.as_deref(),
        params.exclude_ids.as_deref(),
        params.blacklisted_tags.as_deref(),
        params.user_id.as_deref(),
    )?;
    let page = positive(params.page.as_deref()).unwrap_or(1);
    let limit = positive(params.limit.as_deref())
        .unwrap_or(state.limits.default_page_limit)
        .min(state.limits.max_page_limit);
    let seed = params
        .seed
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or("default");

    let result = state.engine.list_characters(&req, seed, page, limit).await?;
    Ok(Json(ListResponse {
        characters: result.items.into_iter().map(CharacterCard::from).collect(),
        current_page: result.current_page,
        total_pages: result.total_pages,
        total_characters_in_system: result.total_in_system,
    }))
}

/// GET /api/characters/random
async fn random_character(
    State(state): State<AppState>,
    Query(params): Query<RandomParams>,
) -> Result<Json<RandomResponse>, ApiError> {
    let req = selection_request(
        params.media_type.as_deref(),
        params.exclude_ids.as_deref(),
        params.blacklisted_tags.as_deref(),
        params.user_id.as_deref(),
    )?;
    let (served, total) = state.engine.random_character(&req).await?;
    Ok(Json(RandomResponse {
        character: served.into(),
        total_characters: total,
    }))
}

/// GET /api/characters/random/batch
async fn random_batch(
    State(state): State<AppState>,
    Query(params): Query<BatchParams>,
) -> Result<Json<BatchResponse>, ApiError> {
    let req = selection_request(
        params.media_type.as_deref(),
        params.exclude_ids.as_deref(),
        params.blacklisted_tags.as_deref(),
        params.user_id.as_deref(),
    )?;
    let count = positive(params.count.as_deref())
        .unwrap_or(state.limits.default_batch_count)
        .min(state.limits.max_batch_count);

    let (served, total) = state.engine.random_batch(&req, count).await?;
    Ok(Json(BatchResponse {
        characters: served.into_iter().map(CharacterCard::from).collect(),
        total_characters: total,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractBody {
    user_id: Option<String>,
    character_tag: Option<String>,
    interaction_type: Option<String>,
    view_time: Option<f64>,
    swipe_speed: Option<f64>,
    time_of_day: Option<i64>,
    day_of_week: Option<i64>,
    device_type: Option<String>,
    session_swipe_count: Option<f64>,
    action_streak_count: Option<f64>,
}

fn bucket(value: Option<i64>, max: u8, field: &str) -> Result<Option<u8>, ApiError> {
    match value {
        None => Ok(None),
        Some(v) => u8::try_from(v)
            .ok()
            .filter(|b| *b <= max)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("{field} must be 0-{max}, got {v}"))),
    }
}

impl InteractBody {
    fn metrics(&self) -> Result<InteractionMetrics, ApiError> {
        Ok(InteractionMetrics {
            view_time_ms: self.view_time,
            swipe_speed: self.swipe_speed,
            time_of_day: bucket(self.time_of_day, 23, "timeOfDay")?,
            day_of_week: bucket(self.day_of_week, 6, "dayOfWeek")?,
            device_type: self.device_type.clone(),
            session_swipe_count: self.session_swipe_count,
            action_streak_count: self.action_streak_count,
        })
    }
}

/// POST /api/users/preferences/interact
async fn interact(
    State(state): State<AppState>,
    payload: Result<Json<InteractBody>, JsonRejection>,
) -> Result<Json<InteractResponse>, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let present = |s: &Option<String>| {
        s.as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let (Some(user_id), Some(tag), Some(kind)) = (
        present(&body.user_id),
        present(&body.character_tag),
        present(&body.interaction_type),
    ) else {
        return Err(ApiError::BadRequest(
            "Missing required fields: userId, characterTag, or interactionType.".to_string(),
        ));
    };
    let interaction: InteractionType = kind.parse().map_err(|_| {
        ApiError::BadRequest(
            "Invalid interactionType. Must be \"smash\", \"pass\", or \"favorite\".".to_string(),
        )
    })?;
    let metrics = body.metrics()?;

    let record = state
        .engine
        .record_interaction(&user_id, &tag, interaction, &metrics)
        .await?;
    Ok(Json(InteractResponse {
        message: "Preference and metrics recorded successfully.",
        preference: record.into(),
    }))
}

/// GET /api/users/{user_id}/preferences
async fn user_preferences(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<AffinitiesResponse>, ApiError> {
    let affinities = state.engine.affinities(&user_id).await?;
    Ok(Json(AffinitiesResponse {
        user_id,
        affinities: affinities.into_iter().collect(),
    }))
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.engine.health().await;
    Json(HealthResponse {
        status: "UP",
        message: if report.catalog_loaded {
            "Server is running"
        } else {
            "Server is running, character catalog not loaded"
        },
        catalog_size: report.catalog_size,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::util::ServiceExt;

    use super::*;
    use crate::engine::testing::{ScriptedMedia, engine};

    const ORIGIN: &str = "http://localhost:5173";

    fn app_with(names: &[&str], media: Arc<ScriptedMedia>) -> Router {
        let (engine, _) = engine(names, media);
        let state = AppState {
            engine: Arc::new(engine),
            limits: Limits::from(&Config::default()),
        };
        router(state, &[ORIGIN.to_string()])
    }

    fn app(names: &[&str]) -> Router {
        app_with(names, Arc::new(ScriptedMedia::default()))
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        read(response).await
    }

    async fn post_json(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        read(response).await
    }

    async fn read(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_media_type_is_required() {
        let app = app(&["a"]);
        for uri in [
            "/api/characters",
            "/api/characters/random",
            "/api/characters/random/batch",
        ] {
            let (status, body) = get_json(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["message"], "Media type preference is required");
        }

        let (status, _) = get_json(&app, "/api/characters/random?media_type=gifs").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_random_returns_card() {
        let app = app(&["monkey_d._luffy_(one_piece)"]);
        let (status, body) =
            get_json(&app, "/api/characters/random?media_type=Photos%20Only").await;
        assert_eq!(status, StatusCode::OK);
        let card = &body["character"];
        assert_eq!(card["name"], "Monkey D. Luffy");
        assert_eq!(card["originalTag"], "monkey_d._luffy_(one_piece)");
        assert_eq!(card["sourceCount"], 100);
        assert_eq!(card["fileType"], "image");
        assert!(card["imageUrl"].as_str().unwrap().starts_with("https://cdn.test/"));
        assert_eq!(body["totalCharacters"], 1);
    }

    #[tokio::test]
    async fn test_random_respects_exclude_ids() {
        let app = app(&["A", "B", "C"]);
        for _ in 0..20 {
            let (status, body) = get_json(
                &app,
                "/api/characters/random?media_type=Videos%20%26%20Photos&exclude_ids=A",
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_ne!(body["character"]["originalTag"], "A");
        }
    }

    #[tokio::test]
    async fn test_random_status_codes() {
        let (status, body) = get_json(&app(&[]), "/api/characters/random?media_type=all").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["message"].is_string());

        let (status, _) = get_json(
            &app(&["a", "b"]),
            "/api/characters/random?media_type=all&exclude_ids=a&blacklisted_tags=b",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let failing = app_with(&["a", "b", "c", "d"], Arc::new(ScriptedMedia::failing_first(100)));
        let (status, _) = get_json(&failing, "/api/characters/random?media_type=all").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_batch_status_codes() {
        let failing = app_with(&["a", "b", "c"], Arc::new(ScriptedMedia::failing_first(1_000)));
        let (status, body) =
            get_json(&failing, "/api/characters/random/batch?media_type=all&count=2").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["message"].as_str().unwrap().starts_with("Failed to fetch media"));

        let (status, _) = get_json(
            &app(&["a"]),
            "/api/characters/random/batch?media_type=all&exclude_ids=a",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_batch_default_and_cap() {
        let names: Vec<String> = (0..80).map(|i| format!("c{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let app = app(&refs);

        let (status, body) = get_json(&app, "/api/characters/random/batch?media_type=all").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["characters"].as_array().unwrap().len(), 5);
        assert_eq!(body["totalCharacters"], 80);

        let (_, body) =
            get_json(&app, "/api/characters/random/batch?media_type=all&count=500").await;
        let cards = body["characters"].as_array().unwrap();
        assert_eq!(cards.len(), 50);
        let unique: HashSet<&str> = cards
            .iter()
            .map(|c| c["originalTag"].as_str().unwrap())
            .collect();
        assert_eq!(unique.len(), 50);
    }

    #[tokio::test]
    async fn test_list_shape_and_failed_media() {
        let app = app_with(&["a", "b", "c"], Arc::new(ScriptedMedia::failing_tags(&["b"])));
        let (status, body) =
            get_json(&app, "/api/characters?media_type=all&limit=10&seed=abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentPage"], 1);
        assert_eq!(body["totalPages"], 1);
        assert_eq!(body["totalCharactersInSystem"], 3);

        let cards = body["characters"].as_array().unwrap();
        assert_eq!(cards.len(), 3);
        let b = cards.iter().find(|c| c["originalTag"] == "b").unwrap();
        assert!(b["imageUrl"].is_null());
        assert_eq!(b["fileType"], "unknown");

        let (_, again) = get_json(&app, "/api/characters?media_type=all&limit=10&seed=abc").await;
        assert_eq!(body["characters"], again["characters"]);
    }

    #[tokio::test]
    async fn test_list_garbage_paging_falls_back_to_defaults() {
        let app = app(&["a", "b", "c"]);
        let (status, body) =
            get_json(&app, "/api/characters?media_type=all&page=zero&limit=-4").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentPage"], 1);
        assert_eq!(body["characters"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_interact_then_read_preferences() {
        let app = app(&["a"]);
        let (status, body) = post_json(
            &app,
            "/api/users/preferences/interact",
            r#"{"userId":"u1","characterTag":"zelda","interactionType":"favorite",
                "viewTime":1200,"timeOfDay":21,"dayOfWeek":3,"deviceType":"mobile"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Preference and metrics recorded successfully.");
        let pref = &body["preference"];
        assert_eq!(pref["tag"], "zelda");
        assert_eq!(pref["affinityScore"], 2);
        assert_eq!(pref["smashCount"], 2);
        assert_eq!(pref["favoriteCount"], 1);
        assert_eq!(pref["lastInteractionType"], "favorite");
        assert_eq!(pref["timeOfDayCounts"]["21"], 1);
        assert_eq!(pref["avgViewTime"], 1200.0);

        post_json(
            &app,
            "/api/users/preferences/interact",
            r#"{"userId":"u1","characterTag":"link","interactionType":"pass"}"#,
        )
        .await;

        let (status, body) = get_json(&app, "/api/users/u1/preferences").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], "u1");
        assert_eq!(body["affinities"]["zelda"], 2);
        assert_eq!(body["affinities"]["link"], -1);

        let (_, body) = get_json(&app, "/api/users/nobody/preferences").await;
        assert_eq!(body["affinities"], json!({}));
    }

    #[tokio::test]
    async fn test_interact_validation() {
        let app = app(&["a"]);
        let uri = "/api/users/preferences/interact";

        let (status, body) = post_json(&app, uri, r#"{"userId":"u1","characterTag":"x"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().starts_with("Missing required fields"));

        let (status, body) = post_json(
            &app,
            uri,
            r#"{"userId":"u1","characterTag":"x","interactionType":"superlike"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().starts_with("Invalid interactionType"));

        let (status, _) = post_json(
            &app,
            uri,
            r#"{"userId":"u1","characterTag":"x","interactionType":"smash","timeOfDay":24}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(
            &app,
            uri,
            r#"{"userId":"u1","characterTag":"x","interactionType":"smash","swipeSpeed":-2}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post_json(&app, uri, "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(&app(&["a", "b"]), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "UP");
        assert_eq!(body["catalogSize"], 2);
    }

    #[tokio::test]
    async fn test_cors_allow_list() {
        let app = app(&["a"]);
        let request = |origin: &str| {
            Request::builder()
                .uri("/api/health")
                .header("origin", origin)
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app.clone().oneshot(request(ORIGIN)).await.unwrap();
        assert_eq!(
            allowed.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            ORIGIN
        );

        let denied = app.clone().oneshot(request("https://evil.test")).await.unwrap();
        assert!(denied.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn test_split_csv_and_positive() {
        assert_eq!(split_csv(Some(" a, b ,,c ")), vec!["a", "b", "c"]);
        assert!(split_csv(None).is_empty());
        assert_eq!(positive(Some("7")), Some(7));
        assert_eq!(positive(Some("0")), None);
        assert_eq!(positive(Some("x")), None);
    }
}
