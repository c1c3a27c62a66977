//! HTTP command API for the chesslink bridge.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use chesslink_board::{BoardError, Preferences, StartGameRequest};
use chesslink_remote::RemoteError;
use chesslink_sync::{BroadcastStatus, OnlineStatus, SyncEngine, SyncError};
use chesslink_types::{BoardDevice, BoardState, ConnectionState, GameInfo, RemoteGame};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Snapshot of every observable, served by `GET /api/v1/status`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connection: ConnectionState,
    pub target: Option<BoardDevice>,
    pub game: Option<GameInfo>,
    pub board: BoardState,
    pub broadcast: BroadcastStatus,
    pub online: OnlineStatus,
    pub active_game: Option<RemoteGame>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SignInRequest {
    pub token: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SignInResponse {
    pub username: String,
}

/// Body of `PUT /api/v1/board/target`. A null device disconnects.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TargetRequest {
    pub device: Option<BoardDevice>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UploadResponse {
    pub imported: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// A failed command, rendered with the status its error kind maps to.
pub struct ApiError(SyncError);

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SyncError::Remote(RemoteError::NotSignedIn | RemoteError::Authorization(_)) => {
                StatusCode::UNAUTHORIZED
            }
            SyncError::Remote(RemoteError::TooManyRequests { .. }) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            SyncError::Board(BoardError::NotConnected) => StatusCode::CONFLICT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(%status, error = %self.0, "command failed");
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn status_handler(State(engine): State<Arc<SyncEngine>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        connection: *engine.connection_state().borrow(),
        target: engine.target_device(),
        game: engine.game_info().borrow().clone(),
        board: engine.board_state().borrow().clone(),
        broadcast: engine.broadcast_status().borrow().clone(),
        online: *engine.online_status().borrow(),
        active_game: engine.active_game().borrow().clone(),
    })
}

async fn sign_in_handler(
    State(engine): State<Arc<SyncEngine>>,
    Json(request): Json<SignInRequest>,
) -> ApiResult<Json<SignInResponse>> {
    let username = engine.sign_in(&request.token).await?;
    Ok(Json(SignInResponse { username }))
}

async fn sign_out_handler(State(engine): State<Arc<SyncEngine>>) -> ApiResult<StatusCode> {
    engine.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn target_handler(
    State(engine): State<Arc<SyncEngine>>,
    Json(request): Json<TargetRequest>,
) -> StatusCode {
    engine.set_target_device(request.device);
    StatusCode::NO_CONTENT
}

async fn preferences_handler(
    State(engine): State<Arc<SyncEngine>>,
    Json(preferences): Json<Preferences>,
) -> ApiResult<StatusCode> {
    engine.write_preferences(&preferences).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn offline_game_handler(
    State(engine): State<Arc<SyncEngine>>,
    Json(request): Json<StartGameRequest>,
) -> ApiResult<StatusCode> {
    engine
        .start_offline_game(&request.white, &request.black)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leds_handler(State(engine): State<Arc<SyncEngine>>) -> ApiResult<StatusCode> {
    engine.test_leds().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_handler(State(engine): State<Arc<SyncEngine>>) -> ApiResult<Json<UploadResponse>> {
    let imported = engine.upload_saved_games().await?;
    Ok(Json(UploadResponse { imported }))
}

async fn broadcast_start_handler(State(engine): State<Arc<SyncEngine>>) -> ApiResult<StatusCode> {
    engine.start_broadcast().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn broadcast_stop_handler(State(engine): State<Arc<SyncEngine>>) -> StatusCode {
    engine.stop_broadcast();
    StatusCode::NO_CONTENT
}

async fn online_start_handler(State(engine): State<Arc<SyncEngine>>) -> StatusCode {
    engine.start_online_game();
    StatusCode::NO_CONTENT
}

async fn online_stop_handler(State(engine): State<Arc<SyncEngine>>) -> StatusCode {
    engine.stop_online_game().await;
    StatusCode::NO_CONTENT
}

/// Build the HTTP API router over the given engine.
pub fn build_router(engine: Arc<SyncEngine>) -> Router {
    Router::new()
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/session/sign-in", post(sign_in_handler))
        .route("/api/v1/session/sign-out", post(sign_out_handler))
        .route("/api/v1/board/target", put(target_handler))
        .route("/api/v1/board/preferences", post(preferences_handler))
        .route("/api/v1/board/offline-game", post(offline_game_handler))
        .route("/api/v1/board/leds", post(leds_handler))
        .route("/api/v1/board/games/upload", post(upload_handler))
        .route("/api/v1/broadcast/start", post(broadcast_start_handler))
        .route("/api/v1/broadcast/stop", post(broadcast_stop_handler))
        .route("/api/v1/online/start", post(online_start_handler))
        .route("/api/v1/online/stop", post(online_stop_handler))
        .with_state(engine)
}
