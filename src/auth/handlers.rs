use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    api::{respond, ApiError, ApiJson, ApiResponse},
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
        extractors::{require_auth, AuthUser},
        services,
    },
    state::AppState,
};

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users/register", post(register))
}

pub fn me_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<RegisterResponse> {
    let created = services::register(state.store.as_ref(), payload).await?;
    Ok(respond(
        StatusCode::CREATED,
        "User registered successfully",
        created,
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let out = services::login(state.store.as_ref(), &state.keys, payload).await?;
    Ok(respond(StatusCode::OK, "Login successful", out))
}

#[instrument(skip(user), fields(user_id = user.user_id))]
pub async fn get_me(user: AuthUser) -> ApiResult<AuthUser> {
    Ok(respond(StatusCode::OK, "Authenticated", user))
}
