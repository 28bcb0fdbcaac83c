//! HTTP shell around the console engine.
//!
//! Every GET outside `/api`, `/login` and the health endpoints is a
//! navigation: the guard decides, and the answer is a screen descriptor, a
//! `303 See Other` redirect, or an access-denied error. Until startup
//! restoration finishes, navigations answer `503` with a loading status.

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, patch, post},
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api_errors::AppError;
use crate::auth::Credentials;
use crate::console::ConsoleState;
use crate::guard::GuardDecision;
use crate::navigation::LOGIN_PATH;
use crate::route_key::RouteKey;
use crate::session::{ProfileUpdate, Session};

type SharedConsole = Arc<ConsoleState>;

#[derive(Debug, Serialize)]
pub struct ScreenResponse {
    pub outcome: &'static str,
    pub path: String,
    pub route: String,
    pub screen: &'static str,
    pub title: &'static str,
    pub bundle: String,
}

#[derive(Debug, Serialize)]
pub struct NavEntry {
    pub key: RouteKey,
    pub path: String,
    pub title: &'static str,
    pub component: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session: Session,
    pub landing: String,
}

pub fn build_console_router(state: SharedConsole) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/login", get(login_screen))
        .route("/api/session", get(current_session))
        .route("/api/session/login", post(login))
        .route("/api/session/logout", post(logout))
        .route("/api/session/profile", patch(update_profile))
        .route("/api/routes", get(nav_routes))
        .route("/", get(navigate))
        .route("/{*path}", get(navigate))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: SharedConsole, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "console listening");
    axum::serve(listener, build_console_router(state)).await?;
    Ok(())
}

fn loading() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "loading" })),
    )
        .into_response()
}

async fn navigate(State(console): State<SharedConsole>, uri: Uri) -> Result<Response, AppError> {
    if !console.is_ready() {
        return Ok(loading());
    }

    let requested = uri.path().to_string();
    let response = match console.navigate(&requested)? {
        GuardDecision::Render(binding) => {
            let module = binding.screen.load();
            Json(ScreenResponse {
                outcome: "render",
                path: requested,
                route: binding.path.clone(),
                screen: module.component,
                title: binding.screen.title(),
                bundle: module.bundle.clone(),
            })
            .into_response()
        }
        GuardDecision::AccessDenied => {
            return Err(AppError::forbidden("access denied for this account"));
        }
        decision => match decision.redirect_target() {
            Some(target) => Redirect::to(target).into_response(),
            None => return Err(AppError::internal("guard produced no target")),
        },
    };
    Ok(response)
}

async fn login_screen(State(console): State<SharedConsole>) -> Result<Response, AppError> {
    if !console.is_ready() {
        return Ok(loading());
    }
    let landing = console.landing_path()?;
    if landing != LOGIN_PATH {
        return Ok(Redirect::to(&landing).into_response());
    }
    Ok(Json(json!({ "outcome": "render", "path": LOGIN_PATH, "screen": "LoginPage" })).into_response())
}

async fn login(
    State(console): State<SharedConsole>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<LoginResponse>, AppError> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    let outcome = console.login(&credentials).await?;
    Ok(Json(LoginResponse {
        session: outcome.session,
        landing: outcome.landing,
    }))
}

async fn logout(State(console): State<SharedConsole>) -> Result<StatusCode, AppError> {
    console.logout().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn current_session(State(console): State<SharedConsole>) -> Result<Json<Session>, AppError> {
    Ok(Json(console.sessions.current()?))
}

async fn update_profile(
    State(console): State<SharedConsole>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Session>, AppError> {
    match console.update_profile(update)? {
        Some(session) => Ok(Json(session)),
        None => Err(AppError::unauthorized("not logged in")),
    }
}

async fn nav_routes(State(console): State<SharedConsole>) -> Result<Json<Vec<NavEntry>>, AppError> {
    let entries = console
        .current_routes()?
        .into_iter()
        .map(|binding| NavEntry {
            key: binding.key,
            title: binding.screen.title(),
            component: binding.screen.component(),
            path: binding.path,
        })
        .collect();
    Ok(Json(entries))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readyz(State(console): State<SharedConsole>) -> Json<serde_json::Value> {
    Json(json!({ "ready": console.is_ready() }))
}
