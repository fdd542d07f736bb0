use axum::{
    extract::State,
    routing::{post, put},
    Form, Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginForm, LoginResponse, RegisterForm, UpdateEmailForm, UpdateUsernameForm},
        extractors::AuthContext,
    },
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Mounted under `/secure`.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/account/email", put(update_email))
        .route("/account/username", put(update_username))
}

#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> AppResult<&'static str> {
    state
        .auth
        .register(&form.username, &form.email, &form.password)
        .await?;
    Ok("Successfully registered user")
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Json<LoginResponse>> {
    let token = state.auth.login(&form.email, &form.password).await?;
    Ok(Json(LoginResponse {
        message: "You were logged in!".into(),
        token,
    }))
}

#[instrument(skip(state, form))]
pub async fn update_email(
    State(state): State<AppState>,
    ctx: AuthContext,
    Form(form): Form<UpdateEmailForm>,
) -> AppResult<&'static str> {
    state.auth.update_email(ctx, &form.email).await?;
    Ok("Email updated")
}

#[instrument(skip(state, form))]
pub async fn update_username(
    State(state): State<AppState>,
    ctx: AuthContext,
    Form(form): Form<UpdateUsernameForm>,
) -> AppResult<&'static str> {
    state.auth.update_username(ctx, &form.username).await?;
    Ok("Username updated")
}
