use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{EditPetRequest, PetIdQuery},
    repo_types::{Pet, PetListing},
};
use crate::{auth::extractors::AuthContext, error::AppError, error::AppResult, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/pets", get(list_available))
        .route("/pets/details", get(pet_details))
}

/// Mounted under `/secure`.
pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/pets", post(add_listing).put(edit_listing))
        .route("/pets/status", put(toggle_status))
}

#[instrument(skip(state))]
pub async fn list_available(State(state): State<AppState>) -> AppResult<Json<Vec<Pet>>> {
    Ok(Json(state.pets.available().await?))
}

#[instrument(skip(state))]
pub async fn pet_details(
    State(state): State<AppState>,
    Query(q): Query<PetIdQuery>,
) -> AppResult<Json<Pet>> {
    let id = pet_id(&q)?;
    Ok(Json(state.pets.details(id).await?))
}

#[instrument(skip(state, body))]
pub async fn add_listing(
    State(state): State<AppState>,
    ctx: AuthContext,
    body: Result<Json<PetListing>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Pet>)> {
    let Json(listing) = body.map_err(bad_json)?;
    let pet = state.pets.create(ctx, listing).await?;
    Ok((StatusCode::CREATED, Json(pet)))
}

#[instrument(skip(state, body))]
pub async fn edit_listing(
    State(state): State<AppState>,
    ctx: AuthContext,
    body: Result<Json<EditPetRequest>, JsonRejection>,
) -> AppResult<&'static str> {
    let Json(req) = body.map_err(bad_json)?;
    state.pets.edit(ctx, req.id, req.listing).await?;
    Ok("Successfully edited adoption information")
}

#[instrument(skip(state))]
pub async fn toggle_status(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(q): Query<PetIdQuery>,
) -> AppResult<String> {
    let id = pet_id(&q)?;
    let status = state.pets.toggle_status(ctx, id).await?;
    Ok(format!("Adoption status set to: {status}"))
}

fn pet_id(q: &PetIdQuery) -> AppResult<i64> {
    q.parse().ok_or_else(|| {
        AppError::Unprocessable("You need to provide a valid number".into())
    })
}

fn bad_json(rejection: JsonRejection) -> AppError {
    warn!(error = %rejection, "rejected request body");
    AppError::Validation("Parsing Error! Is this JSON?".into())
}
