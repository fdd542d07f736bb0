use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use super::{
    repo::PetStore,
    repo_types::{Pet, PetListing, PetStatus},
};
use crate::{
    auth::extractors::AuthContext,
    error::{AppError, AppResult},
};

/// Pet listings. Writes take the caller's identity from `AuthContext` only.
#[derive(Clone)]
pub struct PetService {
    pets: Arc<dyn PetStore>,
}

impl PetService {
    pub fn new(pets: Arc<dyn PetStore>) -> Self {
        Self { pets }
    }

    pub async fn available(&self) -> AppResult<Vec<Pet>> {
        Ok(self
            .pets
            .list_available()
            .await
            .context("list available pets")?)
    }

    pub async fn details(&self, pet_id: i64) -> AppResult<Pet> {
        self.pets
            .find_by_id(pet_id)
            .await
            .context("get pet details")?
            .ok_or(AppError::NotFound)
    }

    pub async fn create(&self, ctx: AuthContext, listing: PetListing) -> AppResult<Pet> {
        validate(&listing)?;
        let pet = self
            .pets
            .insert(ctx.user_id, listing)
            .await
            .context("insert pet listing")?;
        info!(user_id = ctx.user_id, pet_id = pet.id, "pet listing added");
        Ok(pet)
    }

    pub async fn edit(&self, ctx: AuthContext, pet_id: i64, listing: PetListing) -> AppResult<()> {
        validate(&listing)?;
        let rows = self
            .pets
            .update(ctx.user_id, pet_id, listing)
            .await
            .context("update pet listing")?;
        if rows == 0 {
            warn!(user_id = ctx.user_id, pet_id, "edit matched no owned listing");
            return Err(AppError::NotFoundOrNotOwned);
        }
        info!(user_id = ctx.user_id, pet_id, rows, "pet listing edited");
        Ok(())
    }

    pub async fn toggle_status(&self, ctx: AuthContext, pet_id: i64) -> AppResult<PetStatus> {
        let status = self
            .pets
            .toggle_status(ctx.user_id, pet_id)
            .await
            .context("toggle pet status")?
            .ok_or_else(|| {
                warn!(user_id = ctx.user_id, pet_id, "toggle matched no owned listing");
                AppError::NotFoundOrNotOwned
            })?;
        info!(user_id = ctx.user_id, pet_id, %status, "adoption status changed");
        Ok(status)
    }
}

fn validate(listing: &PetListing) -> AppResult<()> {
    if listing.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if listing.age < 0 {
        return Err(AppError::Validation("age must not be negative".into()));
    }
    if !listing.weight.is_finite() || listing.weight < 0.0 {
        return Err(AppError::Validation("weight must be a non-negative number".into()));
    }
    Ok(())
}
