use serde::Deserialize;

use super::repo_types::PetListing;

/// `?petId=` query parameter, kept as text so a bad value maps to 422.
#[derive(Debug, Deserialize)]
pub struct PetIdQuery {
    #[serde(rename = "petId", default)]
    pub pet_id: String,
}

impl PetIdQuery {
    pub fn parse(&self) -> Option<i64> {
        self.pet_id.trim().parse::<i64>().ok()
    }
}

/// Body for editing a listing: the target id plus the new field values.
#[derive(Debug, Deserialize)]
pub struct EditPetRequest {
    pub id: i64,
    #[serde(flatten)]
    pub listing: PetListing,
}
