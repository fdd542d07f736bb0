use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Pet listing row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Pet {
    pub id: i64,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub age: i32,
    pub description: String,
    pub status: String, // see PetStatus
    pub gender: String,
    pub size: String,
    pub color: String,
    pub weight: f32,
    pub vaccination_status: bool,
    pub spayed: bool,
    pub microchipped: bool,
    pub rescue_story: String,
    pub created_at: OffsetDateTime,
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PetStatus {
    Available,
    Adopted,
}

impl PetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PetStatus::Available => "available",
            PetStatus::Adopted => "adopted",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            PetStatus::Available => PetStatus::Adopted,
            PetStatus::Adopted => PetStatus::Available,
        }
    }
}

impl fmt::Display for PetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PetStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(PetStatus::Available),
            "adopted" => Ok(PetStatus::Adopted),
            other => anyhow::bail!("unknown pet status {other:?}"),
        }
    }
}

/// Owner-editable fields of a listing. Identity and status are never taken
/// from the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PetListing {
    pub name: String,
    pub species: String,
    pub breed: String,
    pub age: i32,
    pub description: String,
    pub gender: String,
    pub size: String,
    pub color: String,
    pub weight: f32,
    pub vaccination_status: bool,
    pub spayed: bool,
    pub microchipped: bool,
    pub rescue_story: String,
}
