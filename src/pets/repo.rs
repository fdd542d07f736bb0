use async_trait::async_trait;
use sqlx::PgPool;
#[cfg(test)]
use time::OffsetDateTime;
#[cfg(test)]
use tokio::sync::RwLock;

use super::repo_types::{Pet, PetListing, PetStatus};
use crate::db::StoreError;

/// Persistence for pet listings. Every mutation is scoped by `owner_id`.
#[async_trait]
pub trait PetStore: Send + Sync {
    async fn list_available(&self) -> Result<Vec<Pet>, StoreError>;
    async fn find_by_id(&self, pet_id: i64) -> Result<Option<Pet>, StoreError>;
    async fn insert(&self, owner_id: i64, listing: PetListing) -> Result<Pet, StoreError>;
    /// Rows affected; 0 means not found or not owned.
    async fn update(&self, owner_id: i64, pet_id: i64, listing: PetListing)
        -> Result<u64, StoreError>;
    /// New status, or `None` when not found or not owned.
    async fn toggle_status(&self, owner_id: i64, pet_id: i64)
        -> Result<Option<PetStatus>, StoreError>;
}

const PET_COLUMNS: &str = "id, name, species, breed, age, description, status, gender, size, \
     color, weight, vaccination_status, spayed, microchipped, rescue_story, created_at, user_id";

pub struct PgPetStore {
    db: PgPool,
}

impl PgPetStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PetStore for PgPetStore {
    async fn list_available(&self) -> Result<Vec<Pet>, StoreError> {
        let rows = sqlx::query_as::<_, Pet>(&format!(
            "SELECT {PET_COLUMNS} FROM pets WHERE status = 'available' ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, pet_id: i64) -> Result<Option<Pet>, StoreError> {
        let row = sqlx::query_as::<_, Pet>(&format!("SELECT {PET_COLUMNS} FROM pets WHERE id = $1"))
            .bind(pet_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn insert(&self, owner_id: i64, l: PetListing) -> Result<Pet, StoreError> {
        let pet = sqlx::query_as::<_, Pet>(&format!(
            r#"
            INSERT INTO pets (name, species, breed, age, description, status, gender, size,
                              color, weight, vaccination_status, spayed, microchipped,
                              rescue_story, user_id)
            VALUES ($1, $2, $3, $4, $5, 'available', $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {PET_COLUMNS}
            "#
        ))
        .bind(l.name)
        .bind(l.species)
        .bind(l.breed)
        .bind(l.age)
        .bind(l.description)
        .bind(l.gender)
        .bind(l.size)
        .bind(l.color)
        .bind(l.weight)
        .bind(l.vaccination_status)
        .bind(l.spayed)
        .bind(l.microchipped)
        .bind(l.rescue_story)
        .bind(owner_id)
        .fetch_one(&self.db)
        .await?;
        Ok(pet)
    }

    async fn update(
        &self,
        owner_id: i64,
        pet_id: i64,
        l: PetListing,
    ) -> Result<u64, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE pets
               SET name = $1, species = $2, breed = $3, age = $4, description = $5,
                   gender = $6, size = $7, color = $8, weight = $9,
                   vaccination_status = $10, spayed = $11, microchipped = $12,
                   rescue_story = $13
             WHERE id = $14 AND user_id = $15
            "#,
        )
        .bind(l.name)
        .bind(l.species)
        .bind(l.breed)
        .bind(l.age)
        .bind(l.description)
        .bind(l.gender)
        .bind(l.size)
        .bind(l.color)
        .bind(l.weight)
        .bind(l.vaccination_status)
        .bind(l.spayed)
        .bind(l.microchipped)
        .bind(l.rescue_story)
        .bind(pet_id)
        .bind(owner_id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected())
    }

    async fn toggle_status(
        &self,
        owner_id: i64,
        pet_id: i64,
    ) -> Result<Option<PetStatus>, StoreError> {
        let status: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE pets
               SET status = CASE WHEN status = 'available' THEN 'adopted' ELSE 'available' END
             WHERE id = $1 AND user_id = $2
            RETURNING status
            "#,
        )
        .bind(pet_id)
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await?;

        status
            .map(|s| s.parse::<PetStatus>())
            .transpose()
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))
    }
}

/// In-process store used by tests and `AppState::fake`.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryPetStore {
    pets: RwLock<Vec<Pet>>,
}

#[cfg(test)]
impl MemoryPetStore {
    fn apply(pet: &mut Pet, l: PetListing) {
        pet.name = l.name;
        pet.species = l.species;
        pet.breed = l.breed;
        pet.age = l.age;
        pet.description = l.description;
        pet.gender = l.gender;
        pet.size = l.size;
        pet.color = l.color;
        pet.weight = l.weight;
        pet.vaccination_status = l.vaccination_status;
        pet.spayed = l.spayed;
        pet.microchipped = l.microchipped;
        pet.rescue_story = l.rescue_story;
    }
}

#[cfg(test)]
#[async_trait]
impl PetStore for MemoryPetStore {
    async fn list_available(&self) -> Result<Vec<Pet>, StoreError> {
        Ok(self
            .pets
            .read()
            .await
            .iter()
            .rev()
            .filter(|p| p.status == PetStatus::Available.as_str())
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, pet_id: i64) -> Result<Option<Pet>, StoreError> {
        Ok(self.pets.read().await.iter().find(|p| p.id == pet_id).cloned())
    }

    async fn insert(&self, owner_id: i64, listing: PetListing) -> Result<Pet, StoreError> {
        let mut pets = self.pets.write().await;
        let mut pet = Pet {
            id: pets.len() as i64 + 1,
            name: String::new(),
            species: String::new(),
            breed: String::new(),
            age: 0,
            description: String::new(),
            status: PetStatus::Available.as_str().to_string(),
            gender: String::new(),
            size: String::new(),
            color: String::new(),
            weight: 0.0,
            vaccination_status: false,
            spayed: false,
            microchipped: false,
            rescue_story: String::new(),
            created_at: OffsetDateTime::now_utc(),
            user_id: owner_id,
        };
        Self::apply(&mut pet, listing);
        pets.push(pet.clone());
        Ok(pet)
    }

    async fn update(
        &self,
        owner_id: i64,
        pet_id: i64,
        listing: PetListing,
    ) -> Result<u64, StoreError> {
        let mut pets = self.pets.write().await;
        match pets
            .iter_mut()
            .find(|p| p.id == pet_id && p.user_id == owner_id)
        {
            Some(pet) => {
                Self::apply(pet, listing);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn toggle_status(
        &self,
        owner_id: i64,
        pet_id: i64,
    ) -> Result<Option<PetStatus>, StoreError> {
        let mut pets = self.pets.write().await;
        let Some(pet) = pets
            .iter_mut()
            .find(|p| p.id == pet_id && p.user_id == owner_id)
        else {
            return Ok(None);
        };
        let next = match pet.status.parse::<PetStatus>() {
            Ok(current) => current.toggled(),
            Err(_) => PetStatus::Available,
        };
        pet.status = next.as_str().to_string();
        Ok(Some(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(name: &str) -> PetListing {
        PetListing {
            name: name.into(),
            species: "dog".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn insert_forces_available_and_owner() {
        let store = MemoryPetStore::default();
        let pet = store.insert(7, listing("Rex")).await.unwrap();
        assert_eq!(pet.user_id, 7);
        assert_eq!(pet.status, "available");
        assert_eq!(store.find_by_id(pet.id).await.unwrap(), Some(pet));
    }

    #[tokio::test]
    async fn update_requires_matching_owner() {
        let store = MemoryPetStore::default();
        let pet = store.insert(1, listing("Rex")).await.unwrap();

        assert_eq!(store.update(2, pet.id, listing("Stolen")).await.unwrap(), 0);
        assert_eq!(store.update(1, 999, listing("Nope")).await.unwrap(), 0);
        assert_eq!(store.find_by_id(pet.id).await.unwrap().unwrap().name, "Rex");

        assert_eq!(store.update(1, pet.id, listing("Max")).await.unwrap(), 1);
        assert_eq!(store.find_by_id(pet.id).await.unwrap().unwrap().name, "Max");
    }

    #[tokio::test]
    async fn toggle_flips_status_and_filters_listing() {
        let store = MemoryPetStore::default();
        let rex = store.insert(1, listing("Rex")).await.unwrap();
        store.insert(1, listing("Tom")).await.unwrap();

        assert_eq!(store.toggle_status(2, rex.id).await.unwrap(), None);
        assert_eq!(
            store.toggle_status(1, rex.id).await.unwrap(),
            Some(PetStatus::Adopted)
        );
        let names: Vec<String> = store
            .list_available()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Tom".to_string()]);

        assert_eq!(
            store.toggle_status(1, rex.id).await.unwrap(),
            Some(PetStatus::Available)
        );
        assert_eq!(store.list_available().await.unwrap().len(), 2);
    }
}
