//! Generic repository base for SeaORM entities with UUID primary keys
//!
//! Domain repositories wrap [`BaseRepository`] for the common single-row
//! operations and drop down to [`BaseRepository::db`] for entity-specific
//! queries (filters, pagination, bulk updates).
//!
//! # Examples
//!
//! ```ignore
//! use database::BaseRepository;
//!
//! pub struct PgTaskRepository {
//!     base: BaseRepository<entity::Entity>,
//! }
//!
//! impl PgTaskRepository {
//!     pub fn new(db: DatabaseConnection) -> Self {
//!         Self { base: BaseRepository::new(db) }
//!     }
//! }
//! ```

use std::marker::PhantomData;

use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, PrimaryKeyTrait,
};
use uuid::Uuid;

/// Marker for entities keyed by a single `Uuid` primary key.
///
/// Implemented automatically for every entity whose primary key value type is
/// [`Uuid`], which is the convention across the workspace domains.
pub trait UuidEntity: EntityTrait {}

impl<E> UuidEntity for E
where
    E: EntityTrait,
    E::PrimaryKey: PrimaryKeyTrait<ValueType = Uuid>,
{
}

/// Shared CRUD plumbing over a [`DatabaseConnection`].
#[derive(Clone)]
pub struct BaseRepository<E>
where
    E: EntityTrait,
{
    db: DatabaseConnection,
    _entity: PhantomData<E>,
}

impl<E> BaseRepository<E>
where
    E: UuidEntity,
    E::PrimaryKey: PrimaryKeyTrait<ValueType = Uuid>,
{
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    /// Insert an active model and return the stored row.
    pub async fn insert<A>(&self, model: A) -> Result<E::Model, DbErr>
    where
        A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
        E::Model: IntoActiveModel<A>,
    {
        model.insert(&self.db).await
    }

    /// Fetch a row by primary key.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<E::Model>, DbErr> {
        E::find_by_id(id).one(&self.db).await
    }

    /// Update an active model and return the stored row.
    pub async fn update<A>(&self, model: A) -> Result<E::Model, DbErr>
    where
        A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
        E::Model: IntoActiveModel<A>,
    {
        model.update(&self.db).await
    }

    /// Delete a row by primary key, returning the number of rows affected.
    pub async fn delete_by_id(&self, id: Uuid) -> Result<u64, DbErr> {
        let result = E::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected)
    }

    /// Access the underlying connection for entity-specific queries.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
