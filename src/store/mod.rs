//! Persistence seam for the stock ledger.
//!
//! Reference-data pages (categories, suppliers, listings) query the pool
//! directly; everything the ledger, the threshold monitor and the
//! notification dispatcher touch goes through [`InventoryStore`] so those
//! services can run against [`InMemoryStore`] in tests.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    LedgerFact, NewMovement, NewProduct, Notification, Product, ProductChanges, Stock,
    StockEntry, StockExit, StockSettings,
};

pub use in_memory::InMemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A row was rejected by a schema constraint (non-negative quantity,
    /// foreign key, uniqueness).
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db)
                if matches!(db.code().as_deref(), Some("23514" | "23503" | "23505")) =>
            {
                StoreError::Constraint(db.message().to_string())
            }
            sqlx::Error::RowNotFound => StoreError::NotFound("row"),
            _ => StoreError::Database(err),
        }
    }
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Creates the product and its single stock (quantity 0) together;
    /// neither exists if either insert fails.
    async fn create_product_with_stock(
        &self,
        product: NewProduct,
        settings: StockSettings,
    ) -> StoreResult<(Product, Stock)>;

    async fn update_product(&self, id: Uuid, changes: ProductChanges) -> StoreResult<Product>;

    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>>;

    /// Removes the product together with its stocks, entries and exits.
    /// Returns `false` when no such product existed.
    async fn delete_product(&self, id: Uuid) -> StoreResult<bool>;

    async fn stock(&self, id: Uuid) -> StoreResult<Option<Stock>>;

    /// The product's first stock, oldest first.
    async fn stock_for_product(&self, product_id: Uuid) -> StoreResult<Option<Stock>>;

    /// Saves the settings and books the optional movement as one atomic
    /// unit: a rejected movement leaves the settings untouched.
    async fn edit_stock(
        &self,
        id: Uuid,
        settings: StockSettings,
        movement: Option<NewMovement>,
    ) -> StoreResult<(Option<LedgerFact>, Stock)>;

    /// Writes the ledger fact and adds the signed quantity to the stock as
    /// one atomic unit. A result below zero is a `Constraint` error and
    /// leaves nothing behind.
    async fn apply_movement(&self, movement: NewMovement) -> StoreResult<(LedgerFact, Stock)>;

    async fn entries_for_stock(&self, stock_id: Uuid) -> StoreResult<Vec<StockEntry>>;

    async fn exits_for_stock(&self, stock_id: Uuid) -> StoreResult<Vec<StockExit>>;

    async fn create_notification(
        &self,
        destination_id: Option<Uuid>,
        body: &str,
    ) -> StoreResult<Notification>;

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<()>;

    async fn unread_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>>;
}
