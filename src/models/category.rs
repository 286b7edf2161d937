use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// Template-friendly listing row
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct CategoryDisplay {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub product_count: i64,
}
