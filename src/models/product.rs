use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub base_price: Decimal,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Insert payload; `user_id` is the creating user and becomes the owner
/// notified about the product's stock.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub base_price: Decimal,
    pub user_id: Option<Uuid>,
    pub category_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ProductChanges {
    pub name: String,
    pub description: Option<String>,
    pub base_price: Decimal,
    pub category_ids: Vec<Uuid>,
}

// Listing row with joined owner, categories and stock quantity
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ProductDisplay {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub base_price: Decimal,
    pub owner_email: String,
    pub categories: String,
    pub quantity: i32,
}
