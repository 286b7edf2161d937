use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::services::threshold::{classify, StockLevel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Stock {
    pub id: Uuid,
    pub code: String,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub quantity: i32,
    pub minimal_quantity: i32,
    pub max_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stock {
    pub fn level(&self) -> StockLevel {
        classify(self.quantity, self.minimal_quantity, self.max_quantity)
    }
}

/// The administrator-set fields of a stock; the quantity only moves
/// through the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockSettings {
    pub supplier_id: Option<Uuid>,
    pub minimal_quantity: i32,
    pub max_quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StockEntry {
    pub id: Uuid,
    pub code: String,
    pub stock_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StockExit {
    pub id: Uuid,
    pub code: String,
    pub stock_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub description: Option<String>,
    pub user_id: Option<Uuid>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    Entry,
    Exit,
}

/// A quantity change to be booked against one stock. `quantity` is always
/// positive; the kind carries the direction. `user_id` is the acting user.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub kind: MovementKind,
    pub stock_id: Uuid,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub description: Option<String>,
    pub user_id: Option<Uuid>,
    pub quantity: i32,
}

impl NewMovement {
    pub fn signed_quantity(&self) -> i32 {
        match self.kind {
            MovementKind::Entry => self.quantity,
            MovementKind::Exit => -self.quantity,
        }
    }
}

/// The immutable ledger row written for a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerFact {
    Entry(StockEntry),
    Exit(StockExit),
}

impl LedgerFact {
    pub fn kind(&self) -> MovementKind {
        match self {
            LedgerFact::Entry(_) => MovementKind::Entry,
            LedgerFact::Exit(_) => MovementKind::Exit,
        }
    }

    pub fn quantity(&self) -> i32 {
        match self {
            LedgerFact::Entry(e) => e.quantity,
            LedgerFact::Exit(e) => e.quantity,
        }
    }

    pub fn stock_id(&self) -> Option<Uuid> {
        match self {
            LedgerFact::Entry(e) => e.stock_id,
            LedgerFact::Exit(e) => e.stock_id,
        }
    }

    pub fn product_id(&self) -> Option<Uuid> {
        match self {
            LedgerFact::Entry(e) => e.product_id,
            LedgerFact::Exit(e) => e.product_id,
        }
    }
}

// Listing row for the stock overview
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct StockDisplay {
    pub id: Uuid,
    pub code: String,
    pub product_name: String,
    pub supplier_name: String,
    pub quantity: i32,
    pub minimal_quantity: i32,
    pub max_quantity: i32,
    pub base_price: Decimal,
}

impl StockDisplay {
    pub fn level(&self) -> StockLevel {
        classify(self.quantity, self.minimal_quantity, self.max_quantity)
    }

    pub fn total_value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.base_price
    }
}

// Listing row shared by the entry and exit pages
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct MovementDisplay {
    pub id: Uuid,
    pub code: String,
    pub product_name: String,
    pub stock_code: String,
    pub detail: String,
    pub actor: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// One line of the change log: an entry or exit with who booked it.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ChangeLogRow {
    pub kind: String,
    pub code: String,
    pub product_name: String,
    pub actor: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl ChangeLogRow {
    pub fn message(&self) -> String {
        if self.kind == "exit" {
            format!("{} units removed from stock", self.quantity)
        } else {
            format!("{} units added to stock", self.quantity)
        }
    }
}
