pub mod auth;
pub mod categories;
pub mod events;
pub mod movements;
pub mod notifications;
pub mod products;
pub mod stock;
pub mod suppliers;

use axum::{extract::State, response::Redirect};
use askama::Template;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppError,
    middleware::require_user,
    models::{shares, CountRow, Share, StockDisplay},
    services::threshold::Alert,
    state::AppState,
};

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub notice: Option<String>,
}

/// One `<option>` of a select box, pre-rendered so templates never compare ids.
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    user_name: String,
    product_count: i64,
    supplier_count: i64,
    category_count: i64,
    unread_count: i64,
    out_of_range: Vec<StockDisplay>,
    by_category: Vec<Share>,
    by_supplier: Vec<Share>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<DashboardTemplate, AppError> {
    let user = require_user(&cookies, &state).await?;

    let product_count = count(&state.db, "SELECT COUNT(*) FROM products").await?;
    let supplier_count = count(&state.db, "SELECT COUNT(*) FROM suppliers").await?;
    let category_count = count(&state.db, "SELECT COUNT(*) FROM categories").await?;

    let unread_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE destination_id = $1 AND read = false",
    )
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    let out_of_range = sqlx::query_as::<_, StockDisplay>(
        r#"
        SELECT
            s.id,
            s.code,
            COALESCE(p.name, '') AS product_name,
            COALESCE(sp.name, '') AS supplier_name,
            s.quantity,
            s.minimal_quantity,
            s.max_quantity,
            COALESCE(p.base_price, 0) AS base_price
        FROM stocks s
        LEFT JOIN products p ON p.id = s.product_id
        LEFT JOIN suppliers sp ON sp.id = s.supplier_id
        WHERE s.quantity < s.minimal_quantity OR s.quantity > s.max_quantity
        ORDER BY p.name
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let by_category = sqlx::query_as::<_, CountRow>(
        r#"
        SELECT c.name AS label, COUNT(pc.product_id) AS count
        FROM categories c
        LEFT JOIN product_categories pc ON pc.category_id = c.id
        GROUP BY c.id, c.name
        ORDER BY count DESC, c.name
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    // A product is counted once per supplier of its stock.
    let by_supplier = sqlx::query_as::<_, CountRow>(
        r#"
        SELECT sp.name AS label, COUNT(DISTINCT s.product_id) AS count
        FROM suppliers sp
        LEFT JOIN stocks s ON s.supplier_id = sp.id
        GROUP BY sp.id, sp.name
        ORDER BY count DESC, sp.name
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(DashboardTemplate {
        user_name: user.display_name(),
        product_count,
        supplier_count,
        category_count,
        unread_count,
        out_of_range,
        by_category: shares(by_category),
        by_supplier: shares(by_supplier),
    })
}

async fn count(db: &Database, sql: &str) -> Result<i64, AppError> {
    Ok(sqlx::query_scalar::<_, i64>(sql).fetch_one(db).await?)
}

pub async fn category_options(db: &Database, selected: &[Uuid]) -> Result<Vec<SelectOption>, AppError> {
    let rows = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM categories ORDER BY name")
        .fetch_all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name)| SelectOption {
            value: id.to_string(),
            label: name,
            selected: selected.contains(&id),
        })
        .collect())
}

pub async fn supplier_options(
    db: &Database,
    selected: Option<Uuid>,
) -> Result<Vec<SelectOption>, AppError> {
    let rows = sqlx::query_as::<_, (Uuid, String, String)>(
        "SELECT id, code, name FROM suppliers ORDER BY name",
    )
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, code, name)| SelectOption {
            value: id.to_string(),
            label: format!("{} ({})", name, code),
            selected: selected == Some(id),
        })
        .collect())
}

pub async fn product_options(db: &Database) -> Result<Vec<SelectOption>, AppError> {
    let rows = sqlx::query_as::<_, (Uuid, String, String)>(
        "SELECT id, code, name FROM products ORDER BY name",
    )
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, code, name)| SelectOption {
            value: id.to_string(),
            label: format!("{} ({})", name, code),
            selected: false,
        })
        .collect())
}

/// Redirects to `path`, carrying the alert text for the banner when a
/// threshold fired.
pub fn redirect_with_notice(path: &str, alert: Option<&Alert>) -> Redirect {
    match alert {
        Some(alert) => Redirect::to(&format!(
            "{}?notice={}",
            path,
            urlencoding::encode(&alert.notification.body)
        )),
        None => Redirect::to(path),
    }
}

// Empty select value means "none".
pub fn parse_optional_uuid(value: &str) -> Result<Option<Uuid>, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| AppError::bad_request(format!("Invalid identifier: {}", value)))
}

/// Parses a non-negative whole number; an empty field counts as zero.
pub fn parse_quantity(value: &str, field: &str) -> Result<i32, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    let quantity: i32 = value
        .parse()
        .map_err(|_| AppError::bad_request(format!("{} must be a whole number", field)))?;
    if quantity < 0 {
        return Err(AppError::bad_request(format!("{} cannot be negative", field)));
    }
    Ok(quantity)
}

pub fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
