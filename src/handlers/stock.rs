use axum::{
    extract::{Form, Path, Query, State},
    response::Redirect,
};
use askama::Template;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    filters,
    handlers::{
        parse_optional_uuid, parse_quantity, redirect_with_notice, supplier_options, SearchQuery,
        SelectOption,
    },
    middleware::require_user,
    models::{Stock, StockDisplay},
    services::StockEdit,
    state::AppState,
};

#[derive(Template)]
#[template(path = "stock/stocks.html")]
pub struct StocksTemplate {
    stocks: Vec<StockDisplay>,
    search: String,
    notice: String,
}

/// One line of a stock's movement history.
pub struct HistoryRow {
    kind: &'static str,
    code: String,
    quantity: i32,
    detail: String,
    created_at: DateTime<Utc>,
}

#[derive(Template)]
#[template(path = "stock/stock_form.html")]
pub struct StockFormTemplate {
    stock: Stock,
    product_name: String,
    suppliers: Vec<SelectOption>,
    history: Vec<HistoryRow>,
}

#[derive(Deserialize)]
pub struct StockForm {
    /// Quantity shown when the form was rendered.
    #[serde(default)]
    expected_quantity: String,
    quantity: String,
    minimal_quantity: String,
    max_quantity: String,
    #[serde(default)]
    supplier_id: String,
}

pub async fn stocks_list(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<SearchQuery>,
) -> Result<StocksTemplate, AppError> {
    require_user(&cookies, &state).await?;
    let search = query.q.unwrap_or_default();

    let stocks = sqlx::query_as::<_, StockDisplay>(
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
        WHERE ($1 = '' OR p.name ILIKE '%' || $1 || '%')
        ORDER BY p.name, s.created_at
        "#,
    )
    .bind(search.trim())
    .fetch_all(&state.db)
    .await?;

    Ok(StocksTemplate {
        stocks,
        search,
        notice: query.notice.unwrap_or_default(),
    })
}

pub async fn stock_edit_form(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(stock_id): Path<Uuid>,
) -> Result<StockFormTemplate, AppError> {
    require_user(&cookies, &state).await?;

    let stock = state
        .store
        .stock(stock_id)
        .await?
        .ok_or(AppError::NotFound("stock"))?;
    let product_name = match stock.product_id {
        Some(product_id) => state
            .store
            .product(product_id)
            .await?
            .map(|p| p.name)
            .unwrap_or_default(),
        None => String::new(),
    };

    let entries = state.store.entries_for_stock(stock_id).await?;
    let exits = state.store.exits_for_stock(stock_id).await?;

    let mut history: Vec<HistoryRow> = entries
        .into_iter()
        .map(|e| HistoryRow {
            kind: "Entry",
            code: e.code,
            quantity: e.quantity,
            detail: String::new(),
            created_at: e.created_at,
        })
        .chain(exits.into_iter().map(|e| HistoryRow {
            kind: "Exit",
            code: e.code,
            quantity: e.quantity,
            detail: e.description.unwrap_or_default(),
            created_at: e.created_at,
        }))
        .collect();
    history.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(StockFormTemplate {
        suppliers: supplier_options(&state.db, stock.supplier_id).await?,
        stock,
        product_name,
        history,
    })
}

/// A form posted without the rendered quantity is treated as a change from
/// the submitted value, so it books nothing.
fn expected_quantity(form: &StockForm) -> Result<i32, AppError> {
    if form.expected_quantity.trim().is_empty() {
        parse_quantity(&form.quantity, "Quantity")
    } else {
        parse_quantity(&form.expected_quantity, "Expected quantity")
    }
}

/// Saves an administrative edit. The difference between the submitted and
/// the rendered quantity is booked as one entry or exit on top of the
/// current stock.
pub async fn update_stock(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(stock_id): Path<Uuid>,
    Form(form): Form<StockForm>,
) -> Result<Redirect, AppError> {
    let current_user = require_user(&cookies, &state).await?;

    let edit = StockEdit {
        supplier_id: parse_optional_uuid(&form.supplier_id)?,
        expected_quantity: expected_quantity(&form)?,
        quantity: parse_quantity(&form.quantity, "Quantity")?,
        minimal_quantity: parse_quantity(&form.minimal_quantity, "Minimal quantity")?,
        max_quantity: parse_quantity(&form.max_quantity, "Maximum quantity")?,
    };

    let outcome = state
        .ledger
        .apply_edit(stock_id, edit, Some(current_user.id))
        .await?;
    log::info!(
        "stock {} saved by {} (quantity {})",
        outcome.stock.code,
        current_user.email,
        outcome.stock.quantity
    );

    Ok(redirect_with_notice("/stocks", outcome.alert.as_ref()))
}
