use axum::{
    extract::{Form, Query, State},
    response::Redirect,
};
use askama::Template;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::{
        non_empty, parse_optional_uuid, parse_quantity, product_options, redirect_with_notice,
        supplier_options, SearchQuery, SelectOption,
    },
    middleware::require_user,
    models::{ChangeLogRow, MovementDisplay, Product},
    state::AppState,
};

#[derive(Template)]
#[template(path = "movements/movements.html")]
pub struct MovementsTemplate {
    title: &'static str,
    new_path: &'static str,
    detail_label: &'static str,
    movements: Vec<MovementDisplay>,
    notice: String,
}

#[derive(Template)]
#[template(path = "movements/history.html")]
pub struct HistoryTemplate {
    rows: Vec<ChangeLogRow>,
}

#[derive(Template)]
#[template(path = "movements/movement_form.html")]
pub struct MovementFormTemplate {
    is_entry: bool,
    products: Vec<SelectOption>,
    suppliers: Vec<SelectOption>,
}

#[derive(Deserialize)]
pub struct EntryForm {
    product_id: Uuid,
    quantity: String,
    #[serde(default)]
    supplier_id: String,
}

#[derive(Deserialize)]
pub struct ExitForm {
    product_id: Uuid,
    quantity: String,
    #[serde(default)]
    description: String,
}

pub async fn entries_list(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<SearchQuery>,
) -> Result<MovementsTemplate, AppError> {
    require_user(&cookies, &state).await?;

    let movements = sqlx::query_as::<_, MovementDisplay>(
        r#"
        SELECT
            e.id,
            e.code,
            COALESCE(p.name, '') AS product_name,
            COALESCE(s.code, '') AS stock_code,
            COALESCE(sp.name, '') AS detail,
            COALESCE(u.email, '') AS actor,
            e.quantity,
            e.created_at
        FROM stock_entries e
        LEFT JOIN products p ON p.id = e.product_id
        LEFT JOIN stocks s ON s.id = e.stock_id
        LEFT JOIN suppliers sp ON sp.id = e.supplier_id
        LEFT JOIN users u ON u.id = e.user_id
        ORDER BY e.created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(MovementsTemplate {
        title: "Stock entries",
        new_path: "/entries/new",
        detail_label: "Supplier",
        movements,
        notice: query.notice.unwrap_or_default(),
    })
}

pub async fn exits_list(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<SearchQuery>,
) -> Result<MovementsTemplate, AppError> {
    require_user(&cookies, &state).await?;

    let movements = sqlx::query_as::<_, MovementDisplay>(
        r#"
        SELECT
            x.id,
            x.code,
            COALESCE(p.name, '') AS product_name,
            COALESCE(s.code, '') AS stock_code,
            COALESCE(x.description, '') AS detail,
            COALESCE(u.email, '') AS actor,
            x.quantity,
            x.created_at
        FROM stock_exits x
        LEFT JOIN products p ON p.id = x.product_id
        LEFT JOIN stocks s ON s.id = x.stock_id
        LEFT JOIN users u ON u.id = x.user_id
        ORDER BY x.created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(MovementsTemplate {
        title: "Stock exits",
        new_path: "/exits/new",
        detail_label: "Description",
        movements,
        notice: query.notice.unwrap_or_default(),
    })
}

/// GET /history
///
/// Every entry and exit, newest first, with the account that booked it.
pub async fn change_log(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<HistoryTemplate, AppError> {
    require_user(&cookies, &state).await?;

    let rows = sqlx::query_as::<_, ChangeLogRow>(
        r#"
        SELECT m.kind, m.code, COALESCE(p.name, '') AS product_name,
               COALESCE(u.email, '') AS actor, m.quantity, m.created_at
        FROM (
            SELECT 'entry' AS kind, code, product_id, user_id, quantity, created_at
            FROM stock_entries
            UNION ALL
            SELECT 'exit' AS kind, code, product_id, user_id, quantity, created_at
            FROM stock_exits
        ) m
        LEFT JOIN products p ON p.id = m.product_id
        LEFT JOIN users u ON u.id = m.user_id
        ORDER BY m.created_at DESC
        LIMIT 500
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(HistoryTemplate { rows })
}

pub async fn entry_form(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<MovementFormTemplate, AppError> {
    require_user(&cookies, &state).await?;

    Ok(MovementFormTemplate {
        is_entry: true,
        products: product_options(&state.db).await?,
        suppliers: supplier_options(&state.db, None).await?,
    })
}

pub async fn exit_form(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<MovementFormTemplate, AppError> {
    require_user(&cookies, &state).await?;

    Ok(MovementFormTemplate {
        is_entry: false,
        products: product_options(&state.db).await?,
        suppliers: Vec::new(),
    })
}

async fn load_product(state: &AppState, product_id: Uuid) -> Result<Product, AppError> {
    state
        .store
        .product(product_id)
        .await?
        .ok_or(AppError::NotFound("product"))
}

pub async fn create_entry(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<EntryForm>,
) -> Result<Redirect, AppError> {
    let current_user = require_user(&cookies, &state).await?;

    let product = load_product(&state, form.product_id).await?;
    let quantity = parse_quantity(&form.quantity, "Quantity")?;
    let supplier_id = parse_optional_uuid(&form.supplier_id)?;

    let outcome = state
        .ledger
        .record_entry(&product, quantity, supplier_id, Some(current_user.id))
        .await?;
    Ok(redirect_with_notice("/entries", outcome.alert.as_ref()))
}

pub async fn create_exit(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<ExitForm>,
) -> Result<Redirect, AppError> {
    let current_user = require_user(&cookies, &state).await?;

    let product = load_product(&state, form.product_id).await?;
    let quantity = parse_quantity(&form.quantity, "Quantity")?;

    let outcome = state
        .ledger
        .record_exit(&product, quantity, non_empty(form.description), Some(current_user.id))
        .await?;
    Ok(redirect_with_notice("/exits", outcome.alert.as_ref()))
}
