use axum::{
    extract::{Form, Path, State},
    response::Redirect,
};
use askama::Template;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::require_user,
    models::Supplier,
    state::AppState,
    utils::new_code,
};

#[derive(Template)]
#[template(path = "suppliers.html")]
pub struct SuppliersTemplate {
    suppliers: Vec<Supplier>,
}

#[derive(Deserialize)]
pub struct SupplierForm {
    name: String,
}

pub async fn suppliers_list(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<SuppliersTemplate, AppError> {
    require_user(&cookies, &state).await?;

    let suppliers = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers ORDER BY name")
        .fetch_all(&state.db)
        .await?;

    Ok(SuppliersTemplate { suppliers })
}

pub async fn create_supplier(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<SupplierForm>,
) -> Result<Redirect, AppError> {
    let current_user = require_user(&cookies, &state).await?;

    let name = form.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Supplier name is required"));
    }

    sqlx::query("INSERT INTO suppliers (code, name, user_id) VALUES ($1, $2, $3)")
        .bind(new_code())
        .bind(name)
        .bind(current_user.id)
        .execute(&state.db)
        .await?;

    Ok(Redirect::to("/suppliers"))
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(supplier_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    require_user(&cookies, &state).await?;

    let deleted = sqlx::query("DELETE FROM suppliers WHERE id = $1")
        .bind(supplier_id)
        .execute(&state.db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::NotFound("supplier"));
    }

    Ok(Redirect::to("/suppliers"))
}
