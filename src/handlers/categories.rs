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
    handlers::non_empty,
    middleware::require_user,
    models::CategoryDisplay,
    state::AppState,
};

#[derive(Template)]
#[template(path = "categories.html")]
pub struct CategoriesTemplate {
    categories: Vec<CategoryDisplay>,
}

#[derive(Deserialize)]
pub struct CategoryForm {
    name: String,
    #[serde(default)]
    description: String,
}

pub async fn categories_list(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<CategoriesTemplate, AppError> {
    require_user(&cookies, &state).await?;

    let categories = sqlx::query_as::<_, CategoryDisplay>(
        r#"
        SELECT c.id, c.name, COALESCE(c.description, '') AS description,
               COUNT(pc.product_id) AS product_count
        FROM categories c
        LEFT JOIN product_categories pc ON pc.category_id = c.id
        GROUP BY c.id
        ORDER BY c.name
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(CategoriesTemplate { categories })
}

pub async fn create_category(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect, AppError> {
    require_user(&cookies, &state).await?;

    let name = form.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Category name is required"));
    }

    sqlx::query("INSERT INTO categories (name, description) VALUES ($1, $2)")
        .bind(name)
        .bind(non_empty(form.description))
        .execute(&state.db)
        .await?;

    Ok(Redirect::to("/categories"))
}

pub async fn delete_category(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(category_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    require_user(&cookies, &state).await?;

    let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(&state.db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::NotFound("category"));
    }

    Ok(Redirect::to("/categories"))
}
