use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use axum_extra::extract::Form;
use askama::Template;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    filters,
    handlers::{
        category_options, non_empty, parse_optional_uuid, parse_quantity, redirect_with_notice,
        supplier_options, SearchQuery, SelectOption,
    },
    middleware::{require_superuser, require_user, CurrentUser},
    models::{NewProduct, Product, ProductChanges, ProductDisplay, StockSettings},
    state::AppState,
};

#[derive(Template)]
#[template(path = "products/products.html")]
pub struct ProductsTemplate {
    products: Vec<ProductDisplay>,
    search: String,
    notice: String,
    current_user: CurrentUser,
}

/// Form values; `id` is empty for a new product.
pub struct ProductFields {
    id: String,
    name: String,
    description: String,
    base_price: String,
}

impl From<&Product> for ProductFields {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone().unwrap_or_default(),
            base_price: product.base_price.to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "products/product_form.html")]
pub struct ProductFormTemplate {
    product: ProductFields,
    is_new: bool,
    categories: Vec<SelectOption>,
    suppliers: Vec<SelectOption>,
    stock_id: String,
}

#[derive(Deserialize)]
pub struct ProductForm {
    name: String,
    #[serde(default)]
    description: String,
    base_price: String,
    #[serde(default)]
    category_ids: Vec<Uuid>,
    #[serde(default)]
    supplier_id: String,
    #[serde(default)]
    initial_quantity: String,
}

impl ProductForm {
    fn price(&self) -> Result<Decimal, AppError> {
        let price: Decimal = self
            .base_price
            .trim()
            .parse()
            .map_err(|_| AppError::bad_request("Base price must be a number"))?;
        if price.is_sign_negative() {
            return Err(AppError::bad_request("Base price cannot be negative"));
        }
        Ok(price.round_dp(2))
    }

    fn name(&self) -> Result<String, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("Product name is required"));
        }
        Ok(name.to_string())
    }
}

pub async fn products_list(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<SearchQuery>,
) -> Result<ProductsTemplate, AppError> {
    let current_user = require_user(&cookies, &state).await?;
    let search = query.q.unwrap_or_default();

    let products = sqlx::query_as::<_, ProductDisplay>(
        r#"
        SELECT
            p.id,
            p.code,
            p.name,
            p.base_price,
            COALESCE(u.email, '') AS owner_email,
            COALESCE(string_agg(c.name, ', ' ORDER BY c.name), '') AS categories,
            COALESCE((
                SELECT s.quantity FROM stocks s
                WHERE s.product_id = p.id
                ORDER BY s.created_at, s.id
                LIMIT 1
            ), 0) AS quantity
        FROM products p
        LEFT JOIN users u ON u.id = p.user_id
        LEFT JOIN product_categories pc ON pc.product_id = p.id
        LEFT JOIN categories c ON c.id = pc.category_id
        WHERE ($1 = '' OR p.name ILIKE '%' || $1 || '%')
        GROUP BY p.id, u.email
        ORDER BY p.name
        "#,
    )
    .bind(search.trim())
    .fetch_all(&state.db)
    .await?;

    Ok(ProductsTemplate {
        products,
        search,
        notice: query.notice.unwrap_or_default(),
        current_user,
    })
}

pub async fn product_form(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<ProductFormTemplate, AppError> {
    require_user(&cookies, &state).await?;

    Ok(ProductFormTemplate {
        product: ProductFields {
            id: String::new(),
            name: String::new(),
            description: String::new(),
            base_price: String::new(),
        },
        is_new: true,
        categories: category_options(&state.db, &[]).await?,
        suppliers: supplier_options(&state.db, None).await?,
        stock_id: String::new(),
    })
}

pub async fn create_product(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<ProductForm>,
) -> Result<Redirect, AppError> {
    let current_user = require_user(&cookies, &state).await?;

    let name = form.name()?;
    let base_price = form.price()?;
    let supplier_id = parse_optional_uuid(&form.supplier_id)?;
    let initial_quantity = parse_quantity(&form.initial_quantity, "Initial quantity")?;

    // Every product gets exactly one stock row, written together with it.
    let (product, _stock) = state
        .store
        .create_product_with_stock(
            NewProduct {
                name,
                description: non_empty(form.description),
                base_price,
                user_id: Some(current_user.id),
                category_ids: form.category_ids,
            },
            StockSettings {
                supplier_id,
                minimal_quantity: state.config.stock_default_minimal,
                max_quantity: state.config.stock_default_max,
            },
        )
        .await?;
    log::info!("product {} ({}) created by {}", product.name, product.code, current_user.email);

    if initial_quantity > 0 {
        let outcome = state
            .ledger
            .record_entry(&product, initial_quantity, supplier_id, Some(current_user.id))
            .await?;
        return Ok(redirect_with_notice("/products", outcome.alert.as_ref()));
    }

    Ok(Redirect::to("/products"))
}

pub async fn product_edit_form(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(product_id): Path<Uuid>,
) -> Result<ProductFormTemplate, AppError> {
    require_user(&cookies, &state).await?;

    let product = state
        .store
        .product(product_id)
        .await?
        .ok_or(AppError::NotFound("product"))?;
    let stock = state.store.stock_for_product(product_id).await?;

    let selected: Vec<Uuid> = sqlx::query_scalar(
        "SELECT category_id FROM product_categories WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_all(&state.db)
    .await?;

    Ok(ProductFormTemplate {
        product: ProductFields::from(&product),
        is_new: false,
        categories: category_options(&state.db, &selected).await?,
        suppliers: supplier_options(&state.db, stock.as_ref().and_then(|s| s.supplier_id)).await?,
        stock_id: stock.map(|s| s.id.to_string()).unwrap_or_default(),
    })
}

pub async fn update_product(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(product_id): Path<Uuid>,
    Form(form): Form<ProductForm>,
) -> Result<Redirect, AppError> {
    require_user(&cookies, &state).await?;

    let name = form.name()?;
    let base_price = form.price()?;

    state
        .store
        .update_product(
            product_id,
            ProductChanges {
                name,
                description: non_empty(form.description),
                base_price,
                category_ids: form.category_ids,
            },
        )
        .await?;

    Ok(Redirect::to("/products"))
}

/// Deleting a product also erases its ledger history, so it is reserved to
/// superusers.
pub async fn delete_product(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(product_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let current_user = require_superuser(&cookies, &state).await?;

    if !state.store.delete_product(product_id).await? {
        return Err(AppError::NotFound("product"));
    }
    log::info!("product {} deleted by {}", product_id, current_user.email);

    Ok(Redirect::to("/products"))
}
