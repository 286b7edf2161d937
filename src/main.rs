mod config;
mod database;
mod error;
mod filters;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;
mod store;
mod utils;

use axum::{
    extract::DefaultBodyLimit,
    response::Redirect,
    routing::{get, post},
    Router,
};
use dotenvy::dotenv;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use config::Config;
use database::create_database_pool;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    let config = Config::from_env()?;
    let db = create_database_pool(&config.database_url).await?;

    let addr = config.bind_addr();
    let app = create_router(AppState::new(db, config));

    log::info!("stockroom listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        // Public routes (no authentication required)
        .route("/", get(|| async { Redirect::permanent("/login") }))
        .route("/login", get(handlers::auth::login_page).post(handlers::auth::login))
        .route("/register", get(handlers::auth::register_page).post(handlers::auth::register))
        .route("/logout", post(handlers::auth::logout))

        // Protected routes (authentication required)
        .route("/dashboard", get(handlers::dashboard))

        // Catalog
        .route("/products", get(handlers::products::products_list).post(handlers::products::create_product))
        .route("/products/new", get(handlers::products::product_form))
        .route("/products/:id/edit", get(handlers::products::product_edit_form))
        .route("/products/:id", post(handlers::products::update_product))
        .route("/products/:id/delete", post(handlers::products::delete_product))
        .route("/categories", get(handlers::categories::categories_list).post(handlers::categories::create_category))
        .route("/categories/:id/delete", post(handlers::categories::delete_category))
        .route("/suppliers", get(handlers::suppliers::suppliers_list).post(handlers::suppliers::create_supplier))
        .route("/suppliers/:id/delete", post(handlers::suppliers::delete_supplier))

        // Stock and movements (entries and exits are never edited)
        .route("/stocks", get(handlers::stock::stocks_list))
        .route("/stocks/:id/edit", get(handlers::stock::stock_edit_form))
        .route("/stocks/:id", post(handlers::stock::update_stock))
        .route("/entries", get(handlers::movements::entries_list).post(handlers::movements::create_entry))
        .route("/entries/new", get(handlers::movements::entry_form))
        .route("/exits", get(handlers::movements::exits_list).post(handlers::movements::create_exit))
        .route("/exits/new", get(handlers::movements::exit_form))
        .route("/history", get(handlers::movements::change_log))

        // Notifications
        .route("/notifications", get(handlers::notifications::notifications_list))
        .route("/notifications/read", post(handlers::notifications::mark_all_read))
        .route("/notifications/:id/read", post(handlers::notifications::mark_read))

        // Push channel
        .route("/stock/channel/register/", get(handlers::events::register_channel))
        .route("/stock/sse/", get(handlers::events::hello))
        .route("/events/:channel/", get(handlers::events::subscribe))

        // Static files
        .nest_service("/static", ServeDir::new("static"))

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(2 * 1024 * 1024)),
        )
        .with_state(state)
}
