use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
};
use askama::Template;
use serde::Deserialize;
use tower_cookies::{Cookie, Cookies};

use crate::{
    middleware::AUTH_COOKIE,
    models::{CreateUser, User},
    state::AppState,
    utils::{auth::SESSION_HOURS, create_token, hash_password, verify_password},
};

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    error: String,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    error: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
}

type PageError = (StatusCode, Html<String>);

fn login_error(status: StatusCode, message: &str) -> PageError {
    let page = LoginTemplate {
        error: message.to_string(),
    }
    .render()
    .unwrap_or_else(|_| message.to_string());
    (status, Html(page))
}

fn register_error(status: StatusCode, message: &str) -> PageError {
    let page = RegisterTemplate {
        error: message.to_string(),
    }
    .render()
    .unwrap_or_else(|_| message.to_string());
    (status, Html(page))
}

pub async fn login_page() -> LoginTemplate {
    LoginTemplate {
        error: String::new(),
    }
}

pub async fn register_page() -> RegisterTemplate {
    RegisterTemplate {
        error: String::new(),
    }
}

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, PageError> {
    let user = authenticate_user(&state, &form.email, &form.password)
        .await
        .ok_or_else(|| login_error(StatusCode::UNAUTHORIZED, "Invalid email or password"))?;

    let token = create_token(user.id, user.email.clone(), &state.config.jwt_secret)
        .map_err(|e| {
            log::error!("failed to sign session token: {}", e);
            login_error(StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed")
        })?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&state.db)
        .await
    {
        log::warn!("failed to record login for {}: {}", user.email, e);
    }

    // Set secure HTTP-only cookie with JWT token
    let cookie = Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::hours(SESSION_HOURS))
        .build();
    cookies.add(cookie);

    log::info!("user {} signed in", user.email);
    Ok(Redirect::to("/dashboard"))
}

pub async fn logout(cookies: Cookies) -> impl IntoResponse {
    cookies.remove(Cookie::build(AUTH_COOKIE).path("/").build());
    Redirect::to("/login")
}

pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect, PageError> {
    if form.password.len() < 8 {
        return Err(register_error(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters",
        ));
    }

    let password_hash = hash_password(&form.password).map_err(|_| {
        register_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process password")
    })?;

    let create_user = CreateUser {
        email: form.email.trim().to_lowercase(),
        password: form.password,
        first_name: form.first_name,
        last_name: form.last_name,
    };

    match create_user_in_db(&state, &create_user, &password_hash).await {
        Ok(user) => {
            log::info!("registered user {}", user.email);
            Ok(Redirect::to("/login"))
        }
        Err(e) => {
            log::warn!("registration failed for {}: {}", create_user.email, e);
            Err(register_error(
                StatusCode::BAD_REQUEST,
                "Email already exists or registration failed",
            ))
        }
    }
}

async fn authenticate_user(state: &AppState, email: &str, password: &str) -> Option<User> {
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE email = $1 AND is_active = true",
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(&state.db)
    .await
    .ok()??;

    verify_password(password, &user.password_hash)
        .unwrap_or(false)
        .then_some(user)
}

async fn create_user_in_db(
    state: &AppState,
    user_data: &CreateUser,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    // The first account becomes the superuser.
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name, is_superuser)
        VALUES ($1, $2, $3, $4, NOT EXISTS (SELECT 1 FROM users))
        RETURNING *
        "#,
    )
    .bind(&user_data.email)
    .bind(password_hash)
    .bind(&user_data.first_name)
    .bind(&user_data.last_name)
    .fetch_one(&state.db)
    .await?;

    Ok(user)
}
