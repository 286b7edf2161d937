use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppError,
    models::User,
    state::AppState,
    utils::verify_token,
};

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
}

impl CurrentUser {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_superuser: user.is_superuser,
        }
    }
}

pub async fn get_current_user(cookies: &Cookies, state: &AppState) -> Option<CurrentUser> {
    // Try to get JWT token from auth_token cookie
    let token = cookies.get(AUTH_COOKIE)?.value().to_string();

    let claims = verify_token(&token, &state.config.jwt_secret).ok()?;
    let user_id = claims.user_id()?;

    get_user_by_id(&state.db, user_id).await
}

/// The signed-in user, or a redirect to the login page.
pub async fn require_user(cookies: &Cookies, state: &AppState) -> Result<CurrentUser, AppError> {
    get_current_user(cookies, state)
        .await
        .ok_or(AppError::Unauthorized)
}

pub async fn require_superuser(
    cookies: &Cookies,
    state: &AppState,
) -> Result<CurrentUser, AppError> {
    let user = require_user(cookies, state).await?;
    if !user.is_superuser {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

async fn get_user_by_id(db: &Database, user_id: Uuid) -> Option<CurrentUser> {
    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE id = $1 AND is_active = true",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await
    .map_err(|e| log::error!("failed to load user {}: {}", user_id, e))
    .ok()??;

    Some(CurrentUser::from(user))
}
