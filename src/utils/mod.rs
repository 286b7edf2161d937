pub mod auth;
pub mod code;

pub use auth::{create_token, hash_password, verify_password, verify_token};
pub use code::{generate_code, new_code};
