use std::fmt::Display;

use askama::Result;

// Renders a price with two decimals, e.g. `{{ product.base_price|money }}`.
#[allow(clippy::unnecessary_wraps)]
pub fn money<T: Display>(value: T) -> Result<String> {
    Ok(format!("$ {:.2}", value))
}
