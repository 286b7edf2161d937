use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Raw `label, count` row from a dashboard grouping query.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CountRow {
    pub label: String,
    pub count: i64,
}

/// A group's product count and its share of all counted products.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub label: String,
    pub count: i64,
    pub percent: f64,
}

/// Turns grouped counts into percentages of their sum, rounded to one
/// decimal. Groups with no products stay listed at 0 %.
pub fn shares(rows: Vec<CountRow>) -> Vec<Share> {
    let total: i64 = rows.iter().map(|r| r.count).sum();
    rows.into_iter()
        .map(|r| {
            let percent = if total == 0 {
                0.0
            } else {
                (r.count as f64 * 1000.0 / total as f64).round() / 10.0
            };
            Share {
                label: r.label,
                count: r.count,
                percent,
            }
        })
        .collect()
}
