use std::sync::Arc;

use serde::Serialize;

use crate::{
    models::{Notification, Product, Stock},
    store::StoreResult,
};

use super::notifier::NotificationDispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StockLevel {
    Low,
    Normal,
    High,
}

impl StockLevel {
    pub fn label(&self) -> &'static str {
        match self {
            StockLevel::Low => "Low",
            StockLevel::Normal => "Normal",
            StockLevel::High => "High",
        }
    }
}

/// Strict comparison: sitting exactly on a bound is still normal.
pub fn classify(quantity: i32, minimal_quantity: i32, max_quantity: i32) -> StockLevel {
    if quantity < minimal_quantity {
        StockLevel::Low
    } else if quantity > max_quantity {
        StockLevel::High
    } else {
        StockLevel::Normal
    }
}

/// Which breach directions a check reports. Entries can only overfill a
/// stock and exits can only drain it; direct edits watch both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watch {
    Understock,
    Overstock,
    Both,
}

impl Watch {
    fn admits(&self, level: StockLevel) -> bool {
        matches!(
            (self, level),
            (Watch::Understock | Watch::Both, StockLevel::Low)
                | (Watch::Overstock | Watch::Both, StockLevel::High)
        )
    }
}

pub fn alert_message(product: &Product, stock: &Stock, level: StockLevel) -> Option<String> {
    match level {
        StockLevel::Low => Some(format!(
            "Stock for product \"{}\" is below the minimal quantity ({} < {})",
            product, stock.quantity, stock.minimal_quantity
        )),
        StockLevel::High => Some(format!(
            "Stock for product \"{}\" is above the maximum quantity ({} > {})",
            product, stock.quantity, stock.max_quantity
        )),
        StockLevel::Normal => None,
    }
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub level: StockLevel,
    pub notification: Notification,
    pub delivered: bool,
}

pub struct ThresholdMonitor {
    dispatcher: Arc<NotificationDispatcher>,
}

impl ThresholdMonitor {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Notifies the product owner when the stock sits outside its bounds.
    /// Every call re-evaluates; an already reported breach is reported again.
    pub async fn check(
        &self,
        stock: &Stock,
        product: &Product,
        watch: Watch,
    ) -> StoreResult<Option<Alert>> {
        let level = stock.level();
        if !watch.admits(level) {
            return Ok(None);
        }
        let Some(message) = alert_message(product, stock, level) else {
            return Ok(None);
        };

        log::warn!("stock {} ({}) is {}: {}", stock.code, product, level.label(), message);

        let Some(owner) = product.user_id else {
            log::warn!("product {} has no owner; threshold alert not sent", product.id);
            return Ok(None);
        };

        let (notification, delivered) = self.dispatcher.send(owner, &message).await?;
        Ok(Some(Alert {
            level,
            notification,
            delivered,
        }))
    }
}
