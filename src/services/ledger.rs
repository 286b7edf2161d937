use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{LedgerFact, MovementKind, NewMovement, Product, Stock, StockSettings},
    store::{InventoryStore, StoreError},
};

use super::threshold::{Alert, ThresholdMonitor, Watch};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i32, requested: i32 },

    #[error("invalid thresholds: minimal {minimal}, maximum {max}")]
    InvalidThresholds { minimal: i32, max: i32 },

    #[error("product {0} has no stock")]
    MissingStock(Uuid),

    #[error("stock {0} not found")]
    UnknownStock(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a ledger operation did: the fact it wrote (none for an unchanged
/// quantity), the stock afterwards, and the threshold alert if one fired.
#[derive(Debug, Clone)]
pub struct LedgerOutcome {
    pub fact: Option<LedgerFact>,
    pub stock: Stock,
    pub alert: Option<Alert>,
}

/// Administrative edit of a stock row. `expected_quantity` is the quantity
/// the form was rendered with; only the difference to it is booked, so
/// movements recorded meanwhile are kept.
#[derive(Debug, Clone)]
pub struct StockEdit {
    pub supplier_id: Option<Uuid>,
    pub expected_quantity: i32,
    pub quantity: i32,
    pub minimal_quantity: i32,
    pub max_quantity: i32,
}

pub struct StockLedger {
    store: Arc<dyn InventoryStore>,
    monitor: ThresholdMonitor,
}

impl StockLedger {
    pub fn new(store: Arc<dyn InventoryStore>, monitor: ThresholdMonitor) -> Self {
        Self { store, monitor }
    }

    pub async fn record_entry(
        &self,
        product: &Product,
        quantity: i32,
        supplier_id: Option<Uuid>,
        actor: Option<Uuid>,
    ) -> Result<LedgerOutcome, LedgerError> {
        ensure_positive(quantity)?;
        let stock = self.stock_of(product).await?;

        let movement = NewMovement {
            kind: MovementKind::Entry,
            stock_id: stock.id,
            product_id: Some(product.id),
            supplier_id: supplier_id.or(stock.supplier_id),
            description: None,
            user_id: actor,
            quantity,
        };
        let (fact, stock) = self.store.apply_movement(movement).await?;
        log::info!("{} units added to stock {} ({})", quantity, stock.code, product);

        let alert = self.monitor.check(&stock, product, Watch::Overstock).await?;
        Ok(LedgerOutcome {
            fact: Some(fact),
            stock,
            alert,
        })
    }

    /// Books a withdrawal. Exits larger than the quantity on hand are
    /// rejected; stock never goes negative.
    pub async fn record_exit(
        &self,
        product: &Product,
        quantity: i32,
        description: Option<String>,
        actor: Option<Uuid>,
    ) -> Result<LedgerOutcome, LedgerError> {
        ensure_positive(quantity)?;
        let stock = self.stock_of(product).await?;
        ensure_available(&stock, quantity)?;

        let movement = NewMovement {
            kind: MovementKind::Exit,
            stock_id: stock.id,
            product_id: Some(product.id),
            supplier_id: None,
            description,
            user_id: actor,
            quantity,
        };
        let (fact, stock) = self.store.apply_movement(movement).await?;
        log::info!("{} units removed from stock {} ({})", quantity, stock.code, product);

        let alert = self.monitor.check(&stock, product, Watch::Understock).await?;
        Ok(LedgerOutcome {
            fact: Some(fact),
            stock,
            alert,
        })
    }

    /// Brings a stock to `new_quantity` through exactly one entry or exit
    /// for the difference, then checks both thresholds. An unchanged
    /// quantity writes nothing, so replaying the same target is a no-op for
    /// the ledger.
    pub async fn reconcile(
        &self,
        stock_id: Uuid,
        new_quantity: i32,
        actor: Option<Uuid>,
    ) -> Result<LedgerOutcome, LedgerError> {
        if new_quantity < 0 {
            return Err(LedgerError::InvalidQuantity(new_quantity));
        }
        let stock = self.load(stock_id).await?;

        let old_quantity = stock.quantity;
        let movement = adjustment(&stock, stock.supplier_id, new_quantity - old_quantity, actor)?;
        let (fact, stock) = match movement {
            Some(movement) => {
                let (fact, stock) = self.store.apply_movement(movement).await?;
                log::info!(
                    "stock {} adjusted from {} to {}",
                    stock.code,
                    old_quantity,
                    stock.quantity
                );
                (Some(fact), stock)
            }
            None => (None, stock),
        };

        let alert = self.check_both(&stock).await?;
        Ok(LedgerOutcome { fact, stock, alert })
    }

    /// Saves an administrative edit: the settings and the booked difference
    /// between `quantity` and `expected_quantity` land together or not at all.
    pub async fn apply_edit(
        &self,
        stock_id: Uuid,
        edit: StockEdit,
        actor: Option<Uuid>,
    ) -> Result<LedgerOutcome, LedgerError> {
        if edit.minimal_quantity < 0 || edit.max_quantity < edit.minimal_quantity {
            return Err(LedgerError::InvalidThresholds {
                minimal: edit.minimal_quantity,
                max: edit.max_quantity,
            });
        }
        for quantity in [edit.quantity, edit.expected_quantity] {
            if quantity < 0 {
                return Err(LedgerError::InvalidQuantity(quantity));
            }
        }

        let stock = self.load(stock_id).await?;
        let delta = edit.quantity - edit.expected_quantity;
        if stock.quantity != edit.expected_quantity {
            log::info!(
                "stock {} moved from {} to {} while being edited; booking {:+} on top",
                stock.code,
                edit.expected_quantity,
                stock.quantity,
                delta
            );
        }
        let movement = adjustment(&stock, edit.supplier_id, delta, actor)?;

        let settings = StockSettings {
            supplier_id: edit.supplier_id,
            minimal_quantity: edit.minimal_quantity,
            max_quantity: edit.max_quantity,
        };
        let (fact, stock) = match self.store.edit_stock(stock_id, settings, movement).await {
            Err(StoreError::NotFound(_)) => return Err(LedgerError::UnknownStock(stock_id)),
            other => other?,
        };
        if fact.is_some() {
            log::info!("stock {} adjusted by {:+} to {}", stock.code, delta, stock.quantity);
        }

        let alert = self.check_both(&stock).await?;
        Ok(LedgerOutcome { fact, stock, alert })
    }

    async fn load(&self, stock_id: Uuid) -> Result<Stock, LedgerError> {
        self.store
            .stock(stock_id)
            .await?
            .ok_or(LedgerError::UnknownStock(stock_id))
    }

    async fn check_both(&self, stock: &Stock) -> Result<Option<Alert>, LedgerError> {
        let product = match stock.product_id {
            Some(product_id) => self.store.product(product_id).await?,
            None => None,
        };
        match product {
            Some(product) => Ok(self.monitor.check(stock, &product, Watch::Both).await?),
            None => {
                log::debug!("stock {} has no product; threshold check skipped", stock.code);
                Ok(None)
            }
        }
    }

    async fn stock_of(&self, product: &Product) -> Result<Stock, LedgerError> {
        self.store
            .stock_for_product(product.id)
            .await?
            .ok_or(LedgerError::MissingStock(product.id))
    }
}

/// The single entry or exit that moves `stock` by `delta`, if any.
fn adjustment(
    stock: &Stock,
    supplier_id: Option<Uuid>,
    delta: i32,
    actor: Option<Uuid>,
) -> Result<Option<NewMovement>, LedgerError> {
    if delta == 0 {
        return Ok(None);
    }
    let kind = if delta > 0 {
        MovementKind::Entry
    } else {
        ensure_available(stock, -delta)?;
        MovementKind::Exit
    };
    Ok(Some(NewMovement {
        kind,
        stock_id: stock.id,
        product_id: stock.product_id,
        supplier_id: match kind {
            MovementKind::Entry => supplier_id,
            MovementKind::Exit => None,
        },
        description: match kind {
            MovementKind::Entry => None,
            MovementKind::Exit => Some("Stock adjustment".to_string()),
        },
        user_id: actor,
        quantity: delta.abs(),
    }))
}

fn ensure_positive(quantity: i32) -> Result<(), LedgerError> {
    if quantity > 0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidQuantity(quantity))
    }
}

fn ensure_available(stock: &Stock, requested: i32) -> Result<(), LedgerError> {
    if requested > stock.quantity {
        return Err(LedgerError::InsufficientStock {
            available: stock.quantity,
            requested,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{NewProduct, StockSettings},
        services::{
            notifier::{testing::RecordingChannel, NotificationDispatcher},
            threshold::StockLevel,
        },
        store::InMemoryStore,
    };
    use rust_decimal::Decimal;

    struct Fixture {
        store: Arc<InMemoryStore>,
        channel: Arc<RecordingChannel>,
        ledger: StockLedger,
        owner: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let channel = Arc::new(RecordingChannel::default());
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), channel.clone()));
        let ledger = StockLedger::new(store.clone(), ThresholdMonitor::new(dispatcher));
        Fixture {
            store,
            channel,
            ledger,
            owner: Uuid::new_v4(),
        }
    }

    async fn product(f: &Fixture, minimal: i32, max: i32) -> Product {
        let (product, _) = f
            .store
            .create_product_with_stock(
                NewProduct {
                    name: "Bolt".to_string(),
                    description: None,
                    base_price: Decimal::new(250, 2),
                    user_id: Some(f.owner),
                    category_ids: vec![],
                },
                StockSettings {
                    supplier_id: None,
                    minimal_quantity: minimal,
                    max_quantity: max,
                },
            )
            .await
            .unwrap();
        product
    }

    async fn stock(f: &Fixture, product: &Product) -> Stock {
        f.store.stock_for_product(product.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn quantity_is_entries_minus_exits() {
        let f = fixture();
        let product = product(&f, 0, 1_000).await;

        let entries = [5, 12, 3, 40];
        let exits = [2, 10, 7];
        for q in entries {
            f.ledger.record_entry(&product, q, None, None).await.unwrap();
        }
        for q in exits {
            f.ledger.record_exit(&product, q, None, None).await.unwrap();
        }

        let expected: i32 = entries.iter().sum::<i32>() - exits.iter().sum::<i32>();
        assert_eq!(stock(&f, &product).await.quantity, expected);
        assert_eq!(f.store.entries().len(), entries.len());
        assert_eq!(f.store.exits().len(), exits.len());
    }

    #[tokio::test]
    async fn each_movement_writes_one_matching_fact() {
        let f = fixture();
        let product = product(&f, 0, 100).await;
        let supplier = Uuid::new_v4();

        let outcome = f.ledger.record_entry(&product, 8, Some(supplier), None).await.unwrap();
        let fact = outcome.fact.unwrap();
        assert_eq!(fact.kind(), MovementKind::Entry);
        assert_eq!(fact.quantity(), 8);
        assert_eq!(fact.product_id(), Some(product.id));
        assert_eq!(fact.stock_id(), Some(outcome.stock.id));
        assert_eq!(f.store.entries()[0].supplier_id, Some(supplier));

        let outcome = f
            .ledger
            .record_exit(&product, 3, Some("sold".to_string()), None)
            .await
            .unwrap();
        let fact = outcome.fact.unwrap();
        assert_eq!(fact.kind(), MovementKind::Exit);
        assert_eq!(fact.quantity(), 3);
        assert_eq!(fact.stock_id(), Some(outcome.stock.id));
        assert_eq!(f.store.exits()[0].description.as_deref(), Some("sold"));
        assert_eq!(outcome.stock.quantity, 5);
    }

    #[tokio::test]
    async fn non_positive_quantities_are_rejected() {
        let f = fixture();
        let product = product(&f, 0, 10).await;

        assert!(matches!(
            f.ledger.record_entry(&product, 0, None, None).await,
            Err(LedgerError::InvalidQuantity(0))
        ));
        assert!(matches!(
            f.ledger.record_exit(&product, -4, None, None).await,
            Err(LedgerError::InvalidQuantity(-4))
        ));
        assert!(f.store.entries().is_empty());
        assert!(f.store.exits().is_empty());
    }

    #[tokio::test]
    async fn exit_beyond_available_stock_is_rejected() {
        let f = fixture();
        let product = product(&f, 0, 10).await;
        f.ledger.record_entry(&product, 4, None, None).await.unwrap();

        let err = f.ledger.record_exit(&product, 5, None, None).await.unwrap_err();

        assert!(matches!(
            err,
            LedgerError::InsufficientStock {
                available: 4,
                requested: 5
            }
        ));
        assert_eq!(stock(&f, &product).await.quantity, 4);
        assert!(f.store.exits().is_empty());
    }

    #[tokio::test]
    async fn product_without_stock_cannot_move() {
        let f = fixture();
        // Never stored, so it has no stock either.
        let now = chrono::Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            code: "LOOSE".to_string(),
            name: "Loose".to_string(),
            description: None,
            base_price: Decimal::ONE,
            user_id: None,
            created_at: now,
            updated_at: now,
        };

        assert!(matches!(
            f.ledger.record_entry(&product, 1, None, None).await,
            Err(LedgerError::MissingStock(id)) if id == product.id
        ));
    }

    async fn stock_at_ten(f: &Fixture) -> Stock {
        let product = product(f, 5, 20).await;
        let stock = stock(f, &product).await;
        f.ledger.reconcile(stock.id, 10, None).await.unwrap();
        f.channel.published.lock().unwrap().clear();
        stock
    }

    #[tokio::test]
    async fn dropping_below_minimum_sends_one_low_alert() {
        let f = fixture();
        let stock = stock_at_ten(&f).await;

        let outcome = f.ledger.reconcile(stock.id, 3, None).await.unwrap();

        let alert = outcome.alert.unwrap();
        assert_eq!(alert.level, StockLevel::Low);
        assert!(alert.delivered);
        assert!(alert.notification.body.contains("below the minimal quantity"));
        assert_eq!(f.store.notifications().len(), 1);
        assert_eq!(f.channel.published().len(), 1);
        assert_eq!(f.channel.published()[0].0, f.owner.to_string());
    }

    #[tokio::test]
    async fn rising_above_maximum_sends_one_high_alert() {
        let f = fixture();
        let stock = stock_at_ten(&f).await;

        let outcome = f.ledger.reconcile(stock.id, 25, None).await.unwrap();

        assert_eq!(outcome.alert.unwrap().level, StockLevel::High);
        assert_eq!(f.store.notifications().len(), 1);
        assert_eq!(f.channel.published().len(), 1);
    }

    #[tokio::test]
    async fn staying_in_range_sends_nothing() {
        let f = fixture();
        let stock = stock_at_ten(&f).await;

        let outcome = f.ledger.reconcile(stock.id, 8, None).await.unwrap();

        assert!(outcome.alert.is_none());
        assert!(f.store.notifications().is_empty());
        assert!(f.channel.published().is_empty());
    }

    #[tokio::test]
    async fn reconcile_writes_one_fact_for_the_delta() {
        let f = fixture();
        let stock = stock_at_ten(&f).await;
        assert_eq!(f.store.entries().len(), 1);

        let outcome = f.ledger.reconcile(stock.id, 7, None).await.unwrap();
        assert_eq!(outcome.stock.quantity, 7);
        let exits = f.store.exits();
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].quantity, 3);
        assert_eq!(exits[0].stock_id, Some(stock.id));

        // Replaying the same edit books nothing further.
        let replay = f.ledger.reconcile(stock.id, 7, None).await.unwrap();
        assert!(replay.fact.is_none());
        assert_eq!(f.store.exits().len(), 1);
        assert_eq!(f.store.entries().len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_alert_refires_on_every_save() {
        let f = fixture();
        let stock = stock_at_ten(&f).await;

        f.ledger.reconcile(stock.id, 2, None).await.unwrap();
        let again = f.ledger.reconcile(stock.id, 2, None).await.unwrap();

        assert!(again.fact.is_none());
        assert_eq!(again.alert.unwrap().level, StockLevel::Low);
        assert_eq!(f.store.notifications().len(), 2);
    }

    #[tokio::test]
    async fn entries_only_report_overstock() {
        let f = fixture();
        let product = product(&f, 5, 20).await;

        // 0 -> 2 is still below the minimum, but an entry never reports that.
        let outcome = f.ledger.record_entry(&product, 2, None, None).await.unwrap();
        assert!(outcome.alert.is_none());

        let outcome = f.ledger.record_entry(&product, 30, None, None).await.unwrap();
        assert_eq!(outcome.alert.unwrap().level, StockLevel::High);
    }

    #[tokio::test]
    async fn exits_only_report_understock() {
        let f = fixture();
        let product = product(&f, 5, 20).await;
        f.ledger.record_entry(&product, 30, None, None).await.unwrap();
        f.channel.published.lock().unwrap().clear();

        // 30 -> 25 is still above the maximum, but an exit never reports that.
        let outcome = f.ledger.record_exit(&product, 5, None, None).await.unwrap();
        assert!(outcome.alert.is_none());

        let outcome = f.ledger.record_exit(&product, 22, None, None).await.unwrap();
        assert_eq!(outcome.alert.unwrap().level, StockLevel::Low);
        assert_eq!(f.channel.published().len(), 1);
    }

    fn edit(expected_quantity: i32, quantity: i32, minimal: i32, max: i32) -> StockEdit {
        StockEdit {
            supplier_id: None,
            expected_quantity,
            quantity,
            minimal_quantity: minimal,
            max_quantity: max,
        }
    }

    #[tokio::test]
    async fn apply_edit_saves_thresholds_before_checking() {
        let f = fixture();
        let stock = stock_at_ten(&f).await;
        let supplier = Uuid::new_v4();
        let actor = Uuid::new_v4();

        let outcome = f
            .ledger
            .apply_edit(
                stock.id,
                StockEdit {
                    supplier_id: Some(supplier),
                    ..edit(10, 12, 15, 40)
                },
                Some(actor),
            )
            .await
            .unwrap();

        assert_eq!(outcome.stock.minimal_quantity, 15);
        assert_eq!(outcome.stock.supplier_id, Some(supplier));
        assert_eq!(outcome.stock.quantity, 12);
        assert_eq!(outcome.alert.unwrap().level, StockLevel::Low);
        let entry = f.store.entries().last().cloned().unwrap();
        assert_eq!(entry.supplier_id, Some(supplier));
        assert_eq!(entry.user_id, Some(actor));
    }

    #[tokio::test]
    async fn apply_edit_rejects_inverted_thresholds() {
        let f = fixture();
        let stock = stock_at_ten(&f).await;

        let err = f
            .ledger
            .apply_edit(stock.id, edit(10, 10, 30, 10), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidThresholds { .. }));
    }

    #[tokio::test]
    async fn rejected_edit_keeps_previous_thresholds() {
        let f = fixture();
        let stock = stock_at_ten(&f).await;

        let err = f
            .ledger
            .apply_edit(stock.id, edit(10, -1, 15, 40), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity(-1)));

        // Draining more than is on hand is refused before anything is saved.
        let err = f
            .ledger
            .apply_edit(stock.id, edit(30, 0, 15, 40), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { .. }));

        let after = f.store.stock(stock.id).await.unwrap().unwrap();
        assert_eq!((after.minimal_quantity, after.max_quantity), (5, 20));
        assert_eq!(after.quantity, 10);
        assert!(f.store.exits().is_empty());
    }

    #[tokio::test]
    async fn stale_edit_keeps_movements_booked_meanwhile() {
        let f = fixture();
        let stock = stock_at_ten(&f).await;
        let product = f.store.product(stock.product_id.unwrap()).await.unwrap().unwrap();

        // The form was rendered at 10, then 5 units left the stock.
        f.ledger.record_exit(&product, 5, None, None).await.unwrap();
        let outcome = f
            .ledger
            .apply_edit(stock.id, edit(10, 10, 2, 30), None)
            .await
            .unwrap();

        assert!(outcome.fact.is_none());
        assert_eq!(outcome.stock.quantity, 5);
        assert_eq!(outcome.stock.minimal_quantity, 2);
        assert_eq!(f.store.entries().len(), 1);

        // A real change is applied on top of the current quantity.
        let outcome = f
            .ledger
            .apply_edit(stock.id, edit(10, 13, 2, 30), None)
            .await
            .unwrap();
        assert_eq!(outcome.fact.unwrap().quantity(), 3);
        assert_eq!(outcome.stock.quantity, 8);
    }

    #[tokio::test]
    async fn apply_edit_on_unknown_stock_fails() {
        let f = fixture();
        let id = Uuid::new_v4();
        assert!(matches!(
            f.ledger.apply_edit(id, edit(0, 1, 0, 5), None).await,
            Err(LedgerError::UnknownStock(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn reconcile_unknown_stock_fails() {
        let f = fixture();
        let id = Uuid::new_v4();
        assert!(matches!(
            f.ledger.reconcile(id, 1, None).await,
            Err(LedgerError::UnknownStock(missing)) if missing == id
        ));
    }
}
