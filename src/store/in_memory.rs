use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    models::{
        LedgerFact, MovementKind, NewMovement, NewProduct, Notification, Product, ProductChanges,
        Stock, StockEntry, StockExit, StockSettings,
    },
    utils::new_code,
};

use super::{InventoryStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    products: Vec<Product>,
    product_categories: Vec<(Uuid, Uuid)>,
    stocks: Vec<Stock>,
    entries: Vec<StockEntry>,
    exits: Vec<StockExit>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn record_fact(&mut self, movement: NewMovement) -> LedgerFact {
        let now = Utc::now();
        match movement.kind {
            MovementKind::Entry => {
                let entry = StockEntry {
                    id: Uuid::new_v4(),
                    code: new_code(),
                    stock_id: Some(movement.stock_id),
                    product_id: movement.product_id,
                    supplier_id: movement.supplier_id,
                    user_id: movement.user_id,
                    quantity: movement.quantity,
                    created_at: now,
                };
                self.entries.push(entry.clone());
                LedgerFact::Entry(entry)
            }
            MovementKind::Exit => {
                let exit = StockExit {
                    id: Uuid::new_v4(),
                    code: new_code(),
                    stock_id: Some(movement.stock_id),
                    product_id: movement.product_id,
                    description: movement.description,
                    user_id: movement.user_id,
                    quantity: movement.quantity,
                    created_at: now,
                };
                self.exits.push(exit.clone());
                LedgerFact::Exit(exit)
            }
        }
    }
}

// Mirrors the CHECK constraints of the schema.
fn check_settings(settings: &StockSettings) -> StoreResult<()> {
    if settings.minimal_quantity < 0 || settings.max_quantity < 0 {
        return Err(StoreError::Constraint("thresholds must be non-negative".to_string()));
    }
    Ok(())
}

fn moved_quantity(stock: &Stock, delta: i32) -> StoreResult<i32> {
    stock
        .quantity
        .checked_add(delta)
        .filter(|q| *q >= 0)
        .ok_or_else(|| StoreError::Constraint("stock quantity must be non-negative".to_string()))
}

/// Process-local store with the same semantics as [`super::PgStore`].
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn entries(&self) -> Vec<StockEntry> {
        self.lock().map(|t| t.entries.clone()).unwrap_or_default()
    }

    pub fn exits(&self) -> Vec<StockExit> {
        self.lock().map(|t| t.exits.clone()).unwrap_or_default()
    }

    pub fn stocks(&self) -> Vec<Stock> {
        self.lock().map(|t| t.stocks.clone()).unwrap_or_default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().map(|t| t.notifications.clone()).unwrap_or_default()
    }

    pub fn categories_of(&self, product_id: Uuid) -> Vec<Uuid> {
        self.lock()
            .map(|t| {
                t.product_categories
                    .iter()
                    .filter(|(p, _)| *p == product_id)
                    .map(|(_, c)| *c)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn create_product_with_stock(
        &self,
        product: NewProduct,
        settings: StockSettings,
    ) -> StoreResult<(Product, Stock)> {
        check_settings(&settings)?;

        let now = Utc::now();
        let created = Product {
            id: Uuid::new_v4(),
            code: new_code(),
            name: product.name,
            description: product.description,
            base_price: product.base_price,
            user_id: product.user_id,
            created_at: now,
            updated_at: now,
        };
        let stock = Stock {
            id: Uuid::new_v4(),
            code: new_code(),
            product_id: Some(created.id),
            supplier_id: settings.supplier_id,
            quantity: 0,
            minimal_quantity: settings.minimal_quantity,
            max_quantity: settings.max_quantity,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.lock()?;
        tables.products.push(created.clone());
        for category_id in product.category_ids {
            tables.product_categories.push((created.id, category_id));
        }
        tables.stocks.push(stock.clone());
        Ok((created, stock))
    }

    async fn update_product(&self, id: Uuid, changes: ProductChanges) -> StoreResult<Product> {
        let mut tables = self.lock()?;
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound("product"))?;

        product.name = changes.name;
        product.description = changes.description;
        product.base_price = changes.base_price;
        product.updated_at = Utc::now();
        let updated = product.clone();

        tables.product_categories.retain(|(p, _)| *p != id);
        for category_id in changes.category_ids {
            tables.product_categories.push((id, category_id));
        }
        Ok(updated)
    }

    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.lock()?.products.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        let before = tables.products.len();
        tables.products.retain(|p| p.id != id);
        if tables.products.len() == before {
            return Ok(false);
        }

        let stock_ids: Vec<Uuid> = tables
            .stocks
            .iter()
            .filter(|s| s.product_id == Some(id))
            .map(|s| s.id)
            .collect();
        let orphaned = |stock_id: Option<Uuid>| stock_id.map_or(false, |s| stock_ids.contains(&s));

        tables
            .entries
            .retain(|e| e.product_id != Some(id) && !orphaned(e.stock_id));
        tables
            .exits
            .retain(|e| e.product_id != Some(id) && !orphaned(e.stock_id));
        tables.stocks.retain(|s| s.product_id != Some(id));
        tables.product_categories.retain(|(p, _)| *p != id);
        Ok(true)
    }

    async fn stock(&self, id: Uuid) -> StoreResult<Option<Stock>> {
        Ok(self.lock()?.stocks.iter().find(|s| s.id == id).cloned())
    }

    async fn stock_for_product(&self, product_id: Uuid) -> StoreResult<Option<Stock>> {
        Ok(self
            .lock()?
            .stocks
            .iter()
            .find(|s| s.product_id == Some(product_id))
            .cloned())
    }

    async fn edit_stock(
        &self,
        id: Uuid,
        settings: StockSettings,
        movement: Option<NewMovement>,
    ) -> StoreResult<(Option<LedgerFact>, Stock)> {
        check_settings(&settings)?;

        let mut tables = self.lock()?;
        let delta = movement.as_ref().map_or(0, NewMovement::signed_quantity);
        let stock = tables
            .stocks
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound("stock"))?;
        let quantity = moved_quantity(stock, delta)?;

        stock.supplier_id = settings.supplier_id;
        stock.minimal_quantity = settings.minimal_quantity;
        stock.max_quantity = settings.max_quantity;
        stock.quantity = quantity;
        stock.updated_at = Utc::now();
        let stock = stock.clone();

        let fact = movement.map(|movement| tables.record_fact(movement));
        Ok((fact, stock))
    }

    async fn apply_movement(&self, movement: NewMovement) -> StoreResult<(LedgerFact, Stock)> {
        let mut tables = self.lock()?;
        let stock = tables
            .stocks
            .iter_mut()
            .find(|s| s.id == movement.stock_id)
            .ok_or(StoreError::NotFound("stock"))?;

        let quantity = moved_quantity(stock, movement.signed_quantity())?;
        stock.quantity = quantity;
        stock.updated_at = Utc::now();
        let stock = stock.clone();

        Ok((tables.record_fact(movement), stock))
    }

    async fn entries_for_stock(&self, stock_id: Uuid) -> StoreResult<Vec<StockEntry>> {
        Ok(self
            .lock()?
            .entries
            .iter()
            .rev()
            .filter(|e| e.stock_id == Some(stock_id))
            .cloned()
            .collect())
    }

    async fn exits_for_stock(&self, stock_id: Uuid) -> StoreResult<Vec<StockExit>> {
        Ok(self
            .lock()?
            .exits
            .iter()
            .rev()
            .filter(|e| e.stock_id == Some(stock_id))
            .cloned()
            .collect())
    }

    async fn create_notification(
        &self,
        destination_id: Option<Uuid>,
        body: &str,
    ) -> StoreResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            destination_id,
            body: body.to_string(),
            read: false,
            created_at: Utc::now(),
        };
        self.lock()?.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.lock()?;
        let notification = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(StoreError::NotFound("notification"))?;
        notification.read = true;
        Ok(())
    }

    async fn unread_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        Ok(self
            .lock()?
            .notifications
            .iter()
            .filter(|n| n.destination_id == Some(user_id) && !n.read)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn settings(minimal_quantity: i32, max_quantity: i32) -> StockSettings {
        StockSettings {
            supplier_id: None,
            minimal_quantity,
            max_quantity,
        }
    }

    async fn product_with_stock(store: &InMemoryStore) -> (Product, Stock) {
        store
            .create_product_with_stock(
                NewProduct {
                    name: "Bolt".to_string(),
                    description: None,
                    base_price: Decimal::new(150, 2),
                    user_id: Some(Uuid::new_v4()),
                    category_ids: vec![Uuid::new_v4()],
                },
                settings(1, 25),
            )
            .await
            .unwrap()
    }

    fn movement(kind: MovementKind, stock: &Stock, quantity: i32) -> NewMovement {
        NewMovement {
            kind,
            stock_id: stock.id,
            product_id: stock.product_id,
            supplier_id: None,
            description: None,
            user_id: None,
            quantity,
        }
    }

    #[tokio::test]
    async fn overdrawn_exit_leaves_no_trace() {
        let store = InMemoryStore::new();
        let (_, stock) = product_with_stock(&store).await;
        store.apply_movement(movement(MovementKind::Entry, &stock, 3)).await.unwrap();

        let err = store
            .apply_movement(movement(MovementKind::Exit, &stock, 4))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Constraint(_)));
        assert_eq!(store.stock(stock.id).await.unwrap().unwrap().quantity, 3);
        assert!(store.exits().is_empty());
    }

    #[tokio::test]
    async fn movement_on_unknown_stock_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .apply_movement(NewMovement {
                kind: MovementKind::Entry,
                stock_id: Uuid::new_v4(),
                product_id: None,
                supplier_id: None,
                description: None,
                user_id: None,
                quantity: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("stock")));
    }

    #[tokio::test]
    async fn product_is_created_with_one_empty_stock() {
        let store = InMemoryStore::new();
        let (product, stock) = product_with_stock(&store).await;

        assert_eq!(stock.product_id, Some(product.id));
        assert_eq!(stock.quantity, 0);
        assert_eq!((stock.minimal_quantity, stock.max_quantity), (1, 25));
        assert_eq!(store.stock_for_product(product.id).await.unwrap(), Some(stock));
    }

    #[tokio::test]
    async fn rejected_product_leaves_no_rows() {
        let store = InMemoryStore::new();
        let err = store
            .create_product_with_stock(
                NewProduct {
                    name: "Bolt".to_string(),
                    description: None,
                    base_price: Decimal::ONE,
                    user_id: None,
                    category_ids: vec![],
                },
                settings(-1, 25),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Constraint(_)));
        assert!(store.stocks().is_empty());
    }

    #[tokio::test]
    async fn overdrawn_edit_keeps_old_settings() {
        let store = InMemoryStore::new();
        let (_, stock) = product_with_stock(&store).await;
        store.apply_movement(movement(MovementKind::Entry, &stock, 2)).await.unwrap();

        let err = store
            .edit_stock(
                stock.id,
                settings(15, 40),
                Some(movement(MovementKind::Exit, &stock, 5)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Constraint(_)));
        let after = store.stock(stock.id).await.unwrap().unwrap();
        assert_eq!((after.minimal_quantity, after.max_quantity), (1, 25));
        assert_eq!(after.quantity, 2);
        assert!(store.exits().is_empty());
    }

    #[tokio::test]
    async fn edit_saves_settings_and_movement_together() {
        let store = InMemoryStore::new();
        let (_, stock) = product_with_stock(&store).await;
        let actor = Uuid::new_v4();
        let mut entry = movement(MovementKind::Entry, &stock, 6);
        entry.user_id = Some(actor);

        let (fact, after) = store
            .edit_stock(stock.id, settings(3, 9), Some(entry))
            .await
            .unwrap();

        assert_eq!(fact.map(|f| f.quantity()), Some(6));
        assert_eq!((after.quantity, after.minimal_quantity, after.max_quantity), (6, 3, 9));
        assert_eq!(store.entries()[0].user_id, Some(actor));
    }

    #[tokio::test]
    async fn deleting_a_product_cascades_to_stock_and_ledger() {
        let store = InMemoryStore::new();
        let (product, stock) = product_with_stock(&store).await;
        let (other, other_stock) = product_with_stock(&store).await;

        store.apply_movement(movement(MovementKind::Entry, &stock, 10)).await.unwrap();
        store.apply_movement(movement(MovementKind::Exit, &stock, 2)).await.unwrap();
        store.apply_movement(movement(MovementKind::Entry, &other_stock, 5)).await.unwrap();

        assert!(store.delete_product(product.id).await.unwrap());

        assert!(store.product(product.id).await.unwrap().is_none());
        assert!(store.stocks().iter().all(|s| s.product_id != Some(product.id)));
        assert!(store.entries().iter().all(|e| e.product_id != Some(product.id)));
        assert!(store.exits().iter().all(|e| e.product_id != Some(product.id)));
        assert!(store.categories_of(product.id).is_empty());

        // The other product is untouched.
        assert!(store.product(other.id).await.unwrap().is_some());
        assert_eq!(store.entries().len(), 1);
        assert!(!store.delete_product(product.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_product_replaces_categories() {
        let store = InMemoryStore::new();
        let (product, _) = product_with_stock(&store).await;
        let category = Uuid::new_v4();

        let updated = store
            .update_product(
                product.id,
                ProductChanges {
                    name: "Hex bolt".to_string(),
                    description: Some("M8".to_string()),
                    base_price: Decimal::new(175, 2),
                    category_ids: vec![category],
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Hex bolt");
        assert_eq!(store.categories_of(product.id), vec![category]);
    }

    #[tokio::test]
    async fn unread_notifications_are_scoped_to_the_user() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let first = store.create_notification(Some(user), "one").await.unwrap();
        store.create_notification(Some(user), "two").await.unwrap();
        store.create_notification(Some(Uuid::new_v4()), "elsewhere").await.unwrap();

        store.mark_notification_read(first.id).await.unwrap();

        let unread = store.unread_notifications(user).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].body, "two");
    }
}
