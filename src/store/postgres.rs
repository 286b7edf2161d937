use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    database::Database,
    models::{
        LedgerFact, MovementKind, NewMovement, NewProduct, Notification, Product, ProductChanges,
        Stock, StockEntry, StockExit, StockSettings,
    },
    utils::new_code,
};

use super::{InventoryStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn create_product_with_stock(
        &self,
        product: NewProduct,
        settings: StockSettings,
    ) -> StoreResult<(Product, Stock)> {
        let mut tx = self.db.begin().await?;

        let created = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (code, name, description, base_price, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new_code())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.base_price)
        .bind(product.user_id)
        .fetch_one(&mut *tx)
        .await?;

        for category_id in &product.category_ids {
            sqlx::query("INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2)")
                .bind(created.id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
        }

        let stock = sqlx::query_as::<_, Stock>(
            r#"
            INSERT INTO stocks (code, product_id, supplier_id, quantity, minimal_quantity, max_quantity)
            VALUES ($1, $2, $3, 0, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new_code())
        .bind(created.id)
        .bind(settings.supplier_id)
        .bind(settings.minimal_quantity)
        .bind(settings.max_quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((created, stock))
    }

    async fn update_product(&self, id: Uuid, changes: ProductChanges) -> StoreResult<Product> {
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = $1, description = $2, base_price = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.base_price)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("product"))?;

        sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for category_id in &changes.category_ids {
            sqlx::query("INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2)")
                .bind(id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.db.begin().await?;

        // Ledger rows first, then the stock they hang off, then the product.
        for statement in [
            "DELETE FROM stock_entries WHERE product_id = $1",
            "DELETE FROM stock_exits WHERE product_id = $1",
            "DELETE FROM stocks WHERE product_id = $1",
            "DELETE FROM product_categories WHERE product_id = $1",
        ] {
            sqlx::query(statement).bind(id).execute(&mut *tx).await?;
        }

        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn stock(&self, id: Uuid) -> StoreResult<Option<Stock>> {
        let stock = sqlx::query_as::<_, Stock>("SELECT * FROM stocks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(stock)
    }

    async fn stock_for_product(&self, product_id: Uuid) -> StoreResult<Option<Stock>> {
        let stock = sqlx::query_as::<_, Stock>(
            "SELECT * FROM stocks WHERE product_id = $1 ORDER BY created_at, id LIMIT 1",
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(stock)
    }

    async fn edit_stock(
        &self,
        id: Uuid,
        settings: StockSettings,
        movement: Option<NewMovement>,
    ) -> StoreResult<(Option<LedgerFact>, Stock)> {
        let mut tx = self.db.begin().await?;
        let delta = movement.as_ref().map_or(0, NewMovement::signed_quantity);

        let stock = sqlx::query_as::<_, Stock>(
            r#"
            UPDATE stocks
            SET supplier_id = $1, minimal_quantity = $2, max_quantity = $3,
                quantity = quantity + $4, updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(settings.supplier_id)
        .bind(settings.minimal_quantity)
        .bind(settings.max_quantity)
        .bind(delta)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("stock"))?;

        let fact = match &movement {
            Some(movement) => Some(insert_fact(&mut tx, movement).await?),
            None => None,
        };

        tx.commit().await?;
        Ok((fact, stock))
    }

    async fn apply_movement(&self, movement: NewMovement) -> StoreResult<(LedgerFact, Stock)> {
        let mut tx = self.db.begin().await?;

        // In-place increment; the CHECK (quantity >= 0) rejects overdrawn exits.
        let stock = sqlx::query_as::<_, Stock>(
            r#"
            UPDATE stocks
            SET quantity = quantity + $1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(movement.signed_quantity())
        .bind(movement.stock_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("stock"))?;

        let fact = insert_fact(&mut tx, &movement).await?;

        tx.commit().await?;
        Ok((fact, stock))
    }

    async fn entries_for_stock(&self, stock_id: Uuid) -> StoreResult<Vec<StockEntry>> {
        let entries = sqlx::query_as::<_, StockEntry>(
            "SELECT * FROM stock_entries WHERE stock_id = $1 ORDER BY created_at DESC",
        )
        .bind(stock_id)
        .fetch_all(&self.db)
        .await?;
        Ok(entries)
    }

    async fn exits_for_stock(&self, stock_id: Uuid) -> StoreResult<Vec<StockExit>> {
        let exits = sqlx::query_as::<_, StockExit>(
            "SELECT * FROM stock_exits WHERE stock_id = $1 ORDER BY created_at DESC",
        )
        .bind(stock_id)
        .fetch_all(&self.db)
        .await?;
        Ok(exits)
    }

    async fn create_notification(
        &self,
        destination_id: Option<Uuid>,
        body: &str,
    ) -> StoreResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (destination_id, body, read) VALUES ($1, $2, false) RETURNING *",
        )
        .bind(destination_id)
        .bind(body)
        .fetch_one(&self.db)
        .await?;
        Ok(notification)
    }

    async fn mark_notification_read(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE notifications SET read = true WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn unread_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE destination_id = $1 AND read = false ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(notifications)
    }
}

async fn insert_fact(conn: &mut PgConnection, movement: &NewMovement) -> StoreResult<LedgerFact> {
    let fact = match movement.kind {
        MovementKind::Entry => LedgerFact::Entry(
            sqlx::query_as::<_, StockEntry>(
                r#"
                INSERT INTO stock_entries (code, stock_id, product_id, supplier_id, user_id, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(new_code())
            .bind(movement.stock_id)
            .bind(movement.product_id)
            .bind(movement.supplier_id)
            .bind(movement.user_id)
            .bind(movement.quantity)
            .fetch_one(&mut *conn)
            .await?,
        ),
        MovementKind::Exit => LedgerFact::Exit(
            sqlx::query_as::<_, StockExit>(
                r#"
                INSERT INTO stock_exits (code, stock_id, product_id, description, user_id, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(new_code())
            .bind(movement.stock_id)
            .bind(movement.product_id)
            .bind(&movement.description)
            .bind(movement.user_id)
            .bind(movement.quantity)
            .fetch_one(&mut *conn)
            .await?,
        ),
    };
    Ok(fact)
}
