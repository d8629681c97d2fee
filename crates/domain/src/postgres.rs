//! PostgreSQL-backed order repository.

use async_trait::async_trait;
use common::{OrderId, OrderItem, OrderStatus, UserId, Version};
use outbox::OutboxEntry;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::{Order, OrderRepository, RepositoryError};

/// Order repository backed by the `orders` table.
///
/// The outbox entry rides in the same transaction as the order row, so an
/// order change and the event recording it commit atomically.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies pending schema migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, RepositoryError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(RepositoryError::Corrupt)?;
    let items: Vec<OrderItem> = serde_json::from_value(row.try_get("items")?)?;
    let version: i64 = row.try_get("version")?;

    Ok(Order::from_parts(
        OrderId::from_uuid(row.try_get("id")?),
        UserId::from_uuid(row.try_get("user_id")?),
        items,
        status,
        row.try_get("shipping_address")?,
        row.try_get("notes")?,
        Version::new(version),
        row.try_get("created_at")?,
        row.try_get("updated_at")?,
    ))
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[tracing::instrument(skip(self, order, entry), fields(order_id = %order.id()))]
    async fn insert(&self, order: &Order, entry: &OutboxEntry) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, items, total_amount_cents, status,
                 shipping_address, notes, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(serde_json::to_value(order.items())?)
        .bind(order.total_amount().cents())
        .bind(order.status().as_str())
        .bind(order.shipping_address())
        .bind(order.notes())
        .bind(order.version().as_i64())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await?;

        outbox::insert_entry(&mut *tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, order, entries), fields(order_id = %order.id()))]
    async fn update(
        &self,
        order: &Order,
        expected: Version,
        entries: &[OutboxEntry],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, shipping_address = $4, notes = $5,
                version = $6, updated_at = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(expected.as_i64())
        .bind(order.status().as_str())
        .bind(order.shipping_address())
        .bind(order.notes())
        .bind(order.version().as_i64())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict);
        }

        for entry in entries {
            outbox::insert_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, items, status, shipping_address, notes,
                   version, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, items, status, shipping_address, notes,
                   version, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }
}
