//! Order queries, including the cart-to-order transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::PgStore;
use crate::db::{OrderRepository, RepoResult, RepositoryError};
use crate::domain::aggregates::{Order, OrderError, OrderItem, PaymentStatus, ProductSummary};
use crate::domain::value_objects::{CartId, CustomerId, OrderId, OrderItemId, ProductId};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    customer_id: CustomerId,
    placed_at: DateTime<Utc>,
    payment_status: String,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: OrderItemId,
    order_id: OrderId,
    quantity: i32,
    product_id: ProductId,
    title: String,
    unit_price: Decimal,
}

fn payment_status(code: &str) -> RepoResult<PaymentStatus> {
    PaymentStatus::from_code(code)
        .ok_or_else(|| RepositoryError::DataCorruption(format!("unknown payment status {code:?}")))
}

impl PgStore {
    /// Loads line items for the order rows, joined with their products' current title and price.
    async fn hydrate_orders(&self, rows: Vec<OrderRow>) -> RepoResult<Vec<Order>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id.as_i64()).collect();
        let lines = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT oi.id, oi.order_id, oi.quantity, p.id AS product_id, p.title, p.unit_price
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.id
            ",
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for l in lines {
            items_by_order.entry(l.order_id).or_default().push(OrderItem {
                id: l.id,
                quantity: l.quantity,
                product: ProductSummary { id: l.product_id, title: l.title, unit_price: l.unit_price },
            });
        }

        rows.into_iter()
            .map(|r| {
                Ok(Order {
                    payment_status: payment_status(&r.payment_status)?,
                    items: items_by_order.remove(&r.id).unwrap_or_default(),
                    id: r.id,
                    customer_id: r.customer_id,
                    placed_at: r.placed_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn place_order(&self, cart_id: CartId, customer_id: CustomerId) -> RepoResult<Order> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<CartId> = sqlx::query_scalar("SELECT id FROM carts WHERE id = $1 FOR UPDATE")
            .bind(cart_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(OrderError::CartNotFound.into());
        }
        let line_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .fetch_one(&mut *tx)
            .await?;
        if line_count == 0 {
            return Err(OrderError::EmptyCart.into());
        }

        let order_id: OrderId =
            sqlx::query_scalar("INSERT INTO orders (customer_id, payment_status) VALUES ($1, $2) RETURNING id")
                .bind(customer_id)
                .bind(PaymentStatus::Pending.code())
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query(
            r"
            INSERT INTO order_items (order_id, product_id, quantity)
            SELECT $1, product_id, quantity FROM cart_items WHERE cart_id = $2 ORDER BY id
            ",
        )
        .bind(order_id)
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM carts WHERE id = $1").bind(cart_id).execute(&mut *tx).await?;
        tx.commit().await?;

        tracing::debug!(%order_id, %cart_id, line_count, "cart converted to order");
        self.get_order(order_id)
            .await?
            .ok_or_else(|| RepositoryError::DataCorruption(format!("order {order_id} vanished after commit")))
    }

    async fn list_orders(&self, customer_id: Option<CustomerId>) -> RepoResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, customer_id, placed_at, payment_status FROM orders
            WHERE $1::BIGINT IS NULL OR customer_id = $1
            ORDER BY id
            ",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_orders(rows).await
    }

    async fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, customer_id, placed_at, payment_status FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(self.hydrate_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_payment_status(&self, id: OrderId, status: PaymentStatus) -> RepoResult<Option<Order>> {
        let mut tx = self.pool.begin().await?;
        let current: Option<String> = sqlx::query_scalar("SELECT payment_status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            return Ok(None);
        };
        let next = payment_status(&current)?.transition_to(status)?;

        sqlx::query("UPDATE orders SET payment_status = $2 WHERE id = $1")
            .bind(id)
            .bind(next.code())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        self.get_order(id).await
    }

    async fn delete_order(&self, id: OrderId) -> RepoResult<bool> {
        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(deleted.rows_affected() > 0)
    }
}
