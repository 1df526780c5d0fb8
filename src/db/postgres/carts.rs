//! Cart queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::PgStore;
use crate::db::{CartRepository, RepoResult, RepositoryError, NO_SUCH_CART, NO_SUCH_PRODUCT};
use crate::domain::aggregates::{Cart, CartError, CartItem, ProductSummary};
use crate::domain::value_objects::{CartId, CartItemId, ProductId};

const CART_LINE_SELECT: &str = r"
    SELECT ci.id, ci.quantity, p.id AS product_id, p.title, p.unit_price
    FROM cart_items ci
    JOIN products p ON p.id = ci.product_id
";

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartItemId,
    quantity: i32,
    product_id: ProductId,
    title: String,
    unit_price: Decimal,
}

impl From<CartLineRow> for CartItem {
    fn from(r: CartLineRow) -> Self {
        Self {
            id: r.id,
            product: ProductSummary { id: r.product_id, title: r.title, unit_price: r.unit_price },
            quantity: r.quantity,
        }
    }
}

impl PgStore {
    async fn cart_line(&self, cart_id: CartId, id: CartItemId) -> RepoResult<Option<CartItem>> {
        let sql = format!("{CART_LINE_SELECT} WHERE ci.cart_id = $1 AND ci.id = $2");
        let row = sqlx::query_as::<_, CartLineRow>(&sql).bind(cart_id).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(CartItem::from))
    }
}

fn quantity_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_check_violation() {
            return CartError::QuantityTooLarge.into();
        }
    }
    RepositoryError::Database(e)
}

#[async_trait]
impl CartRepository for PgStore {
    async fn create_cart(&self) -> RepoResult<Cart> {
        let cart = Cart::new();
        sqlx::query("INSERT INTO carts (id, created_at) VALUES ($1, $2)")
            .bind(cart.id)
            .bind(cart.created_at)
            .execute(&self.pool)
            .await?;
        Ok(cart)
    }

    async fn get_cart(&self, id: CartId) -> RepoResult<Option<Cart>> {
        let created_at: Option<DateTime<Utc>> = sqlx::query_scalar("SELECT created_at FROM carts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(created_at) = created_at else {
            return Ok(None);
        };

        let sql = format!("{CART_LINE_SELECT} WHERE ci.cart_id = $1 ORDER BY ci.id");
        let rows = sqlx::query_as::<_, CartLineRow>(&sql).bind(id).fetch_all(&self.pool).await?;
        Ok(Some(Cart { id, created_at, items: rows.into_iter().map(CartItem::from).collect() }))
    }

    async fn delete_cart(&self, id: CartId) -> RepoResult<bool> {
        let deleted = sqlx::query("DELETE FROM carts WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn add_cart_item(&self, cart_id: CartId, product_id: ProductId, quantity: i32) -> RepoResult<CartItem> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity.into());
        }
        let (cart_exists, product_exists): (bool, bool) = sqlx::query_as(
            r"
            SELECT EXISTS (SELECT 1 FROM carts WHERE id = $1),
                   EXISTS (SELECT 1 FROM products WHERE id = $2)
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;
        if !cart_exists {
            return Err(RepositoryError::NotFound(NO_SUCH_CART.to_owned()));
        }
        if !product_exists {
            return Err(RepositoryError::Invalid(NO_SUCH_PRODUCT.to_owned()));
        }

        let id: CartItemId = sqlx::query_scalar(
            r"
            INSERT INTO cart_items (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            RETURNING id
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(quantity_error)?;

        self.cart_line(cart_id, id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(NO_SUCH_CART.to_owned()))
    }

    async fn update_cart_item(&self, cart_id: CartId, id: CartItemId, quantity: i32) -> RepoResult<Option<CartItem>> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity.into());
        }
        let updated = sqlx::query("UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND id = $2")
            .bind(cart_id)
            .bind(id)
            .bind(quantity)
            .execute(&self.pool)
            .await
            .map_err(quantity_error)?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.cart_line(cart_id, id).await
    }

    async fn delete_cart_item(&self, cart_id: CartId, id: CartItemId) -> RepoResult<bool> {
        let deleted = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = $2")
            .bind(cart_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }
}
