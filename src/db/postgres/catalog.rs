//! Catalog queries: collections, promotions, products, reviews, images.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder, Transaction};

use super::{constraint_error, delete_error, like_pattern, PgStore};
use crate::db::{
    CatalogRepository, Page, ProductOrdering, ProductQuery, RepoResult, RepositoryError, NO_SUCH_COLLECTION,
    NO_SUCH_PRODUCT, NO_SUCH_PROMOTION,
};
use crate::domain::aggregates::{
    CatalogError, Collection, CollectionDraft, Product, ProductDraft, ProductImage, Promotion, PromotionDraft, Review,
    ReviewDraft,
};
use crate::domain::value_objects::{CollectionId, ImageId, ProductId, PromotionId, ReviewId};

const PRODUCT_COLUMNS: &str = "id, title, description, slug, unit_price, inventory, last_update, collection_id";

const COLLECTION_SELECT: &str = r"
    SELECT c.id, c.title, c.featured_product_id, COUNT(p.id) AS products_count
    FROM collections c
    LEFT JOIN products p ON p.collection_id = c.id
";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    title: String,
    description: String,
    slug: Option<String>,
    unit_price: Decimal,
    inventory: i32,
    last_update: DateTime<Utc>,
    collection_id: CollectionId,
}

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: CollectionId,
    title: String,
    featured_product_id: Option<ProductId>,
    products_count: i64,
}

impl From<CollectionRow> for Collection {
    fn from(r: CollectionRow) -> Self {
        Self { id: r.id, title: r.title, featured_product: r.featured_product_id, products_count: r.products_count }
    }
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: ImageId,
    product_id: ProductId,
    image: String,
}

#[derive(sqlx::FromRow)]
struct PromotionRow {
    id: PromotionId,
    description: String,
    discount: f64,
}

impl From<PromotionRow> for Promotion {
    fn from(r: PromotionRow) -> Self { Self { id: r.id, description: r.description, discount: r.discount } }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    name: String,
    description: String,
    date: chrono::NaiveDate,
}

impl From<ReviewRow> for Review {
    fn from(r: ReviewRow) -> Self {
        Self { id: r.id, product_id: r.product_id, name: r.name, description: r.description, date: r.date }
    }
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if let Some(term) = &query.search {
        let pattern = like_pattern(term);
        qb.push(" AND (title ILIKE ").push_bind(pattern.clone());
        qb.push(" OR description ILIKE ").push_bind(pattern).push(")");
    }
    if let Some(collection_id) = query.collection_id {
        qb.push(" AND collection_id = ").push_bind(collection_id);
    }
    if let Some(price) = query.price_above {
        qb.push(" AND unit_price > ").push_bind(price);
    }
    if let Some(price) = query.price_below {
        qb.push(" AND unit_price < ").push_bind(price);
    }
}

fn order_clause(ordering: Option<ProductOrdering>) -> &'static str {
    match ordering {
        Some(ProductOrdering::PriceAsc) => " ORDER BY unit_price ASC, id ASC",
        Some(ProductOrdering::PriceDesc) => " ORDER BY unit_price DESC, id ASC",
        Some(ProductOrdering::LastUpdateAsc) => " ORDER BY last_update ASC, id ASC",
        Some(ProductOrdering::LastUpdateDesc) => " ORDER BY last_update DESC, id ASC",
        None => " ORDER BY id ASC",
    }
}

impl PgStore {
    /// Attaches images and promotion ids to product rows.
    async fn hydrate_products(&self, rows: Vec<ProductRow>) -> RepoResult<Vec<Product>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id.as_i64()).collect();

        let images = sqlx::query_as::<_, ImageRow>(
            "SELECT id, product_id, image FROM product_images WHERE product_id = ANY($1) ORDER BY id",
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let links = sqlx::query_as::<_, (ProductId, PromotionId)>(
            "SELECT product_id, promotion_id FROM product_promotions WHERE product_id = ANY($1) ORDER BY promotion_id",
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut images_by_product: HashMap<ProductId, Vec<ProductImage>> = HashMap::new();
        for img in images {
            images_by_product.entry(img.product_id).or_default().push(ProductImage { id: img.id, image: img.image });
        }
        let mut promotions_by_product: HashMap<ProductId, Vec<PromotionId>> = HashMap::new();
        for (product_id, promotion_id) in links {
            promotions_by_product.entry(product_id).or_default().push(promotion_id);
        }

        Ok(rows
            .into_iter()
            .map(|r| Product {
                images: images_by_product.remove(&r.id).unwrap_or_default(),
                promotions: promotions_by_product.remove(&r.id).unwrap_or_default(),
                id: r.id,
                title: r.title,
                description: r.description,
                slug: r.slug,
                inventory: r.inventory,
                unit_price: r.unit_price,
                collection: r.collection_id,
                last_update: r.last_update,
            })
            .collect())
    }

    async fn product_exists(&self, id: ProductId) -> RepoResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Checks the collection and every promotion a product draft points at.
    async fn check_product_refs(tx: &mut Transaction<'_, Postgres>, draft: &ProductDraft) -> RepoResult<()> {
        let collection_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM collections WHERE id = $1)")
            .bind(draft.collection)
            .fetch_one(&mut **tx)
            .await?;
        if !collection_exists {
            return Err(RepositoryError::Invalid(NO_SUCH_COLLECTION.to_owned()));
        }

        let mut wanted: Vec<i64> = draft.promotions.iter().map(PromotionId::as_i64).collect();
        wanted.sort_unstable();
        wanted.dedup();
        if !wanted.is_empty() {
            let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM promotions WHERE id = ANY($1)")
                .bind(&wanted[..])
                .fetch_one(&mut **tx)
                .await?;
            if found != wanted.len() as i64 {
                return Err(RepositoryError::Invalid(NO_SUCH_PROMOTION.to_owned()));
            }
        }
        Ok(())
    }

    async fn replace_promotions(
        tx: &mut Transaction<'_, Postgres>,
        product_id: ProductId,
        promotions: &[PromotionId],
    ) -> RepoResult<()> {
        sqlx::query("DELETE FROM product_promotions WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut **tx)
            .await?;
        let ids: Vec<i64> = promotions.iter().map(PromotionId::as_i64).collect();
        sqlx::query(
            "INSERT INTO product_promotions (product_id, promotion_id) SELECT $1, UNNEST($2::BIGINT[]) ON CONFLICT DO NOTHING",
        )
        .bind(product_id)
        .bind(&ids[..])
        .execute(&mut **tx)
        .await
        .map_err(|e| constraint_error(e, NO_SUCH_PROMOTION))?;
        Ok(())
    }

    async fn check_featured_product(&self, draft: &CollectionDraft) -> RepoResult<()> {
        if let Some(product_id) = draft.featured_product {
            if !self.product_exists(product_id).await? {
                return Err(RepositoryError::Invalid(NO_SUCH_PRODUCT.to_owned()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn list_collections(&self) -> RepoResult<Vec<Collection>> {
        let sql = format!("{COLLECTION_SELECT} GROUP BY c.id ORDER BY c.id");
        let rows = sqlx::query_as::<_, CollectionRow>(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Collection::from).collect())
    }

    async fn get_collection(&self, id: CollectionId) -> RepoResult<Option<Collection>> {
        let sql = format!("{COLLECTION_SELECT} WHERE c.id = $1 GROUP BY c.id");
        let row = sqlx::query_as::<_, CollectionRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Collection::from))
    }

    async fn create_collection(&self, draft: &CollectionDraft) -> RepoResult<Collection> {
        self.check_featured_product(draft).await?;
        let id: CollectionId =
            sqlx::query_scalar("INSERT INTO collections (title, featured_product_id) VALUES ($1, $2) RETURNING id")
                .bind(&draft.title)
                .bind(draft.featured_product)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| constraint_error(e, NO_SUCH_PRODUCT))?;
        self.get_collection(id)
            .await?
            .ok_or_else(|| RepositoryError::DataCorruption(format!("collection {id} vanished after insert")))
    }

    async fn update_collection(&self, id: CollectionId, draft: &CollectionDraft) -> RepoResult<Option<Collection>> {
        self.check_featured_product(draft).await?;
        let updated = sqlx::query("UPDATE collections SET title = $2, featured_product_id = $3 WHERE id = $1")
            .bind(id)
            .bind(&draft.title)
            .bind(draft.featured_product)
            .execute(&self.pool)
            .await
            .map_err(|e| constraint_error(e, NO_SUCH_PRODUCT))?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_collection(id).await
    }

    async fn delete_collection(&self, id: CollectionId) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, (String, Option<ProductId>)>(
            "SELECT title, featured_product_id FROM collections WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((title, featured_product)) = row else {
            return Ok(false);
        };
        let products_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE collection_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        Collection { id, title, featured_product, products_count }.ensure_deletable()?;

        sqlx::query("DELETE FROM collections WHERE id = $1").bind(id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn list_promotions(&self) -> RepoResult<Vec<Promotion>> {
        let rows = sqlx::query_as::<_, PromotionRow>("SELECT id, description, discount FROM promotions ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Promotion::from).collect())
    }

    async fn get_promotion(&self, id: PromotionId) -> RepoResult<Option<Promotion>> {
        let row = sqlx::query_as::<_, PromotionRow>("SELECT id, description, discount FROM promotions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Promotion::from))
    }

    async fn create_promotion(&self, draft: &PromotionDraft) -> RepoResult<Promotion> {
        let row = sqlx::query_as::<_, PromotionRow>(
            "INSERT INTO promotions (description, discount) VALUES ($1, $2) RETURNING id, description, discount",
        )
        .bind(&draft.description)
        .bind(draft.discount)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_promotion(&self, id: PromotionId, draft: &PromotionDraft) -> RepoResult<Option<Promotion>> {
        let row = sqlx::query_as::<_, PromotionRow>(
            "UPDATE promotions SET description = $2, discount = $3 WHERE id = $1 RETURNING id, description, discount",
        )
        .bind(id)
        .bind(&draft.description)
        .bind(draft.discount)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Promotion::from))
    }

    async fn delete_promotion(&self, id: PromotionId) -> RepoResult<bool> {
        let deleted = sqlx::query("DELETE FROM promotions WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn list_products(&self, query: &ProductQuery) -> RepoResult<Page<Product>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_product_filters(&mut select, query);
        select.push(order_clause(query.ordering));
        select.push(" LIMIT ").push_bind(i64::from(query.page_size));
        select.push(" OFFSET ").push_bind(query.offset());
        let rows = select.build_query_as::<ProductRow>().fetch_all(&self.pool).await?;

        Ok(Page { items: self.hydrate_products(rows).await?, total, page: query.page, page_size: query.page_size })
    }

    async fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(self.hydrate_products(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_product(&self, draft: &ProductDraft) -> RepoResult<Product> {
        let mut tx = self.pool.begin().await?;
        Self::check_product_refs(&mut tx, draft).await?;
        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO products (title, description, slug, unit_price, inventory, collection_id, last_update)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id
            ",
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.slug)
        .bind(draft.unit_price)
        .bind(draft.inventory)
        .bind(draft.collection)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, NO_SUCH_COLLECTION))?;
        Self::replace_promotions(&mut tx, id, &draft.promotions).await?;
        tx.commit().await?;

        self.get_product(id)
            .await?
            .ok_or_else(|| RepositoryError::DataCorruption(format!("product {id} vanished after insert")))
    }

    async fn update_product(&self, id: ProductId, draft: &ProductDraft) -> RepoResult<Option<Product>> {
        let mut tx = self.pool.begin().await?;
        Self::check_product_refs(&mut tx, draft).await?;
        let updated = sqlx::query(
            r"
            UPDATE products
            SET title = $2, description = $3, slug = $4, unit_price = $5, inventory = $6,
                collection_id = $7, last_update = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.slug)
        .bind(draft.unit_price)
        .bind(draft.inventory)
        .bind(draft.collection)
        .execute(&mut *tx)
        .await
        .map_err(|e| constraint_error(e, NO_SUCH_COLLECTION))?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        Self::replace_promotions(&mut tx, id, &draft.promotions).await?;
        tx.commit().await?;
        self.get_product(id).await
    }

    async fn delete_product(&self, id: ProductId) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE").bind(id).execute(&mut *tx).await?;
        let order_item_refs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE product_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        Product::ensure_deletable(order_item_refs)?;

        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| delete_error(e, CatalogError::ProductInOrders))?;
        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn list_reviews(&self, product_id: ProductId) -> RepoResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT id, product_id, name, description, date FROM reviews WHERE product_id = $1 ORDER BY id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn get_review(&self, product_id: ProductId, id: ReviewId) -> RepoResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(
            "SELECT id, product_id, name, description, date FROM reviews WHERE product_id = $1 AND id = $2",
        )
        .bind(product_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Review::from))
    }

    async fn create_review(&self, product_id: ProductId, draft: &ReviewDraft) -> RepoResult<Review> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r"
            INSERT INTO reviews (product_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, product_id, name, description, date
            ",
        )
        .bind(product_id)
        .bind(&draft.name)
        .bind(&draft.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, NO_SUCH_PRODUCT))?;
        Ok(row.into())
    }

    async fn update_review(&self, product_id: ProductId, id: ReviewId, draft: &ReviewDraft) -> RepoResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(
            r"
            UPDATE reviews SET name = $3, description = $4
            WHERE product_id = $1 AND id = $2
            RETURNING id, product_id, name, description, date
            ",
        )
        .bind(product_id)
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Review::from))
    }

    async fn delete_review(&self, product_id: ProductId, id: ReviewId) -> RepoResult<bool> {
        let deleted = sqlx::query("DELETE FROM reviews WHERE product_id = $1 AND id = $2")
            .bind(product_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn list_images(&self, product_id: ProductId) -> RepoResult<Vec<ProductImage>> {
        let rows = sqlx::query_as::<_, ImageRow>(
            "SELECT id, product_id, image FROM product_images WHERE product_id = $1 ORDER BY id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| ProductImage { id: r.id, image: r.image }).collect())
    }

    async fn get_image(&self, product_id: ProductId, id: ImageId) -> RepoResult<Option<ProductImage>> {
        let row = sqlx::query_as::<_, ImageRow>(
            "SELECT id, product_id, image FROM product_images WHERE product_id = $1 AND id = $2",
        )
        .bind(product_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| ProductImage { id: r.id, image: r.image }))
    }

    async fn create_image(&self, product_id: ProductId, image: &str) -> RepoResult<ProductImage> {
        let row = sqlx::query_as::<_, ImageRow>(
            "INSERT INTO product_images (product_id, image) VALUES ($1, $2) RETURNING id, product_id, image",
        )
        .bind(product_id)
        .bind(image)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, NO_SUCH_PRODUCT))?;
        Ok(ProductImage { id: row.id, image: row.image })
    }

    async fn update_image(&self, product_id: ProductId, id: ImageId, image: &str) -> RepoResult<Option<ProductImage>> {
        let row = sqlx::query_as::<_, ImageRow>(
            "UPDATE product_images SET image = $3 WHERE product_id = $1 AND id = $2 RETURNING id, product_id, image",
        )
        .bind(product_id)
        .bind(id)
        .bind(image)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| ProductImage { id: r.id, image: r.image }))
    }

    async fn delete_image(&self, product_id: ProductId, id: ImageId) -> RepoResult<bool> {
        let deleted = sqlx::query("DELETE FROM product_images WHERE product_id = $1 AND id = $2")
            .bind(product_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_filters_sql() {
        let query = ProductQuery {
            search: Some("mug".into()),
            collection_id: Some(CollectionId::new(3)),
            price_above: Some(Decimal::new(5, 0)),
            price_below: None,
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_product_filters(&mut qb, &query);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM products WHERE TRUE AND (title ILIKE $1 OR description ILIKE $2) \
             AND collection_id = $3 AND unit_price > $4"
        );
    }

    #[test]
    fn test_order_clause_is_whitelisted() {
        assert_eq!(order_clause(None), " ORDER BY id ASC");
        assert_eq!(order_clause(Some(ProductOrdering::PriceDesc)), " ORDER BY unit_price DESC, id ASC");
    }
}
