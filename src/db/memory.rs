//! In-memory backend.
//!
//! Keeps normalised "tables" behind a single async mutex, so every
//! repository call is atomic. Referential rules mirror the `PostgreSQL`
//! schema: cascades, protected deletes and `SET NULL` on featured products.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{
    AccountRepository, CartRepository, CatalogRepository, OrderRepository, Page, ProductOrdering, ProductQuery,
    RepoResult, RepositoryError, Store, NO_SUCH_CART, NO_SUCH_COLLECTION, NO_SUCH_PRODUCT, NO_SUCH_PROMOTION,
};
use crate::domain::aggregates::{
    cart::merged_quantity, Cart, CartError, CartItem, Collection, CollectionDraft, Customer, CustomerError,
    CustomerProfile, NewUser, Order, OrderError, OrderItem, PaymentStatus, Product, ProductDraft, ProductImage,
    ProductSummary, Promotion, PromotionDraft, Review, ReviewDraft, User,
};
use crate::domain::value_objects::{
    CartId, CartItemId, CollectionId, CustomerId, ImageId, OrderId, OrderItemId, ProductId, PromotionId, ReviewId,
    UserId,
};

#[derive(Debug, Clone)]
struct CartLine {
    cart_id: CartId,
    product_id: ProductId,
    quantity: i32,
}

#[derive(Debug, Clone)]
struct OrderRecord {
    customer_id: CustomerId,
    placed_at: DateTime<Utc>,
    payment_status: PaymentStatus,
}

#[derive(Debug, Clone)]
struct OrderLine {
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    collections: BTreeMap<CollectionId, CollectionDraft>,
    promotions: BTreeMap<PromotionId, PromotionDraft>,
    /// Stored without images; those live in `images`.
    products: BTreeMap<ProductId, Product>,
    images: BTreeMap<ImageId, (ProductId, String)>,
    reviews: BTreeMap<ReviewId, Review>,
    carts: HashMap<CartId, DateTime<Utc>>,
    cart_items: BTreeMap<CartItemId, CartLine>,
    orders: BTreeMap<OrderId, OrderRecord>,
    order_items: BTreeMap<OrderItemId, OrderLine>,
    users: BTreeMap<UserId, (User, String)>,
    tokens: HashMap<String, (UserId, DateTime<Utc>)>,
    customers: BTreeMap<CustomerId, Customer>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn collection(&self, id: CollectionId) -> Option<Collection> {
        self.collections.get(&id).map(|c| Collection {
            id,
            title: c.title.clone(),
            featured_product: c.featured_product,
            products_count: self.products.values().filter(|p| p.collection == id).count() as i64,
        })
    }

    fn product(&self, id: ProductId) -> Option<Product> {
        self.products.get(&id).map(|p| Product {
            images: self
                .images
                .iter()
                .filter(|(_, (product_id, _))| *product_id == id)
                .map(|(image_id, (_, image))| ProductImage { id: *image_id, image: image.clone() })
                .collect(),
            ..p.clone()
        })
    }

    fn summary(&self, id: ProductId) -> Option<ProductSummary> {
        self.products.get(&id).map(Product::summary)
    }

    fn cart_item(&self, id: CartItemId) -> Option<CartItem> {
        let line = self.cart_items.get(&id)?;
        Some(CartItem { id, product: self.summary(line.product_id)?, quantity: line.quantity })
    }

    fn cart(&self, id: CartId) -> Option<Cart> {
        let created_at = *self.carts.get(&id)?;
        let items = self
            .cart_items
            .iter()
            .filter(|(_, line)| line.cart_id == id)
            .filter_map(|(item_id, _)| self.cart_item(*item_id))
            .collect();
        Some(Cart { id, created_at, items })
    }

    fn order(&self, id: OrderId) -> Option<Order> {
        let record = self.orders.get(&id)?;
        let items = self
            .order_items
            .iter()
            .filter(|(_, line)| line.order_id == id)
            .filter_map(|(item_id, line)| {
                Some(OrderItem { id: *item_id, quantity: line.quantity, product: self.summary(line.product_id)? })
            })
            .collect();
        Some(Order {
            id,
            customer_id: record.customer_id,
            placed_at: record.placed_at,
            payment_status: record.payment_status,
            items,
        })
    }

    fn check_product_refs(&self, draft: &ProductDraft) -> RepoResult<()> {
        if !self.collections.contains_key(&draft.collection) {
            return Err(RepositoryError::Invalid(NO_SUCH_COLLECTION.to_owned()));
        }
        if draft.promotions.iter().any(|id| !self.promotions.contains_key(id)) {
            return Err(RepositoryError::Invalid(NO_SUCH_PROMOTION.to_owned()));
        }
        Ok(())
    }

    fn check_featured_product(&self, draft: &CollectionDraft) -> RepoResult<()> {
        match draft.featured_product {
            Some(id) if !self.products.contains_key(&id) => Err(RepositoryError::Invalid(NO_SUCH_PRODUCT.to_owned())),
            _ => Ok(()),
        }
    }

    fn customer_for_user(&self, user_id: UserId) -> Option<Customer> {
        self.customers.values().find(|c| c.user_id == user_id).cloned()
    }
}

fn product_record(id: ProductId, draft: &ProductDraft) -> Product {
    let mut promotions = draft.promotions.clone();
    promotions.sort_unstable();
    promotions.dedup();
    Product {
        id,
        title: draft.title.clone(),
        description: draft.description.clone(),
        slug: draft.slug.clone(),
        inventory: draft.inventory,
        unit_price: draft.unit_price,
        collection: draft.collection,
        promotions,
        images: vec![],
        last_update: Utc::now(),
    }
}

/// Store that lives entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> RepoResult<()> {
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn list_collections(&self) -> RepoResult<Vec<Collection>> {
        let t = self.tables.lock().await;
        Ok(t.collections.keys().filter_map(|id| t.collection(*id)).collect())
    }

    async fn get_collection(&self, id: CollectionId) -> RepoResult<Option<Collection>> {
        Ok(self.tables.lock().await.collection(id))
    }

    async fn create_collection(&self, draft: &CollectionDraft) -> RepoResult<Collection> {
        let mut t = self.tables.lock().await;
        t.check_featured_product(draft)?;
        let id = CollectionId::new(t.next_id());
        t.collections.insert(id, draft.clone());
        t.collection(id).ok_or_else(|| RepositoryError::DataCorruption(format!("collection {id} vanished")))
    }

    async fn update_collection(&self, id: CollectionId, draft: &CollectionDraft) -> RepoResult<Option<Collection>> {
        let mut t = self.tables.lock().await;
        t.check_featured_product(draft)?;
        match t.collections.get_mut(&id) {
            Some(existing) => *existing = draft.clone(),
            None => return Ok(None),
        }
        Ok(t.collection(id))
    }

    async fn delete_collection(&self, id: CollectionId) -> RepoResult<bool> {
        let mut t = self.tables.lock().await;
        let Some(collection) = t.collection(id) else {
            return Ok(false);
        };
        collection.ensure_deletable()?;
        t.collections.remove(&id);
        Ok(true)
    }

    async fn list_promotions(&self) -> RepoResult<Vec<Promotion>> {
        let t = self.tables.lock().await;
        Ok(t.promotions
            .iter()
            .map(|(id, p)| Promotion { id: *id, description: p.description.clone(), discount: p.discount })
            .collect())
    }

    async fn get_promotion(&self, id: PromotionId) -> RepoResult<Option<Promotion>> {
        let t = self.tables.lock().await;
        Ok(t.promotions.get(&id).map(|p| Promotion { id, description: p.description.clone(), discount: p.discount }))
    }

    async fn create_promotion(&self, draft: &PromotionDraft) -> RepoResult<Promotion> {
        let mut t = self.tables.lock().await;
        let id = PromotionId::new(t.next_id());
        t.promotions.insert(id, draft.clone());
        Ok(Promotion { id, description: draft.description.clone(), discount: draft.discount })
    }

    async fn update_promotion(&self, id: PromotionId, draft: &PromotionDraft) -> RepoResult<Option<Promotion>> {
        let mut t = self.tables.lock().await;
        match t.promotions.get_mut(&id) {
            Some(existing) => *existing = draft.clone(),
            None => return Ok(None),
        }
        Ok(Some(Promotion { id, description: draft.description.clone(), discount: draft.discount }))
    }

    async fn delete_promotion(&self, id: PromotionId) -> RepoResult<bool> {
        let mut t = self.tables.lock().await;
        if t.promotions.remove(&id).is_none() {
            return Ok(false);
        }
        for product in t.products.values_mut() {
            product.promotions.retain(|p| *p != id);
        }
        Ok(true)
    }

    async fn list_products(&self, query: &ProductQuery) -> RepoResult<Page<Product>> {
        let t = self.tables.lock().await;
        let mut matching: Vec<&Product> = t
            .products
            .values()
            .filter(|p| query.matches_search(&p.title, &p.description))
            .filter(|p| query.collection_id.map_or(true, |c| p.collection == c))
            .filter(|p| query.price_above.map_or(true, |min| p.unit_price > min))
            .filter(|p| query.price_below.map_or(true, |max| p.unit_price < max))
            .collect();

        match query.ordering {
            Some(ProductOrdering::PriceAsc) => matching.sort_by(|a, b| a.unit_price.cmp(&b.unit_price).then(a.id.cmp(&b.id))),
            Some(ProductOrdering::PriceDesc) => matching.sort_by(|a, b| b.unit_price.cmp(&a.unit_price).then(a.id.cmp(&b.id))),
            Some(ProductOrdering::LastUpdateAsc) => matching.sort_by(|a, b| a.last_update.cmp(&b.last_update).then(a.id.cmp(&b.id))),
            Some(ProductOrdering::LastUpdateDesc) => matching.sort_by(|a, b| b.last_update.cmp(&a.last_update).then(a.id.cmp(&b.id))),
            None => {}
        }

        let total = matching.len() as i64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.page_size as usize)
            .filter_map(|p| t.product(p.id))
            .collect();
        Ok(Page { items, total, page: query.page, page_size: query.page_size })
    }

    async fn get_product(&self, id: ProductId) -> RepoResult<Option<Product>> {
        Ok(self.tables.lock().await.product(id))
    }

    async fn create_product(&self, draft: &ProductDraft) -> RepoResult<Product> {
        let mut t = self.tables.lock().await;
        t.check_product_refs(draft)?;
        let id = ProductId::new(t.next_id());
        t.products.insert(id, product_record(id, draft));
        t.product(id).ok_or_else(|| RepositoryError::DataCorruption(format!("product {id} vanished")))
    }

    async fn update_product(&self, id: ProductId, draft: &ProductDraft) -> RepoResult<Option<Product>> {
        let mut t = self.tables.lock().await;
        t.check_product_refs(draft)?;
        if !t.products.contains_key(&id) {
            return Ok(None);
        }
        t.products.insert(id, product_record(id, draft));
        Ok(t.product(id))
    }

    async fn delete_product(&self, id: ProductId) -> RepoResult<bool> {
        let mut t = self.tables.lock().await;
        let order_item_refs = t.order_items.values().filter(|l| l.product_id == id).count() as i64;
        Product::ensure_deletable(order_item_refs)?;
        if t.products.remove(&id).is_none() {
            return Ok(false);
        }
        t.images.retain(|_, (product_id, _)| *product_id != id);
        t.reviews.retain(|_, r| r.product_id != id);
        t.cart_items.retain(|_, l| l.product_id != id);
        for collection in t.collections.values_mut() {
            if collection.featured_product == Some(id) {
                collection.featured_product = None;
            }
        }
        Ok(true)
    }

    async fn list_reviews(&self, product_id: ProductId) -> RepoResult<Vec<Review>> {
        let t = self.tables.lock().await;
        Ok(t.reviews.values().filter(|r| r.product_id == product_id).cloned().collect())
    }

    async fn get_review(&self, product_id: ProductId, id: ReviewId) -> RepoResult<Option<Review>> {
        let t = self.tables.lock().await;
        Ok(t.reviews.get(&id).filter(|r| r.product_id == product_id).cloned())
    }

    async fn create_review(&self, product_id: ProductId, draft: &ReviewDraft) -> RepoResult<Review> {
        let mut t = self.tables.lock().await;
        if !t.products.contains_key(&product_id) {
            return Err(RepositoryError::Invalid(NO_SUCH_PRODUCT.to_owned()));
        }
        let review = Review {
            id: ReviewId::new(t.next_id()),
            product_id,
            name: draft.name.clone(),
            description: draft.description.clone(),
            date: Utc::now().date_naive(),
        };
        t.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn update_review(&self, product_id: ProductId, id: ReviewId, draft: &ReviewDraft) -> RepoResult<Option<Review>> {
        let mut t = self.tables.lock().await;
        let Some(review) = t.reviews.get_mut(&id).filter(|r| r.product_id == product_id) else {
            return Ok(None);
        };
        review.name = draft.name.clone();
        review.description = draft.description.clone();
        Ok(Some(review.clone()))
    }

    async fn delete_review(&self, product_id: ProductId, id: ReviewId) -> RepoResult<bool> {
        let mut t = self.tables.lock().await;
        if t.reviews.get(&id).is_some_and(|r| r.product_id == product_id) {
            t.reviews.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn list_images(&self, product_id: ProductId) -> RepoResult<Vec<ProductImage>> {
        let t = self.tables.lock().await;
        Ok(t.images
            .iter()
            .filter(|(_, (p, _))| *p == product_id)
            .map(|(id, (_, image))| ProductImage { id: *id, image: image.clone() })
            .collect())
    }

    async fn get_image(&self, product_id: ProductId, id: ImageId) -> RepoResult<Option<ProductImage>> {
        let t = self.tables.lock().await;
        Ok(t.images
            .get(&id)
            .filter(|(p, _)| *p == product_id)
            .map(|(_, image)| ProductImage { id, image: image.clone() }))
    }

    async fn create_image(&self, product_id: ProductId, image: &str) -> RepoResult<ProductImage> {
        let mut t = self.tables.lock().await;
        if !t.products.contains_key(&product_id) {
            return Err(RepositoryError::Invalid(NO_SUCH_PRODUCT.to_owned()));
        }
        let id = ImageId::new(t.next_id());
        t.images.insert(id, (product_id, image.to_owned()));
        Ok(ProductImage { id, image: image.to_owned() })
    }

    async fn update_image(&self, product_id: ProductId, id: ImageId, image: &str) -> RepoResult<Option<ProductImage>> {
        let mut t = self.tables.lock().await;
        let Some(entry) = t.images.get_mut(&id).filter(|(p, _)| *p == product_id) else {
            return Ok(None);
        };
        entry.1 = image.to_owned();
        Ok(Some(ProductImage { id, image: image.to_owned() }))
    }

    async fn delete_image(&self, product_id: ProductId, id: ImageId) -> RepoResult<bool> {
        let mut t = self.tables.lock().await;
        if t.images.get(&id).is_some_and(|(p, _)| *p == product_id) {
            t.images.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn create_cart(&self) -> RepoResult<Cart> {
        let cart = Cart::new();
        self.tables.lock().await.carts.insert(cart.id, cart.created_at);
        Ok(cart)
    }

    async fn get_cart(&self, id: CartId) -> RepoResult<Option<Cart>> {
        Ok(self.tables.lock().await.cart(id))
    }

    async fn delete_cart(&self, id: CartId) -> RepoResult<bool> {
        let mut t = self.tables.lock().await;
        if t.carts.remove(&id).is_none() {
            return Ok(false);
        }
        t.cart_items.retain(|_, l| l.cart_id != id);
        Ok(true)
    }

    async fn add_cart_item(&self, cart_id: CartId, product_id: ProductId, quantity: i32) -> RepoResult<CartItem> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity.into());
        }
        let mut t = self.tables.lock().await;
        if !t.carts.contains_key(&cart_id) {
            return Err(RepositoryError::NotFound(NO_SUCH_CART.to_owned()));
        }
        if !t.products.contains_key(&product_id) {
            return Err(RepositoryError::Invalid(NO_SUCH_PRODUCT.to_owned()));
        }

        let existing = t.cart(cart_id).and_then(|cart| cart.item_for(product_id).cloned());
        let id = match existing {
            Some(mut item) => {
                item.absorb(quantity)?;
                if let Some(line) = t.cart_items.get_mut(&item.id) {
                    line.quantity = item.quantity;
                }
                item.id
            }
            None => {
                let id = CartItemId::new(t.next_id());
                t.cart_items.insert(id, CartLine { cart_id, product_id, quantity: merged_quantity(0, quantity)? });
                id
            }
        };
        t.cart_item(id).ok_or_else(|| RepositoryError::NotFound(NO_SUCH_CART.to_owned()))
    }

    async fn update_cart_item(&self, cart_id: CartId, id: CartItemId, quantity: i32) -> RepoResult<Option<CartItem>> {
        let quantity = merged_quantity(0, quantity)?;
        let mut t = self.tables.lock().await;
        let Some(line) = t.cart_items.get_mut(&id).filter(|l| l.cart_id == cart_id) else {
            return Ok(None);
        };
        line.quantity = quantity;
        Ok(t.cart_item(id))
    }

    async fn delete_cart_item(&self, cart_id: CartId, id: CartItemId) -> RepoResult<bool> {
        let mut t = self.tables.lock().await;
        if t.cart_items.get(&id).is_some_and(|l| l.cart_id == cart_id) {
            t.cart_items.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn place_order(&self, cart_id: CartId, customer_id: CustomerId) -> RepoResult<Order> {
        let mut t = self.tables.lock().await;
        let cart = t.cart(cart_id).ok_or(OrderError::CartNotFound)?;
        let lines = Order::lines_from_cart(&cart)?;
        if !t.customers.contains_key(&customer_id) {
            return Err(OrderError::CustomerNotFound.into());
        }

        let order_id = OrderId::new(t.next_id());
        t.orders.insert(order_id, OrderRecord { customer_id, placed_at: Utc::now(), payment_status: PaymentStatus::Pending });
        for line in lines {
            let item_id = OrderItemId::new(t.next_id());
            t.order_items.insert(item_id, OrderLine { order_id, product_id: line.product_id, quantity: line.quantity });
        }
        t.carts.remove(&cart_id);
        t.cart_items.retain(|_, l| l.cart_id != cart_id);

        t.order(order_id).ok_or_else(|| RepositoryError::DataCorruption(format!("order {order_id} vanished")))
    }

    async fn list_orders(&self, customer_id: Option<CustomerId>) -> RepoResult<Vec<Order>> {
        let t = self.tables.lock().await;
        Ok(t.orders
            .iter()
            .filter(|(_, o)| customer_id.map_or(true, |c| o.customer_id == c))
            .filter_map(|(id, _)| t.order(*id))
            .collect())
    }

    async fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>> {
        Ok(self.tables.lock().await.order(id))
    }

    async fn update_payment_status(&self, id: OrderId, status: PaymentStatus) -> RepoResult<Option<Order>> {
        let mut t = self.tables.lock().await;
        let Some(record) = t.orders.get_mut(&id) else {
            return Ok(None);
        };
        record.payment_status = record.payment_status.transition_to(status)?;
        Ok(t.order(id))
    }

    async fn delete_order(&self, id: OrderId) -> RepoResult<bool> {
        let mut t = self.tables.lock().await;
        if t.orders.remove(&id).is_none() {
            return Ok(false);
        }
        t.order_items.retain(|_, l| l.order_id != id);
        Ok(true)
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> RepoResult<User> {
        let mut t = self.tables.lock().await;
        if t.users.values().any(|(u, _)| u.username == user.username) {
            return Err(RepositoryError::Conflict("A user with that username already exists.".to_owned()));
        }
        let created = User {
            id: UserId::new(t.next_id()),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_staff: user.is_staff,
            date_joined: Utc::now(),
        };
        t.users.insert(created.id, (created.clone(), user.password_hash.clone()));
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).map(|(u, _)| u.clone()))
    }

    async fn find_credentials(&self, username: &str) -> RepoResult<Option<(User, String)>> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|(u, _)| u.username == username).cloned())
    }

    async fn store_token(&self, token: &str, user_id: UserId, expires_at: DateTime<Utc>) -> RepoResult<()> {
        self.tables.lock().await.tokens.insert(token.to_owned(), (user_id, expires_at));
        Ok(())
    }

    async fn user_for_token(&self, token: &str, now: DateTime<Utc>) -> RepoResult<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.tokens
            .get(token)
            .filter(|(_, expires_at)| *expires_at > now)
            .and_then(|(user_id, _)| t.users.get(user_id))
            .map(|(u, _)| u.clone()))
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let mut t = self.tables.lock().await;
        let before = t.tokens.len();
        t.tokens.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - t.tokens.len()) as u64)
    }

    async fn provision_customer(&self, user_id: UserId) -> RepoResult<Customer> {
        self.create_customer(user_id, &CustomerProfile::default()).await
    }

    async fn list_customers(&self) -> RepoResult<Vec<Customer>> {
        Ok(self.tables.lock().await.customers.values().cloned().collect())
    }

    async fn get_customer(&self, id: CustomerId) -> RepoResult<Option<Customer>> {
        Ok(self.tables.lock().await.customers.get(&id).cloned())
    }

    async fn customer_for_user(&self, user_id: UserId) -> RepoResult<Option<Customer>> {
        Ok(self.tables.lock().await.customer_for_user(user_id))
    }

    async fn create_customer(&self, user_id: UserId, profile: &CustomerProfile) -> RepoResult<Customer> {
        let mut t = self.tables.lock().await;
        if !t.users.contains_key(&user_id) {
            return Err(CustomerError::UnknownUser.into());
        }
        if let Some(existing) = t.customer_for_user(user_id) {
            return Ok(existing);
        }
        let customer = Customer {
            id: CustomerId::new(t.next_id()),
            user_id,
            phone: profile.phone.clone(),
            birth_date: profile.birth_date,
            membership: profile.membership,
        };
        t.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn update_customer(&self, id: CustomerId, profile: &CustomerProfile) -> RepoResult<Option<Customer>> {
        let mut t = self.tables.lock().await;
        let Some(customer) = t.customers.get_mut(&id) else {
            return Ok(None);
        };
        customer.phone = profile.phone.clone();
        customer.birth_date = profile.birth_date;
        customer.membership = profile.membership;
        Ok(Some(customer.clone()))
    }

    async fn delete_customer(&self, id: CustomerId) -> RepoResult<bool> {
        let mut t = self.tables.lock().await;
        let order_count = t.orders.values().filter(|o| o.customer_id == id).count() as i64;
        Customer::ensure_deletable(order_count)?;
        Ok(t.customers.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    async fn seeded() -> (MemoryStore, ProductId, ProductId) {
        let store = MemoryStore::new();
        let collection = store
            .create_collection(&CollectionDraft { title: "Kitchen".into(), featured_product: None })
            .await
            .unwrap();
        let mut ids = vec![];
        for (title, price) in [("Mug", 1_000), ("Kettle", 4_550)] {
            let p = store
                .create_product(&ProductDraft {
                    title: title.into(),
                    description: format!("A {title}"),
                    slug: None,
                    inventory: 10,
                    unit_price: Decimal::new(price, 2),
                    collection: collection.id,
                    promotions: vec![],
                })
                .await
                .unwrap();
            ids.push(p.id);
        }
        (store, ids[0], ids[1])
    }

    async fn customer(store: &MemoryStore) -> Customer {
        let user = store
            .create_user(&NewUser {
                username: "ada".into(),
                email: "ada@example.com".into(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "x".into(),
                is_staff: false,
            })
            .await
            .unwrap();
        store.provision_customer(user.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_add_same_product_merges_line() {
        let (store, mug, _) = seeded().await;
        let cart = store.create_cart().await.unwrap();
        let first = store.add_cart_item(cart.id, mug, 2).await.unwrap();
        let second = store.add_cart_item(cart.id, mug, 3).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);
        assert_eq!(store.get_cart(cart.id).await.unwrap().unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_moves_lines_and_drops_cart() {
        let (store, mug, kettle) = seeded().await;
        let customer = customer(&store).await;
        let cart = store.create_cart().await.unwrap();
        store.add_cart_item(cart.id, mug, 2).await.unwrap();
        store.add_cart_item(cart.id, kettle, 1).await.unwrap();

        let order = store.place_order(cart.id, customer.id).await.unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.items[1].quantity, 1);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(store.get_cart(cart.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_place_order_rejects_empty_and_missing_carts() {
        let (store, _, _) = seeded().await;
        let customer = customer(&store).await;
        let empty = store.create_cart().await.unwrap();

        let err = store.place_order(empty.id, customer.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Invalid(m) if m == "Cart is empty"));
        let err = store.place_order(CartId::generate(), customer.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Invalid(m) if m == "No cart with that ID exists"));
        assert!(store.list_orders(None).await.unwrap().is_empty());
        assert!(store.get_cart(empty.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_product_in_order_is_protected() {
        let (store, mug, kettle) = seeded().await;
        let customer = customer(&store).await;
        let cart = store.create_cart().await.unwrap();
        store.add_cart_item(cart.id, mug, 1).await.unwrap();
        store.place_order(cart.id, customer.id).await.unwrap();

        assert!(matches!(store.delete_product(mug).await, Err(RepositoryError::Protected(_))));
        assert!(store.delete_product(kettle).await.unwrap());
        assert!(matches!(store.delete_customer(customer.id).await, Err(RepositoryError::Protected(_))));
    }

    #[tokio::test]
    async fn test_product_delete_clears_featured_reference() {
        let (store, mug, _) = seeded().await;
        let featured = store
            .create_collection(&CollectionDraft { title: "Featured".into(), featured_product: Some(mug) })
            .await
            .unwrap();
        assert!(matches!(store.delete_collection(featured.id).await, Err(RepositoryError::Protected(_))));
        store.delete_product(mug).await.unwrap();
        assert_eq!(store.get_collection(featured.id).await.unwrap().unwrap().featured_product, None);
        assert!(store.delete_collection(featured.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_filters_and_orders() {
        let (store, mug, kettle) = seeded().await;
        let page = store
            .list_products(&ProductQuery { ordering: Some(ProductOrdering::PriceDesc), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.items.iter().map(|p| p.id).collect::<Vec<_>>(), vec![kettle, mug]);

        let cheap = store
            .list_products(&ProductQuery { price_below: Some(Decimal::new(20, 0)), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(cheap.total, 1);
        assert_eq!(cheap.items[0].id, mug);

        let searched = store
            .list_products(&ProductQuery { search: Some("kett".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(searched.items.len(), 1);
    }

    #[tokio::test]
    async fn test_provision_customer_is_idempotent() {
        let store = MemoryStore::new();
        let c1 = customer(&store).await;
        let c2 = store.provision_customer(c1.user_id).await.unwrap();
        assert_eq!(c1, c2);
        assert_eq!(store.list_customers().await.unwrap().len(), 1);
    }
}
