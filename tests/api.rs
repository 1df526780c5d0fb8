//! HTTP-level tests against the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use opensase_store::{
    config::StoreConfig,
    db::{memory::MemoryStore, AccountRepository},
    domain::{aggregates::NewUser, events::DomainEvent},
    notifications::{EventError, EventListener},
    routes, AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "admin-token";

struct TestApp {
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_listeners(vec![]).await
    }

    async fn with_listeners(listeners: Vec<Arc<dyn EventListener>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let admin = store
            .create_user(&NewUser {
                username: "admin".into(),
                email: "admin@example.com".into(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "not-used".into(),
                is_staff: true,
            })
            .await
            .unwrap();
        store.store_token(ADMIN_TOKEN, admin.id, Utc::now() + Duration::hours(1)).await.unwrap();

        let state = AppState::new(StoreConfig::for_testing(), store, listeners);
        Self { router: routes::router(state) }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Registers a user and returns a bearer token for them.
    async fn signup(&self, username: &str) -> String {
        let (status, _) = self
            .post(
                "/auth/users",
                None,
                json!({ "username": username, "email": format!("{username}@example.com"), "password": "s3cret-pass" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) =
            self.post("/auth/tokens", None, json!({ "username": username, "password": "s3cret-pass" })).await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_owned()
    }

    async fn product(&self, collection: i64, title: &str, price: &str) -> i64 {
        let (status, body) = self
            .post(
                "/products",
                Some(ADMIN_TOKEN),
                json!({ "title": title, "description": format!("{title} description"), "inventory": 5, "unit_price": price, "collection": collection }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    async fn collection(&self, title: &str) -> i64 {
        let (status, body) = self.post("/collections", Some(ADMIN_TOKEN), json!({ "title": title })).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn cart(&self, token: &str) -> String {
        let (status, body) = self.send(Method::POST, "/carts", Some(token), None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_owned()
    }

    async fn add_item(&self, token: &str, cart: &str, product: i64, quantity: i32) -> (StatusCode, Value) {
        self.post(&format!("/carts/{cart}/items"), Some(token), json!({ "product_id": product, "quantity": quantity }))
            .await
    }
}

#[tokio::test]
async fn test_checkout_moves_cart_into_order() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;
    let collection = app.collection("Kitchen").await;
    let mug = app.product(collection, "Mug", "10.00").await;
    let kettle = app.product(collection, "Kettle", "45.50").await;

    let cart = app.cart(&token).await;
    app.add_item(&token, &cart, mug, 2).await;
    app.add_item(&token, &cart, kettle, 1).await;

    let (status, cart_body) = app.get(&format!("/carts/{cart}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart_body["cart_total_price"], "65.50");

    let (status, order) = app.post("/orders", Some(&token), json!({ "cart_id": cart })).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["payment_status"], "P");
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["product"]["id"], mug);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[1]["product"]["id"], kettle);
    assert_eq!(items[1]["quantity"], 1);

    let (status, _) = app.get(&format!("/carts/{cart}"), Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, orders) = app.get("/orders", Some(&token)).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_rejects_missing_and_empty_carts() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;

    let (status, body) =
        app.post("/orders", Some(&token), json!({ "cart_id": "2b8e1f4c-6a55-4b9e-9d7e-2d0f7c3e8a11" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No cart with that ID exists");

    let cart = app.cart(&token).await;
    let (status, body) = app.post("/orders", Some(&token), json!({ "cart_id": cart })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cart is empty");

    let (_, orders) = app.get("/orders", Some(ADMIN_TOKEN)).await;
    assert!(orders.as_array().unwrap().is_empty());
    let (status, _) = app.get(&format!("/carts/{cart}"), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_adding_same_product_twice_merges_quantity() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;
    let collection = app.collection("Kitchen").await;
    let mug = app.product(collection, "Mug", "10.00").await;
    let cart = app.cart(&token).await;

    let (_, first) = app.add_item(&token, &cart, mug, 2).await;
    let (status, second) = app.add_item(&token, &cart, mug, 3).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["quantity"], 5);
    assert_eq!(second["item_total_price"], "50.00");

    let (_, items) = app.get(&format!("/carts/{cart}/items"), Some(&token)).await;
    assert_eq!(items.as_array().unwrap().len(), 1);

    let (status, body) = app.add_item(&token, &cart, 9_999, 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No product with that product ID exists");
}

#[tokio::test]
async fn test_product_in_order_cannot_be_deleted() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;
    let collection = app.collection("Kitchen").await;
    let mug = app.product(collection, "Mug", "10.00").await;
    let kettle = app.product(collection, "Kettle", "45.50").await;

    let cart = app.cart(&token).await;
    app.add_item(&token, &cart, mug, 1).await;
    app.post("/orders", Some(&token), json!({ "cart_id": cart })).await;

    let (status, body) = app.send(Method::DELETE, &format!("/products/{mug}"), Some(ADMIN_TOKEN), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "product cannot be deleted, associated with orderitem");

    let (status, _) = app.send(Method::DELETE, &format!("/products/{kettle}"), Some(ADMIN_TOKEN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/products/{kettle}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_collection_with_featured_product_is_protected() {
    let app = TestApp::new().await;
    let collection = app.collection("Kitchen").await;
    let mug = app.product(collection, "Mug", "10.00").await;
    let (_, featured) =
        app.post("/collections", Some(ADMIN_TOKEN), json!({ "title": "Picks", "featured_product": mug })).await;
    let featured = featured["id"].as_i64().unwrap();

    let (status, _) = app.send(Method::DELETE, &format!("/collections/{featured}"), Some(ADMIN_TOKEN), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (_, body) = app.get(&format!("/collections/{collection}"), None).await;
    assert_eq!(body["products_count"], 1);
}

#[tokio::test]
async fn test_signup_creates_one_bronze_customer() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;

    let (status, me) = app.get("/customers/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["membership"], "B");

    let (_, customers) = app.get("/customers", Some(ADMIN_TOKEN)).await;
    assert_eq!(customers.as_array().unwrap().len(), 1);

    let (status, _) = app
        .post("/auth/users", None, json!({ "username": "ada", "email": "ada2@example.com", "password": "s3cret-pass" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_permissions() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;
    let other = app.signup("grace").await;
    let collection = app.collection("Kitchen").await;
    let mug = app.product(collection, "Mug", "10.00").await;
    let product = json!({ "title": "Cup", "inventory": 1, "unit_price": "1.00", "collection": collection });

    assert_eq!(app.post("/products", None, product.clone()).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.post("/products", Some(&token), product).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.get("/products", None).await.0, StatusCode::OK);
    assert_eq!(app.get("/products", Some("bogus")).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.send(Method::POST, "/carts", None, None).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/customers", Some(&token)).await.0, StatusCode::FORBIDDEN);

    let review = json!({ "name": "Ada", "description": "Holds coffee." });
    assert_eq!(app.post(&format!("/products/{mug}/reviews"), None, review.clone()).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.post(&format!("/products/{mug}/reviews"), Some(&token), review).await.0, StatusCode::CREATED);

    let cart = app.cart(&token).await;
    app.add_item(&token, &cart, mug, 1).await;
    let (_, order) = app.post("/orders", Some(&token), json!({ "cart_id": cart })).await;
    let order_id = order["id"].as_i64().unwrap();

    assert_eq!(app.get(&format!("/orders/{order_id}"), Some(&other)).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&format!("/orders/{order_id}"), Some(ADMIN_TOKEN)).await.0, StatusCode::OK);
    let (_, others) = app.get("/orders", Some(&other)).await;
    assert!(others.as_array().unwrap().is_empty());

    let patch = json!({ "payment_status": "C" });
    assert_eq!(
        app.send(Method::PATCH, &format!("/orders/{order_id}"), Some(&token), Some(patch)).await.0,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_payment_status_transitions() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;
    let collection = app.collection("Kitchen").await;
    let mug = app.product(collection, "Mug", "10.00").await;
    let cart = app.cart(&token).await;
    app.add_item(&token, &cart, mug, 1).await;
    let (_, order) = app.post("/orders", Some(&token), json!({ "cart_id": cart })).await;
    let uri = format!("/orders/{}", order["id"]);

    let (status, body) =
        app.send(Method::PATCH, &uri, Some(ADMIN_TOKEN), Some(json!({ "payment_status": "C" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "C");

    let (status, _) = app.send(Method::PATCH, &uri, Some(ADMIN_TOKEN), Some(json!({ "payment_status": "F" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.send(Method::DELETE, &uri, Some(ADMIN_TOKEN), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, Some(ADMIN_TOKEN)).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_listing_filters_orders_and_pages() {
    let app = TestApp::new().await;
    let kitchen = app.collection("Kitchen").await;
    let garden = app.collection("Garden").await;
    app.product(kitchen, "Mug", "10.00").await;
    app.product(kitchen, "Kettle", "45.50").await;
    app.product(garden, "Spade", "20.00").await;

    let (status, page) = app.get("/products?ordering=-unit_price", None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = page["data"].as_array().unwrap().iter().map(|p| p["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Kettle", "Spade", "Mug"]);
    assert_eq!(page["total"], 3);
    assert_eq!(page["next_page"], Value::Null);
    assert_eq!(page["data"][0]["price_with_tax"], "50.05");

    let (_, page) = app.get(&format!("/products?collection_id={kitchen}&unit_price__lt=20"), None).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["title"], "Mug");

    let (_, page) = app.get("/products?search=SPADE", None).await;
    assert_eq!(page["total"], 1);

    let (status, _) = app.get("/products?ordering=title", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

struct BrokenBroker;

#[async_trait]
impl EventListener for BrokenBroker {
    fn name(&self) -> &str {
        "broken_broker"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), EventError> {
        match event {
            DomainEvent::OrderCreated { .. } => Err(EventError::Publish("broker down".into())),
            DomainEvent::UserCreated { .. } => Ok(()),
        }
    }
}

#[tokio::test]
async fn test_order_survives_failing_listener() {
    let app = TestApp::with_listeners(vec![Arc::new(BrokenBroker)]).await;
    let token = app.signup("ada").await;
    let collection = app.collection("Kitchen").await;
    let mug = app.product(collection, "Mug", "10.00").await;
    let cart = app.cart(&token).await;
    app.add_item(&token, &cart, mug, 1).await;

    let (status, order) = app.post("/orders", Some(&token), json!({ "cart_id": cart })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_health_probes() {
    let app = TestApp::new().await;
    assert_eq!(app.get("/health", None).await.0, StatusCode::OK);
    let (status, body) = app.get("/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

struct RejectsSignups;

#[async_trait]
impl EventListener for RejectsSignups {
    fn name(&self) -> &str {
        "rejects_signups"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), EventError> {
        match event {
            DomainEvent::UserCreated { .. } => Err(EventError::Publish("broker down".into())),
            DomainEvent::OrderCreated { .. } => Ok(()),
        }
    }
}

#[tokio::test]
async fn test_signup_survives_failing_best_effort_listener() {
    let app = TestApp::with_listeners(vec![Arc::new(RejectsSignups)]).await;
    let token = app.signup("ada").await;

    let (_, customers) = app.get("/customers", Some(ADMIN_TOKEN)).await;
    assert_eq!(customers.as_array().unwrap().len(), 1);
    let (status, me) = app.get("/customers/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["membership"], "B");
}

#[tokio::test]
async fn test_product_images_crud() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;
    let collection = app.collection("Kitchen").await;
    let mug = app.product(collection, "Mug", "10.00").await;
    let images = format!("/products/{mug}/images");

    let image = json!({ "image": "store/images/mug.jpg" });
    assert_eq!(app.post(&images, Some(&token), image.clone()).await.0, StatusCode::FORBIDDEN);
    let (status, created) = app.post(&images, Some(ADMIN_TOKEN), image).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["image"], "store/images/mug.jpg");
    let uri = format!("{images}/{}", created["id"]);

    let (status, updated) =
        app.send(Method::PUT, &uri, Some(ADMIN_TOKEN), Some(json!({ "image": "store/images/mug-2.jpg" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["image"], "store/images/mug-2.jpg");

    let (_, listed) = app.get(&images, None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let (_, product) = app.get(&format!("/products/{mug}"), None).await;
    assert_eq!(product["images"][0]["image"], "store/images/mug-2.jpg");

    assert_eq!(app.send(Method::DELETE, &uri, Some(ADMIN_TOKEN), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/products/9999/images", None).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_promotions_crud() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;
    let promotion = json!({ "description": "Spring sale", "discount": 0.15 });

    assert_eq!(app.post("/promotions", Some(&token), promotion.clone()).await.0, StatusCode::FORBIDDEN);
    let (status, created) = app.post("/promotions", Some(ADMIN_TOKEN), promotion).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["description"], "Spring sale");
    let id = created["id"].as_i64().unwrap();
    let uri = format!("/promotions/{id}");

    let (status, updated) = app
        .send(Method::PUT, &uri, Some(ADMIN_TOKEN), Some(json!({ "description": "Summer sale", "discount": 0.2 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], "Summer sale");
    assert_eq!(updated["discount"], 0.2);

    let negative = json!({ "description": "Oops", "discount": -1.0 });
    assert_eq!(app.post("/promotions", Some(ADMIN_TOKEN), negative).await.0, StatusCode::BAD_REQUEST);

    let collection = app.collection("Kitchen").await;
    let (status, product) = app
        .post(
            "/products",
            Some(ADMIN_TOKEN),
            json!({ "title": "Mug", "inventory": 5, "unit_price": "10.00", "collection": collection, "promotions": [id] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(product["promotions"], json!([id]));

    let (_, listed) = app.get("/promotions", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    assert_eq!(app.send(Method::DELETE, &uri, Some(ADMIN_TOKEN), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, None).await.0, StatusCode::NOT_FOUND);
    let (_, product) = app.get(&format!("/products/{}", product["id"]), None).await;
    assert_eq!(product["promotions"], json!([]));
}

#[tokio::test]
async fn test_cart_item_update_and_delete() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;
    let collection = app.collection("Kitchen").await;
    let mug = app.product(collection, "Mug", "10.00").await;
    let kettle = app.product(collection, "Kettle", "45.50").await;
    let cart = app.cart(&token).await;

    let (_, line) = app.add_item(&token, &cart, mug, 2).await;
    app.add_item(&token, &cart, kettle, 1).await;
    let uri = format!("/carts/{cart}/items/{}", line["id"]);

    let (status, updated) = app.send(Method::PUT, &uri, Some(&token), Some(json!({ "quantity": 7 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["quantity"], 7);
    assert_eq!(updated["item_total_price"], "70.00");

    let (status, _) = app.send(Method::PUT, &uri, Some(&token), Some(json!({ "quantity": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.send(Method::DELETE, &uri, Some(&token), None).await.0, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, Some(&token)).await.0, StatusCode::NOT_FOUND);

    let (_, body) = app.get(&format!("/carts/{cart}"), Some(&token)).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["cart_total_price"], "45.50");
}

#[tokio::test]
async fn test_admin_customer_creation() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;
    let (_, user) = app.get("/auth/users/me", Some(&token)).await;
    let (_, me) = app.get("/customers/me", Some(&token)).await;

    let (status, body) = app.post("/customers", Some(ADMIN_TOKEN), json!({ "user_id": 9999 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No registration found for the user with this user id.");

    let (status, existing) =
        app.post("/customers", Some(ADMIN_TOKEN), json!({ "user_id": user["id"], "membership": "G" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(existing["id"], me["id"]);
    assert_eq!(existing["membership"], "B");

    let (_, customers) = app.get("/customers", Some(ADMIN_TOKEN)).await;
    assert_eq!(customers.as_array().unwrap().len(), 1);
    assert_eq!(app.post("/customers", Some(&token), json!({ "user_id": user["id"] })).await.0, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_customer_updates_own_profile() {
    let app = TestApp::new().await;
    let token = app.signup("ada").await;

    let profile = json!({ "phone": "+44 20 7946 0000", "birth_date": "1815-12-10", "membership": "S" });
    let (status, updated) = app.send(Method::PUT, "/customers/me", Some(&token), Some(profile)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["phone"], "+44 20 7946 0000");
    assert_eq!(updated["birth_date"], "1815-12-10");
    assert_eq!(updated["membership"], "S");

    let (_, me) = app.get("/customers/me", Some(&token)).await;
    assert_eq!(me, updated);
    assert_eq!(app.send(Method::PUT, "/customers/me", None, Some(json!({}))).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_product_listing_by_last_update() {
    let app = TestApp::new().await;
    let collection = app.collection("Kitchen").await;
    let mug = app.product(collection, "Mug", "10.00").await;
    app.product(collection, "Kettle", "45.50").await;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/products/{mug}"),
            Some(ADMIN_TOKEN),
            Some(json!({ "title": "Mug", "inventory": 3, "unit_price": "12.00", "collection": collection })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let titles = |page: &Value| -> Vec<String> {
        page["data"].as_array().unwrap().iter().map(|p| p["title"].as_str().unwrap().to_owned()).collect()
    };
    let (_, oldest_first) = app.get("/products?ordering=last_update", None).await;
    assert_eq!(titles(&oldest_first), vec!["Kettle", "Mug"]);
    let (_, newest_first) = app.get("/products?ordering=-last_update", None).await;
    assert_eq!(titles(&newest_first), vec!["Mug", "Kettle"]);
}

#[tokio::test]
async fn test_collection_with_products_cannot_be_deleted() {
    let app = TestApp::new().await;
    let collection = app.collection("Kitchen").await;
    let mug = app.product(collection, "Mug", "10.00").await;
    let uri = format!("/collections/{collection}");

    let (status, body) = app.send(Method::DELETE, &uri, Some(ADMIN_TOKEN), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "collection could not be deleted, it still contains products");

    app.send(Method::DELETE, &format!("/products/{mug}"), Some(ADMIN_TOKEN), None).await;
    assert_eq!(app.send(Method::DELETE, &uri, Some(ADMIN_TOKEN), None).await.0, StatusCode::NO_CONTENT);
}
