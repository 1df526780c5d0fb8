//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod customer;

pub use product::{
    CatalogError, Collection, CollectionDraft, Product, ProductDraft, ProductImage, ProductSummary, Promotion,
    PromotionDraft, Review, ReviewDraft,
};
pub use order::{Order, OrderError, OrderItem, OrderLine, PaymentStatus};
pub use cart::{Cart, CartError, CartItem};
pub use customer::{Customer, CustomerError, CustomerProfile, Membership, NewUser, User};
