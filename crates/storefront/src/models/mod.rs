//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the `sqlx` row types in
//! [`crate::db`].

pub mod account;
pub mod catalog;
pub mod order;
pub mod session;
pub mod transaction;

pub use account::{Customer, User, UserProfile};
pub use catalog::{Category, CategoryNode, Pagination, Product, ProductReview, ProductVariant};
pub use order::{
    Cart, CartOwner, LineAction, LineProduct, LineVariant, NewShippingAddress, Order, OrderLine,
    ShippingAddress,
};
pub use session::CurrentUser;
pub use transaction::{GatewayUpdate, Reconciliation, Transaction};
