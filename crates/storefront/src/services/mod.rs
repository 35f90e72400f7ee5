//! Business logic services for the storefront.
//!
//! Services combine repositories (and the gateway client) into the
//! operations exposed by the HTTP routes.
//!
//! # Services
//!
//! - `account` - Profile and customer details of logged-in users
//! - `auth` - Username/password accounts
//! - `catalog` - Product listing, product pages and the cached category tree
//! - `cart` - Cart mutation and guest cart merge
//! - `checkout` - Checkout summary, order submission and order history
//! - `payment` - Midtrans Snap payments and status reconciliation
//! - `reviews` - Product reviews and rating aggregation

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod payment;
pub mod reviews;
