//! Core types for Warung.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod rating;
pub mod reference;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, DiscountPercent, DiscountPercentError, Price};
pub use rating::{Rating, RatingError};
pub use reference::{GuestToken, TransactionRef};
pub use status::*;
