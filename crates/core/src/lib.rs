//! Warung Core - Shared domain types.
//!
//! This crate provides the types used across the Warung components:
//! - `storefront` - Public catalog, cart, checkout and payment API
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure arithmetic - no I/O, no
//! database access, no HTTP clients. Pricing rules live here so that both the
//! storefront and the seeding tools agree on how a line total is computed.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, statuses, and validated value types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
