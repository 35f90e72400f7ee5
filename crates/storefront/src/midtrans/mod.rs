//! Midtrans payment gateway integration.
//!
//! - Snap API: creates a hosted payment page for an order (`create_snap_transaction`)
//! - Core API: reports the authoritative status of a transaction (`transaction_status`)
//! - HTTP notifications: signed status reports pushed to `/payment/notification`
//!
//! Sandbox and production use different hosts; the server key is the same
//! credential for API auth and notification signatures.

mod client;
mod error;
pub mod types;

pub use client::{MidtransClient, notification_signature};
pub use error::MidtransError;
pub use types::{
    Callbacks, CreditCard, CustomerDetails, SnapAddress, SnapRequest, SnapResponse, StatusReport,
    TransactionDetails,
};
