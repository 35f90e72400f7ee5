//! Midtrans HTTP client.
//!
//! Creates Snap transactions, fetches transaction status, and verifies
//! notification signatures.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use tracing::{debug, error, instrument};
use url::Url;

use warung_core::TransactionRef;

use super::error::MidtransError;
use super::types::{SnapErrorResponse, SnapRequest, SnapResponse, StatusReport};
use crate::config::MidtransConfig;

const SNAP_SANDBOX_URL: &str = "https://app.sandbox.midtrans.com/snap/v1/transactions";
const SNAP_PRODUCTION_URL: &str = "https://app.midtrans.com/snap/v1/transactions";
const API_SANDBOX_BASE: &str = "https://api.sandbox.midtrans.com/v2/";
const API_PRODUCTION_BASE: &str = "https://api.midtrans.com/v2/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Midtrans API client.
#[derive(Clone)]
pub struct MidtransClient {
    client: Client,
    server_key: SecretString,
    client_key: String,
    merchant_id: String,
    is_production: bool,
}

impl std::fmt::Debug for MidtransClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidtransClient")
            .field("server_key", &"[REDACTED]")
            .field("client_key", &self.client_key)
            .field("merchant_id", &self.merchant_id)
            .field("is_production", &self.is_production)
            .finish_non_exhaustive()
    }
}

impl MidtransClient {
    /// Create a new Midtrans client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MidtransConfig) -> Result<Self, MidtransError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            server_key: config.server_key.clone(),
            client_key: config.client_key.clone(),
            merchant_id: config.merchant_id.clone(),
            is_production: config.is_production,
        })
    }

    /// Client key for the browser-side Snap popup.
    #[must_use]
    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    /// Merchant ID.
    #[must_use]
    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    /// Whether the client talks to the production gateway.
    #[must_use]
    pub const fn is_production(&self) -> bool {
        self.is_production
    }

    const fn snap_url(&self) -> &'static str {
        if self.is_production {
            SNAP_PRODUCTION_URL
        } else {
            SNAP_SANDBOX_URL
        }
    }

    fn status_url(&self, reference: &TransactionRef) -> Result<Url, MidtransError> {
        let base = if self.is_production {
            API_PRODUCTION_BASE
        } else {
            API_SANDBOX_BASE
        };
        let mut url = Url::parse(base)?;
        url.path_segments_mut()
            .map_err(|()| MidtransError::Parse("status base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(reference.as_str())
            .push("status");
        Ok(url)
    }

    /// Create a Snap transaction.
    ///
    /// Returns the parsed response along with the raw JSON for storage.
    ///
    /// # Errors
    ///
    /// Returns `MidtransError::Http` if the request fails.
    /// Returns `MidtransError::Api` if Midtrans rejects the request.
    /// Returns `MidtransError::Parse` if the response cannot be read.
    #[instrument(skip(self, request), fields(order_id = %request.transaction_details.order_id))]
    pub async fn create_snap_transaction(
        &self,
        request: &SnapRequest,
    ) -> Result<(SnapResponse, serde_json::Value), MidtransError> {
        let response = self
            .client
            .post(self.snap_url())
            .basic_auth(self.server_key.expose_secret(), Some(""))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<SnapErrorResponse>(&body)
                .ok()
                .filter(|e| !e.error_messages.is_empty())
                .map_or(body, |e| e.error_messages.join("; "));
            error!(status = status.as_u16(), %message, "Snap transaction rejected");
            return Err(MidtransError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| MidtransError::Parse(e.to_string()))?;
        let snap: SnapResponse = serde_json::from_value(raw.clone())
            .map_err(|e| MidtransError::Parse(e.to_string()))?;

        debug!("Snap transaction created");

        Ok((snap, raw))
    }

    /// Fetch the current status of a transaction from the gateway.
    ///
    /// The status API answers unknown transactions with HTTP 200 and a
    /// `status_code` of `"404"` in the body; any non-2xx `status_code` is an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `MidtransError::Http` if the request fails.
    /// Returns `MidtransError::Api` if Midtrans reports an error.
    /// Returns `MidtransError::Parse` if the response cannot be read.
    #[instrument(skip(self), fields(%reference))]
    pub async fn transaction_status(
        &self,
        reference: &TransactionRef,
    ) -> Result<(StatusReport, serde_json::Value), MidtransError> {
        let response = self
            .client
            .get(self.status_url(reference)?)
            .basic_auth(self.server_key.expose_secret(), Some(""))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(MidtransError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let raw: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| MidtransError::Parse(e.to_string()))?;
        check_body_status(&raw)?;

        let report: StatusReport = serde_json::from_value(raw.clone())
            .map_err(|e| MidtransError::Parse(e.to_string()))?;

        debug!(transaction_status = %report.transaction_status, "Fetched transaction status");

        Ok((report, raw))
    }

    /// Verify the signature of a notification.
    ///
    /// # Errors
    ///
    /// Returns `MidtransError::InvalidSignature` if the signature is missing
    /// or does not match.
    #[instrument(skip(self, report), fields(order_id = %report.order_id))]
    pub fn verify_notification(&self, report: &StatusReport) -> Result<(), MidtransError> {
        let provided = report
            .signature_key
            .as_deref()
            .ok_or_else(|| MidtransError::InvalidSignature("Missing signature".to_string()))?;

        let expected = notification_signature(
            &report.order_id,
            &report.status_code,
            &report.gross_amount,
            self.server_key.expose_secret(),
        );

        if !constant_time_compare(&expected, &provided.to_ascii_lowercase()) {
            return Err(MidtransError::InvalidSignature(
                "Signature mismatch".to_string(),
            ));
        }

        debug!("Midtrans signature verified");

        Ok(())
    }
}

/// Notification signature: hex `SHA512(order_id + status_code + gross_amount + server_key)`.
#[must_use]
pub fn notification_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Reject status API bodies whose `status_code` is not 2xx.
fn check_body_status(raw: &serde_json::Value) -> Result<(), MidtransError> {
    let Some(code) = raw.get("status_code").and_then(serde_json::Value::as_str) else {
        return Ok(());
    };

    let parsed: u16 = code
        .parse()
        .map_err(|_| MidtransError::Parse(format!("Invalid status_code: {code}")))?;

    if (200..300).contains(&parsed) {
        return Ok(());
    }

    let message = raw
        .get("status_message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Unknown error")
        .to_string();

    Err(MidtransError::Api {
        status: parsed,
        message,
    })
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(is_production: bool) -> MidtransClient {
        MidtransClient::new(&MidtransConfig {
            server_key: SecretString::from("SB-Mid-server-test".to_string()),
            client_key: "SB-Mid-client-test".to_string(),
            merchant_id: "G123456789".to_string(),
            is_production,
        })
        .unwrap()
    }

    fn report(signature: Option<String>) -> StatusReport {
        StatusReport {
            order_id: "ORDER-1718000000-1a2b3c4d".to_string(),
            transaction_status: "settlement".to_string(),
            fraud_status: None,
            status_code: "200".to_string(),
            gross_amount: "150000.00".to_string(),
            signature_key: signature,
            payment_type: Some("bank_transfer".to_string()),
            transaction_id: None,
            status_message: None,
        }
    }

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
        assert!(!constant_time_compare("hello", "helloo"));
    }

    #[test]
    fn test_notification_signature_is_sha512_hex() {
        let signature = notification_signature("a", "200", "1.00", "key");
        assert_eq!(signature.len(), 128);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(signature, notification_signature("a", "201", "1.00", "key"));
    }

    #[test]
    fn test_verify_notification_valid() {
        let signature = notification_signature(
            "ORDER-1718000000-1a2b3c4d",
            "200",
            "150000.00",
            "SB-Mid-server-test",
        );
        assert!(client(false).verify_notification(&report(Some(signature))).is_ok());
    }

    #[test]
    fn test_verify_notification_accepts_uppercase_hex() {
        let signature = notification_signature(
            "ORDER-1718000000-1a2b3c4d",
            "200",
            "150000.00",
            "SB-Mid-server-test",
        )
        .to_ascii_uppercase();
        assert!(client(false).verify_notification(&report(Some(signature))).is_ok());
    }

    #[test]
    fn test_verify_notification_wrong_key() {
        let signature = notification_signature(
            "ORDER-1718000000-1a2b3c4d",
            "200",
            "150000.00",
            "another-server-key",
        );
        let result = client(false).verify_notification(&report(Some(signature)));
        assert!(matches!(result, Err(MidtransError::InvalidSignature(_))));
    }

    #[test]
    fn test_verify_notification_missing_signature() {
        let result = client(false).verify_notification(&report(None));
        assert!(matches!(result, Err(MidtransError::InvalidSignature(_))));
    }

    #[test]
    fn test_status_url() {
        let reference = TransactionRef::new("ORDER-1-abc".to_string());
        assert_eq!(
            client(false).status_url(&reference).unwrap().as_str(),
            "https://api.sandbox.midtrans.com/v2/ORDER-1-abc/status"
        );
        assert_eq!(
            client(true).status_url(&reference).unwrap().as_str(),
            "https://api.midtrans.com/v2/ORDER-1-abc/status"
        );
    }

    #[test]
    fn test_snap_url_follows_environment() {
        assert_eq!(client(false).snap_url(), SNAP_SANDBOX_URL);
        assert_eq!(client(true).snap_url(), SNAP_PRODUCTION_URL);
    }

    #[test]
    fn test_body_status_404_is_error() {
        let raw = serde_json::json!({
            "status_code": "404",
            "status_message": "Transaction doesn't exist."
        });
        let result = check_body_status(&raw);
        assert!(matches!(result, Err(MidtransError::Api { status: 404, .. })));
    }

    #[test]
    fn test_body_status_success() {
        assert!(check_body_status(&serde_json::json!({"status_code": "200"})).is_ok());
        assert!(check_body_status(&serde_json::json!({"status_code": "201"})).is_ok());
    }

    #[test]
    fn test_debug_redacts_server_key() {
        let debug = format!("{:?}", client(false));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("SB-Mid-server-test"));
    }
}
