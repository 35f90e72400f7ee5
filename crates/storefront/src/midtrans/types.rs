//! Midtrans request and response types.

use serde::{Deserialize, Serialize};

use warung_core::TransactionStatus;

// =============================================================================
// Snap
// =============================================================================

/// Body of `POST /snap/v1/transactions`.
#[derive(Debug, Clone, Serialize)]
pub struct SnapRequest {
    pub transaction_details: TransactionDetails,
    pub customer_details: CustomerDetails,
    pub credit_card: CreditCard,
    pub callbacks: Callbacks,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetails {
    /// Our reference; echoed back as `order_id` in every status report.
    pub order_id: String,
    /// Whole rupiah.
    pub gross_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: String,
    pub phone: String,
    pub billing_address: SnapAddress,
    pub shipping_address: SnapAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapAddress {
    pub first_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditCard {
    pub secure: bool,
}

/// Browser redirect targets after the Snap page closes.
#[derive(Debug, Clone, Serialize)]
pub struct Callbacks {
    pub finish: String,
    pub error: String,
    pub pending: String,
}

/// Successful Snap response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapResponse {
    pub token: String,
    pub redirect_url: String,
}

/// Snap error body (`{"error_messages": [...]}`).
#[derive(Debug, Deserialize)]
pub(super) struct SnapErrorResponse {
    #[serde(default)]
    pub error_messages: Vec<String>,
}

// =============================================================================
// Status reports (notifications and status API)
// =============================================================================

/// A transaction status report.
///
/// Sent by Midtrans as an HTTP notification and returned by
/// `GET /v2/{order_id}/status`. Only the fields used locally are typed; the
/// raw JSON is stored alongside.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusReport {
    /// Our transaction reference.
    pub order_id: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    pub status_code: String,
    /// Decimal string, e.g. `"150000.00"`.
    pub gross_amount: String,
    /// `SHA512(order_id + status_code + gross_amount + server_key)`, hex.
    #[serde(default)]
    pub signature_key: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    /// Midtrans' own transaction ID.
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl StatusReport {
    /// Map the gateway status onto a local transaction status.
    ///
    /// | gateway                        | local        |
    /// |--------------------------------|--------------|
    /// | `capture` + fraud `challenge`  | `challenge`  |
    /// | `capture`                      | `success`    |
    /// | `settlement`                   | `settlement` |
    /// | `deny`                         | `deny`       |
    /// | `cancel`                       | `canceled`   |
    /// | `expire`                       | `expired`    |
    /// | `failure`                      | `failed`     |
    /// | `pending`                      | `pending`    |
    ///
    /// Any other status (e.g. `refund`, `authorize`) returns `None`.
    #[must_use]
    pub fn local_status(&self) -> Option<TransactionStatus> {
        let status = match self.transaction_status.as_str() {
            "capture" if self.fraud_status.as_deref() == Some("challenge") => {
                TransactionStatus::Challenge
            }
            "capture" => TransactionStatus::Success,
            "settlement" => TransactionStatus::Settlement,
            "deny" => TransactionStatus::Deny,
            "cancel" => TransactionStatus::Canceled,
            "expire" => TransactionStatus::Expired,
            "failure" => TransactionStatus::Failed,
            "pending" => TransactionStatus::Pending,
            _ => return None,
        };
        Some(status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn report(status: &str, fraud: Option<&str>) -> StatusReport {
        StatusReport {
            order_id: "ORDER-1718000000-1a2b3c4d".to_string(),
            transaction_status: status.to_string(),
            fraud_status: fraud.map(String::from),
            status_code: "200".to_string(),
            gross_amount: "150000.00".to_string(),
            signature_key: None,
            payment_type: None,
            transaction_id: None,
            status_message: None,
        }
    }

    #[test]
    fn test_capture_depends_on_fraud_status() {
        assert_eq!(
            report("capture", Some("challenge")).local_status(),
            Some(TransactionStatus::Challenge)
        );
        assert_eq!(
            report("capture", Some("accept")).local_status(),
            Some(TransactionStatus::Success)
        );
        assert_eq!(report("capture", None).local_status(), Some(TransactionStatus::Success));
    }

    #[test]
    fn test_status_mapping_table() {
        let cases = [
            ("settlement", TransactionStatus::Settlement),
            ("deny", TransactionStatus::Deny),
            ("cancel", TransactionStatus::Canceled),
            ("expire", TransactionStatus::Expired),
            ("failure", TransactionStatus::Failed),
            ("pending", TransactionStatus::Pending),
        ];
        for (gateway, local) in cases {
            assert_eq!(report(gateway, None).local_status(), Some(local), "{gateway}");
        }
    }

    #[test]
    fn test_unknown_status_is_unmapped() {
        assert_eq!(report("refund", None).local_status(), None);
        assert_eq!(report("authorize", None).local_status(), None);
    }

    #[test]
    fn test_deserialize_notification() {
        let json = r#"{
            "transaction_time": "2024-06-10 12:00:00",
            "transaction_status": "settlement",
            "transaction_id": "b1c2d3",
            "status_message": "midtrans payment notification",
            "status_code": "200",
            "signature_key": "abc",
            "payment_type": "bank_transfer",
            "order_id": "ORDER-1718000000-1a2b3c4d",
            "merchant_id": "G123456789",
            "gross_amount": "150000.00",
            "fraud_status": "accept",
            "currency": "IDR"
        }"#;
        let report: StatusReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.payment_type.as_deref(), Some("bank_transfer"));
        assert_eq!(report.local_status(), Some(TransactionStatus::Settlement));
    }

    #[test]
    fn test_snap_request_shape() {
        let address = SnapAddress {
            first_name: "Guest".to_string(),
            email: "guest@example.com".to_string(),
            phone: "081234567890".to_string(),
            address: "Alamat Default".to_string(),
            city: "Jakarta".to_string(),
            postal_code: "12345".to_string(),
            country_code: "IDN".to_string(),
        };
        let request = SnapRequest {
            transaction_details: TransactionDetails {
                order_id: "ORDER-1-abc".to_string(),
                gross_amount: 849,
            },
            customer_details: CustomerDetails {
                first_name: "Guest".to_string(),
                email: "guest@example.com".to_string(),
                phone: "081234567890".to_string(),
                billing_address: address.clone(),
                shipping_address: address,
            },
            credit_card: CreditCard { secure: true },
            callbacks: Callbacks {
                finish: "https://toko.id/payment/success?order_id=ORDER-1-abc".to_string(),
                error: "https://toko.id/payment/error?order_id=ORDER-1-abc".to_string(),
                pending: "https://toko.id/payment/pending?order_id=ORDER-1-abc".to_string(),
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["transaction_details"]["gross_amount"], 849);
        assert_eq!(value["customer_details"]["billing_address"]["country_code"], "IDN");
        assert_eq!(value["credit_card"]["secure"], true);
    }
}
