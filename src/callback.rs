//! STK callback payload handling.
//!
//! Daraja posts the final outcome of a push to the configured callback URL.
//! Hosts that wire that URL up can confirm payments from the callback instead
//! of polling the status-query endpoint synchronously.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{FailureCode, GatewayResponse, PaymentData, TransactionKind};

/// Result code Daraja posts for a completed payment.
pub const CALLBACK_SUCCESS_CODE: i64 = 0;

/// Envelope of the callback body posted by Daraja.
#[derive(Deserialize, Debug, Clone)]
pub struct StkCallbackBody {
    /// The callback payload
    #[serde(rename = "Body")]
    pub body: StkCallbackEnvelope,
}

/// Inner envelope wrapping the callback.
#[derive(Deserialize, Debug, Clone)]
pub struct StkCallbackEnvelope {
    /// The callback itself
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

/// Outcome of a push payment as reported by the callback.
#[derive(Deserialize, Debug, Clone)]
pub struct StkCallback {
    /// Merchant-side request identifier
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,

    /// Checkout-session id correlating this callback with the original push
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,

    /// Numeric result code; zero means the payment completed
    #[serde(rename = "ResultCode")]
    pub result_code: i64,

    /// Human-readable result description
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,

    /// Item list present only on successful payments
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

/// Metadata items attached to a successful callback.
#[derive(Deserialize, Debug, Clone)]
pub struct CallbackMetadata {
    /// Name/value items (amount, receipt number, transaction date, phone)
    #[serde(rename = "Item")]
    pub item: Vec<CallbackItem>,
}

/// A single name/value metadata item.
#[derive(Deserialize, Debug, Clone)]
pub struct CallbackItem {
    /// Item name, e.g. `MpesaReceiptNumber`
    #[serde(rename = "Name")]
    pub name: String,

    /// Item value; absent for some names
    #[serde(rename = "Value")]
    pub value: Option<Value>,
}

impl StkCallback {
    /// Looks up a metadata item value by name.
    pub fn metadata(&self, name: &str) -> Option<&Value> {
        self.callback_metadata
            .as_ref()?
            .item
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    /// The M-Pesa receipt number, when the payment completed.
    pub fn receipt_number(&self) -> Option<&str> {
        self.metadata("MpesaReceiptNumber").and_then(Value::as_str)
    }

    /// The paid amount, when the payment completed.
    pub fn amount(&self) -> Option<f64> {
        self.metadata("Amount").and_then(Value::as_f64)
    }
}

/// Parses the raw callback body posted by Daraja.
pub fn parse_callback(payload: &[u8]) -> Result<StkCallback> {
    let body: StkCallbackBody = serde_json::from_slice(payload)?;
    Ok(body.body.stk_callback)
}

/// Maps a parsed callback to a confirm-kind [`GatewayResponse`].
///
/// A zero result code confirms the payment, with the M-Pesa receipt number as
/// the transaction id when present; any other code is a decline carrying the
/// callback's result description.
pub fn response_from_callback(callback: &StkCallback, payment: &PaymentData) -> GatewayResponse {
    if callback.result_code == CALLBACK_SUCCESS_CODE {
        let transaction_id = callback
            .receipt_number()
            .unwrap_or(&callback.checkout_request_id)
            .to_string();
        debug!(%transaction_id, "Mpesa payment confirmed via callback");
        GatewayResponse::success(TransactionKind::Confirm, payment, transaction_id, None)
    } else {
        GatewayResponse::failure(
            TransactionKind::Confirm,
            payment,
            FailureCode::Declined,
            callback.result_desc.clone(),
            true,
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> PaymentData {
        PaymentData {
            amount: 100.0,
            currency: "KES".to_string(),
            token: "tok_123".to_string(),
            billing_phone: "0712345678".to_string(),
            order_id: None,
            gateway_payload: None,
        }
    }

    const SUCCESS_CALLBACK: &str = r#"{
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        { "Name": "Amount", "Value": 100.0 },
                        { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                        { "Name": "TransactionDate", "Value": 20191219102115 },
                        { "Name": "PhoneNumber", "Value": 254712345678 }
                    ]
                }
            }
        }
    }"#;

    const CANCELLED_CALLBACK: &str = r#"{
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user"
            }
        }
    }"#;

    #[test]
    fn test_parse_success_callback() {
        let callback = parse_callback(SUCCESS_CALLBACK.as_bytes()).unwrap();
        assert_eq!(callback.result_code, 0);
        assert_eq!(callback.checkout_request_id, "ws_CO_191220191020363925");
        assert_eq!(callback.receipt_number(), Some("NLJ7RT61SV"));
        assert_eq!(callback.amount(), Some(100.0));
    }

    #[test]
    fn test_parse_cancelled_callback() {
        let callback = parse_callback(CANCELLED_CALLBACK.as_bytes()).unwrap();
        assert_eq!(callback.result_code, 1032);
        assert!(callback.callback_metadata.is_none());
        assert!(callback.receipt_number().is_none());
    }

    #[test]
    fn test_parse_rejects_malformed_body() {
        assert!(parse_callback(b"not json").is_err());
        assert!(parse_callback(b"{}").is_err());
    }

    #[test]
    fn test_response_from_success_callback() {
        let callback = parse_callback(SUCCESS_CALLBACK.as_bytes()).unwrap();
        let response = response_from_callback(&callback, &payment());
        assert!(response.is_success);
        assert_eq!(response.kind, TransactionKind::Confirm);
        assert_eq!(response.transaction_id, "NLJ7RT61SV");
    }

    #[test]
    fn test_response_from_cancelled_callback() {
        let callback = parse_callback(CANCELLED_CALLBACK.as_bytes()).unwrap();
        let response = response_from_callback(&callback, &payment());
        assert!(!response.is_success);
        assert!(response.action_required);
        let error = response.error.unwrap();
        assert_eq!(error.code, FailureCode::Declined);
        assert_eq!(error.message, "Request cancelled by user");
    }
}
