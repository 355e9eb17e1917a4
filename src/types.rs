//! Core type definitions for the M-Pesa gateway integration.
//!
//! This module contains the configuration bundle, the payment record supplied by
//! the host platform, the normalized gateway response returned to it, and the
//! outbound wire payloads for the Daraja API.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::errors::Result;

/// Gateway name reported to the host platform.
pub const GATEWAY_NAME: &str = "Mpesa";

/// Error message Daraja returns when a bearer token has expired or been revoked.
///
/// This string (like the other message constants below) is undocumented vendor
/// behavior observed from the live API. Verify against current API responses
/// when upgrading the upstream integration.
pub const INVALID_ACCESS_TOKEN_MESSAGE: &str = "Invalid Access Token";

/// Error message Daraja returns while an STK push is still awaiting the customer.
pub const TRANSACTION_PENDING_MESSAGE: &str = "The transaction is being processed";

/// Result description Daraja returns for a successfully completed push payment.
pub const QUERY_SUCCESS_MESSAGE: &str = "The service request is processed successfully.";

/// Response code Daraja returns for an accepted reversal request.
pub const REVERSAL_SUCCESS_CODE: &str = "0";

/// Transaction type constant for customer-to-business pay-bill pushes.
pub const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

/// Fixed description attached to every push request.
pub const TRANSACTION_DESCRIPTION: &str = "Mpesa payment";

/// Command identifier for the reversal endpoint.
pub const REVERSAL_COMMAND: &str = "TransactionReversal";

/// Receiver identifier type for reversals (organization shortcode).
pub const RECEIVER_IDENTIFIER_TYPE: &str = "11";

/// Fixed remarks/occasion text attached to reversal requests.
pub const REVERSAL_REMARKS: &str = "Payment reversal";

/// Generic message surfaced when the upstream reply has no parseable body.
pub const INTERNAL_ERROR_MESSAGE: &str = "Unable to process the payment request";

/// The kind of transaction a [`GatewayResponse`] reports on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Initiation of a push payment
    Capture,
    /// Confirmation of a previously initiated push
    Confirm,
    /// Reversal of a completed transaction
    Refund,
    /// Void (no upstream equivalent; always a local success)
    Void,
}

/// Failure classification surfaced to the host platform.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    /// The bearer token was rejected and could not be refreshed
    InvalidToken,
    /// The transaction was still processing when polling attempts ran out
    Pending,
    /// Generic upstream or network failure
    ProcessingError,
    /// The customer or upstream explicitly rejected the transaction
    Declined,
    /// The upstream reply had no parseable body
    Internal,
}

/// Error descriptor carried on a failed [`GatewayResponse`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResponseError {
    /// Failure classification
    pub code: FailureCode,
    /// Upstream error message, or a generic internal message
    pub message: String,
}

/// Connection parameters for one merchant account on the Daraja API.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// OAuth consumer key
    pub consumer_key: String,
    /// OAuth consumer secret
    pub consumer_secret: String,
    /// Base URL of the Daraja API, e.g. `https://sandbox.safaricom.co.ke/`
    pub base_url: String,
    /// Merchant business shortcode
    pub shortcode: String,
    /// Online passkey used in the push password formula
    pub passkey: String,
    /// URL Daraja posts transaction callbacks to
    pub callback_url: String,
    /// Initiator name for reversal requests
    pub initiator_name: String,
    /// Initiator security credential for reversal requests
    pub initiator_security_credential: String,
}

impl ConnectionParams {
    /// Joins a relative API path against the configured base URL.
    ///
    /// A trailing slash is ensured on the base so paths append instead of
    /// replacing the last segment.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Url::parse(&base)?.join(path)?)
    }

    /// Cache key scoping the access token to this merchant account.
    ///
    /// Keyed on consumer key and shortcode so multiple configured accounts in
    /// one process never share a token entry.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.consumer_key, self.shortcode)
    }
}

/// Delay and retry settings for the synchronous confirmation flow.
///
/// Defaults preserve the cadence expected by the upstream flow: a 10 second
/// pause after the push (typical customer response latency to the phone
/// prompt) and 3 second polling, doubled per attempt up to a fixed bound.
#[derive(Debug, Clone)]
pub struct PollTiming {
    /// Pause between capture and the first status query
    pub confirm_delay: Duration,
    /// Initial pause between status queries while the transaction is pending
    pub poll_interval: Duration,
    /// Maximum number of status queries before giving up with a pending result
    pub max_poll_attempts: u32,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            confirm_delay: Duration::from_secs(10),
            poll_interval: Duration::from_secs(3),
            max_poll_attempts: 5,
        }
    }
}

/// Immutable configuration bundle for the gateway.
///
/// Constructed once per plugin activation from the host's persisted settings
/// and read-only thereafter.
///
/// # Examples
///
/// ```
/// use mpesa_gateway::types::{ConnectionParams, GatewayConfig};
///
/// let config = GatewayConfig::new(ConnectionParams {
///     consumer_key: "key".to_string(),
///     consumer_secret: "secret".to_string(),
///     base_url: "https://sandbox.safaricom.co.ke/".to_string(),
///     shortcode: "174379".to_string(),
///     passkey: "passkey".to_string(),
///     callback_url: "https://shop.example.com/mpesa/callback".to_string(),
///     initiator_name: "api_user".to_string(),
///     initiator_security_credential: "credential".to_string(),
/// });
/// assert!(!config.auto_capture);
/// ```
#[derive(Clone)]
pub struct GatewayConfig {
    /// Gateway name reported to the host
    pub gateway_name: String,
    /// Whether the host should auto-capture (always false for this flow)
    pub auto_capture: bool,
    /// Whether the host may store customer payment sources (unsupported)
    pub store_customer: bool,
    /// Merchant connection parameters
    pub connection: ConnectionParams,
    /// Delay/retry settings for the synchronous confirmation flow
    pub timing: PollTiming,
    /// HTTP client used for all upstream calls
    pub http_client: Client,
}

impl GatewayConfig {
    /// Creates a gateway configuration with default timing and a fresh HTTP client.
    pub fn new(connection: ConnectionParams) -> Self {
        Self {
            gateway_name: GATEWAY_NAME.to_string(),
            auto_capture: false,
            store_customer: false,
            connection,
            timing: PollTiming::default(),
            http_client: Client::new(),
        }
    }

    /// Overrides the confirmation delay/retry settings.
    pub fn with_timing(mut self, timing: PollTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Sets a custom HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }
}

/// Payment request descriptor supplied per call by the host platform.
#[derive(Debug, Clone)]
pub struct PaymentData {
    /// Amount in major currency units; truncated to a whole number upstream
    pub amount: f64,
    /// ISO currency code, e.g. "KES"
    pub currency: String,
    /// Client-generated token / idempotency id; also the upstream transaction
    /// id when the host requests a refund
    pub token: String,
    /// Customer billing phone number, with leading trunk digit
    pub billing_phone: String,
    /// Order identifier, used as the account reference when present
    pub order_id: Option<String>,
    /// Raw payload returned by a prior capture, handed back by the host so a
    /// confirmation can reuse the checkout-session id and timestamp
    pub gateway_payload: Option<Value>,
}

/// Normalized outcome of a gateway operation.
///
/// Every operation returns one of these; no error type ever crosses into the
/// host platform.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GatewayResponse {
    /// Whether the operation succeeded
    pub is_success: bool,
    /// Whether the customer must take further action (e.g. retry the phone push)
    pub action_required: bool,
    /// Which operation this response reports on
    pub kind: TransactionKind,
    /// Amount echoed from the payment record
    pub amount: f64,
    /// Currency echoed from the payment record
    pub currency: String,
    /// Upstream transaction identifier, or the payment token as a fallback
    pub transaction_id: String,
    /// Failure descriptor when `is_success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    /// Raw upstream payload, preserved between capture and confirm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

impl GatewayResponse {
    /// Builds a successful response for the given operation.
    pub fn success(
        kind: TransactionKind,
        payment: &PaymentData,
        transaction_id: String,
        raw_response: Option<Value>,
    ) -> Self {
        Self {
            is_success: true,
            action_required: false,
            kind,
            amount: payment.amount,
            currency: payment.currency.clone(),
            transaction_id,
            error: None,
            raw_response,
        }
    }

    /// Builds a failed response carrying a failure code and message.
    pub fn failure(
        kind: TransactionKind,
        payment: &PaymentData,
        code: FailureCode,
        message: impl Into<String>,
        action_required: bool,
        raw_response: Option<Value>,
    ) -> Self {
        Self {
            is_success: false,
            action_required,
            kind,
            amount: payment.amount,
            currency: payment.currency.clone(),
            transaction_id: payment.token.clone(),
            error: Some(ResponseError {
                code,
                message: message.into(),
            }),
            raw_response,
        }
    }
}

/// Outbound payload for `POST mpesa/stkpush/v1/processrequest`.
#[derive(Serialize, Debug, Clone)]
pub struct StkPushRequest {
    /// Merchant business shortcode
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,

    /// Base64 of shortcode + passkey + timestamp
    #[serde(rename = "Password")]
    pub password: String,

    /// Request timestamp, `YYYYMMDDHHmmss`
    #[serde(rename = "Timestamp")]
    pub timestamp: String,

    /// Transaction type constant
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,

    /// Whole-number amount; Daraja has no fractional currency support
    #[serde(rename = "Amount")]
    pub amount: u64,

    /// Paying phone number
    #[serde(rename = "PartyA")]
    pub party_a: String,

    /// Receiving shortcode
    #[serde(rename = "PartyB")]
    pub party_b: String,

    /// Phone number to prompt
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,

    /// URL Daraja posts the transaction result to
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,

    /// Account reference shown to the customer
    #[serde(rename = "AccountReference")]
    pub account_reference: String,

    /// Fixed description text
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// Outbound payload for `POST mpesa/stkpushquery/v1/query`.
#[derive(Serialize, Debug, Clone)]
pub struct StkQueryRequest {
    /// Merchant business shortcode
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,

    /// Password recomputed with the original push timestamp
    #[serde(rename = "Password")]
    pub password: String,

    /// Timestamp captured from the original push response
    #[serde(rename = "Timestamp")]
    pub timestamp: String,

    /// Checkout-session id returned by the push
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

/// Outbound payload for `POST mpesa/reversal/v1/request`.
///
/// Field names follow the vendor wire format, including its misspelled
/// `RecieverIdentifierType`.
#[derive(Serialize, Debug, Clone)]
pub struct ReversalRequest {
    /// Initiator name
    #[serde(rename = "Initiator")]
    pub initiator: String,

    /// Initiator security credential
    #[serde(rename = "SecurityCredential")]
    pub security_credential: String,

    /// Command constant
    #[serde(rename = "CommandID")]
    pub command_id: String,

    /// Identifier of the transaction being reversed
    #[serde(rename = "TransactionID")]
    pub transaction_id: String,

    /// Whole-number amount to reverse
    #[serde(rename = "Amount")]
    pub amount: u64,

    /// Receiving party (the merchant shortcode)
    #[serde(rename = "ReceiverParty")]
    pub receiver_party: String,

    /// Receiver identifier type (organization shortcode)
    #[serde(rename = "RecieverIdentifierType")]
    pub receiver_identifier_type: String,

    /// URL Daraja posts the reversal result to
    #[serde(rename = "ResultURL")]
    pub result_url: String,

    /// URL Daraja posts to when the reversal queue times out
    #[serde(rename = "QueueTimeOutURL")]
    pub queue_timeout_url: String,

    /// Fixed remarks text
    #[serde(rename = "Remarks")]
    pub remarks: String,

    /// Fixed occasion text
    #[serde(rename = "Occasion")]
    pub occasion: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> ConnectionParams {
        ConnectionParams {
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            base_url: "https://sandbox.safaricom.co.ke".to_string(),
            shortcode: "174379".to_string(),
            passkey: "passkey".to_string(),
            callback_url: "https://shop.example.com/callback".to_string(),
            initiator_name: "api_user".to_string(),
            initiator_security_credential: "credential".to_string(),
        }
    }

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

    #[test]
    fn test_endpoint_joins_without_trailing_slash() {
        let url = connection()
            .endpoint("mpesa/stkpush/v1/processrequest")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sandbox.safaricom.co.ke/mpesa/stkpush/v1/processrequest"
        );
    }

    #[test]
    fn test_endpoint_keeps_query_string() {
        let url = connection()
            .endpoint("oauth/v1/generate?grant_type=client_credentials")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sandbox.safaricom.co.ke/oauth/v1/generate?grant_type=client_credentials"
        );
    }

    #[test]
    fn test_cache_key_scoped_per_account() {
        let a = connection();
        let mut b = connection();
        b.consumer_key = "other".to_string();
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_config_defaults() {
        let config = GatewayConfig::new(connection());
        assert_eq!(config.gateway_name, GATEWAY_NAME);
        assert!(!config.auto_capture);
        assert!(!config.store_customer);
        assert_eq!(config.timing.max_poll_attempts, 5);
        assert_eq!(config.timing.confirm_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_response_constructors() {
        let pay = payment();
        let ok = GatewayResponse::success(
            TransactionKind::Capture,
            &pay,
            "ws_CO_1".to_string(),
            None,
        );
        assert!(ok.is_success);
        assert!(!ok.action_required);
        assert_eq!(ok.transaction_id, "ws_CO_1");
        assert_eq!(ok.currency, "KES");

        let failed = GatewayResponse::failure(
            TransactionKind::Confirm,
            &pay,
            FailureCode::Declined,
            "Request cancelled by user",
            true,
            None,
        );
        assert!(!failed.is_success);
        assert!(failed.action_required);
        assert_eq!(failed.transaction_id, "tok_123");
        let error = failed.error.unwrap();
        assert_eq!(error.code, FailureCode::Declined);
        assert_eq!(error.message, "Request cancelled by user");
    }

    #[test]
    fn test_push_request_wire_names() {
        let request = StkPushRequest {
            business_short_code: "174379".to_string(),
            password: "cGFzcw==".to_string(),
            timestamp: "20240101120000".to_string(),
            transaction_type: TRANSACTION_TYPE.to_string(),
            amount: 100,
            party_a: "712345678".to_string(),
            party_b: "174379".to_string(),
            phone_number: "712345678".to_string(),
            callback_url: "https://shop.example.com/callback".to_string(),
            account_reference: "order-9".to_string(),
            transaction_desc: TRANSACTION_DESCRIPTION.to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["BusinessShortCode"], "174379");
        assert_eq!(json["CallBackURL"], "https://shop.example.com/callback");
        assert_eq!(json["Amount"], 100);
        assert_eq!(json["TransactionType"], "CustomerPayBillOnline");
    }

    #[test]
    fn test_reversal_request_wire_names() {
        let request = ReversalRequest {
            initiator: "api_user".to_string(),
            security_credential: "credential".to_string(),
            command_id: REVERSAL_COMMAND.to_string(),
            transaction_id: "OEI2AK4Q16".to_string(),
            amount: 100,
            receiver_party: "174379".to_string(),
            receiver_identifier_type: RECEIVER_IDENTIFIER_TYPE.to_string(),
            result_url: "https://shop.example.com/callback".to_string(),
            queue_timeout_url: "https://shop.example.com/callback".to_string(),
            remarks: REVERSAL_REMARKS.to_string(),
            occasion: REVERSAL_REMARKS.to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["CommandID"], "TransactionReversal");
        // Vendor wire format spells the field this way.
        assert_eq!(json["RecieverIdentifierType"], "11");
        assert_eq!(json["ResultURL"], json["QueueTimeOutURL"]);
    }

    #[test]
    fn test_failure_code_serialization() {
        let json = serde_json::to_string(&FailureCode::ProcessingError).unwrap();
        assert_eq!(json, "\"PROCESSING_ERROR\"");
        let json = serde_json::to_string(&FailureCode::InvalidToken).unwrap();
        assert_eq!(json, "\"INVALID_TOKEN\"");
    }
}
