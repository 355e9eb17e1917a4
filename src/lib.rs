//! # mpesa-gateway
//!
//! M-Pesa Daraja API integration for e-commerce checkouts.
//!
//! This library connects a host platform's payment flow to Safaricom's Daraja
//! REST API: it requests a mobile payment push (STK push) to the customer's
//! phone, polls for confirmation, and supports reversal (refund) and void
//! operations, translating every upstream outcome into a uniform
//! [`types::GatewayResponse`] the host understands.
//!
//! ## Features
//!
//! - **STK push**: initiate a customer-to-business push payment
//! - **Status polling**: bounded, backoff-driven confirmation of a push
//! - **Callbacks**: parse Daraja's asynchronous result callbacks for
//!   webhook-driven confirmation
//! - **Reversals**: refund a completed transaction
//! - **Plugin adapter**: named hooks with active-gating for a host plugin
//!   runtime, built from the host's flat configuration field list
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mpesa_gateway::transactions::process_payment;
//! use mpesa_gateway::types::{ConnectionParams, GatewayConfig, PaymentData};
//!
//! # async fn example() {
//! let config = GatewayConfig::new(ConnectionParams {
//!     consumer_key: "YOUR_CONSUMER_KEY".to_string(),
//!     consumer_secret: "YOUR_CONSUMER_SECRET".to_string(),
//!     base_url: "https://sandbox.safaricom.co.ke/".to_string(),
//!     shortcode: "174379".to_string(),
//!     passkey: "YOUR_PASSKEY".to_string(),
//!     callback_url: "https://shop.example.com/mpesa/callback".to_string(),
//!     initiator_name: "api_user".to_string(),
//!     initiator_security_credential: "YOUR_CREDENTIAL".to_string(),
//! });
//!
//! let payment = PaymentData {
//!     amount: 100.0,
//!     currency: "KES".to_string(),
//!     token: "order-token".to_string(),
//!     billing_phone: "0712345678".to_string(),
//!     order_id: Some("order-42".to_string()),
//!     gateway_payload: None,
//! };
//!
//! let response = process_payment(&payment, &config).await;
//! println!("success: {}", response.is_success);
//! # }
//! ```
//!
//! ## Flow Overview
//!
//! 1. **Capture**: POST the push request; Daraja prompts the customer's phone
//!    and returns a checkout-session id
//! 2. **Wait**: the customer enters their PIN (typically within seconds)
//! 3. **Confirm**: query the push status until it resolves, or consume the
//!    result callback Daraja posts to the configured callback URL
//! 4. **Refund**: reverse a completed transaction when the host requests it
//!
//! Access tokens are fetched with client-credential basic auth and cached per
//! merchant account for a window shorter than their upstream lifetime.
//!
//! ## Upstream Behavior Caveats
//!
//! Several upstream outcomes are distinguished only by exact message strings
//! (see the constants in [`types`]). These are undocumented vendor behavior;
//! re-verify them when Safaricom revs the API.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod auth;
pub mod callback;
pub mod errors;
pub mod plugin;
pub mod requests;
pub mod transactions;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use errors::{GatewayError, Result};
pub use types::{
    ConnectionParams, FailureCode, GatewayConfig, GatewayResponse, PaymentData, PollTiming,
    ResponseError, TransactionKind, GATEWAY_NAME,
};
