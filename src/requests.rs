//! Request builders for the three outbound Daraja payloads.
//!
//! Pure functions assembling the push-payment, push-status-query and reversal
//! request bodies from configuration and a payment record.

use crate::types::{
    GatewayConfig, PaymentData, ReversalRequest, StkPushRequest, StkQueryRequest,
    RECEIVER_IDENTIFIER_TYPE, REVERSAL_COMMAND, REVERSAL_REMARKS, TRANSACTION_DESCRIPTION,
    TRANSACTION_TYPE,
};
use crate::utils::{daraja_timestamp, normalize_phone, push_password, whole_amount};

/// Builds the STK push payload for a payment.
///
/// The timestamp is captured at build time; it travels back out on the capture
/// response so the later status query can recompute the same password. The
/// account reference is the order id when present, otherwise the client token.
pub fn build_push_request(payment: &PaymentData, config: &GatewayConfig) -> StkPushRequest {
    let connection = &config.connection;
    let timestamp = daraja_timestamp();
    let password = push_password(&connection.shortcode, &connection.passkey, &timestamp);
    let phone = normalize_phone(&payment.billing_phone);
    let reference = payment
        .order_id
        .clone()
        .unwrap_or_else(|| payment.token.clone());

    StkPushRequest {
        business_short_code: connection.shortcode.clone(),
        password,
        timestamp,
        transaction_type: TRANSACTION_TYPE.to_string(),
        amount: whole_amount(payment.amount),
        party_a: phone.clone(),
        party_b: connection.shortcode.clone(),
        phone_number: phone,
        callback_url: connection.callback_url.clone(),
        account_reference: reference,
        transaction_desc: TRANSACTION_DESCRIPTION.to_string(),
    }
}

/// Builds the status query for a previously initiated push.
///
/// The password is recomputed from the timestamp stored on the push response,
/// not from the current time; the upstream rejects a query whose password
/// disagrees with the original push.
pub fn build_status_query(
    timestamp: &str,
    checkout_request_id: &str,
    config: &GatewayConfig,
) -> StkQueryRequest {
    let connection = &config.connection;
    StkQueryRequest {
        business_short_code: connection.shortcode.clone(),
        password: push_password(&connection.shortcode, &connection.passkey, timestamp),
        timestamp: timestamp.to_string(),
        checkout_request_id: checkout_request_id.to_string(),
    }
}

/// Builds the reversal payload for a refund.
///
/// The payment token identifies the upstream transaction being reversed; the
/// configured callback URL serves as both the result and the queue-timeout
/// destination.
pub fn build_reversal_request(payment: &PaymentData, config: &GatewayConfig) -> ReversalRequest {
    let connection = &config.connection;
    ReversalRequest {
        initiator: connection.initiator_name.clone(),
        security_credential: connection.initiator_security_credential.clone(),
        command_id: REVERSAL_COMMAND.to_string(),
        transaction_id: payment.token.clone(),
        amount: whole_amount(payment.amount),
        receiver_party: connection.shortcode.clone(),
        receiver_identifier_type: RECEIVER_IDENTIFIER_TYPE.to_string(),
        result_url: connection.callback_url.clone(),
        queue_timeout_url: connection.callback_url.clone(),
        remarks: REVERSAL_REMARKS.to_string(),
        occasion: REVERSAL_REMARKS.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionParams;
    use crate::utils::push_password;

    fn config() -> GatewayConfig {
        GatewayConfig::new(ConnectionParams {
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            base_url: "https://sandbox.safaricom.co.ke/".to_string(),
            shortcode: "174379".to_string(),
            passkey: "passkey".to_string(),
            callback_url: "https://shop.example.com/callback".to_string(),
            initiator_name: "api_user".to_string(),
            initiator_security_credential: "credential".to_string(),
        })
    }

    fn payment() -> PaymentData {
        PaymentData {
            amount: 100.99,
            currency: "KES".to_string(),
            token: "tok_123".to_string(),
            billing_phone: "0712345678".to_string(),
            order_id: None,
            gateway_payload: None,
        }
    }

    #[test]
    fn test_push_request_fields() {
        let request = build_push_request(&payment(), &config());

        assert_eq!(request.business_short_code, "174379");
        assert_eq!(request.party_b, "174379");
        assert_eq!(request.amount, 100); // 100.99 truncated
        assert_eq!(request.party_a, "712345678");
        assert_eq!(request.phone_number, request.party_a);
        assert_eq!(request.transaction_type, "CustomerPayBillOnline");
        assert_eq!(request.callback_url, "https://shop.example.com/callback");
        assert_eq!(
            request.password,
            push_password("174379", "passkey", &request.timestamp)
        );
    }

    #[test]
    fn test_push_reference_prefers_order_id() {
        let mut pay = payment();
        assert_eq!(build_push_request(&pay, &config()).account_reference, "tok_123");

        pay.order_id = Some("order-42".to_string());
        assert_eq!(
            build_push_request(&pay, &config()).account_reference,
            "order-42"
        );
    }

    #[test]
    fn test_status_query_reuses_push_timestamp() {
        let request = build_status_query("20240101120000", "ws_CO_1", &config());

        assert_eq!(request.timestamp, "20240101120000");
        assert_eq!(request.checkout_request_id, "ws_CO_1");
        assert_eq!(
            request.password,
            push_password("174379", "passkey", "20240101120000")
        );
    }

    #[test]
    fn test_reversal_request_fields() {
        let request = build_reversal_request(&payment(), &config());

        assert_eq!(request.initiator, "api_user");
        assert_eq!(request.command_id, "TransactionReversal");
        assert_eq!(request.transaction_id, "tok_123");
        assert_eq!(request.amount, 100);
        assert_eq!(request.receiver_party, "174379");
        assert_eq!(request.receiver_identifier_type, "11");
        assert_eq!(request.result_url, request.queue_timeout_url);
    }
}
