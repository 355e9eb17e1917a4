//! Transaction operations: capture, confirm, refund, void and the synchronous
//! process-payment orchestrator.
//!
//! Every operation performs at most a handful of HTTP calls against the Daraja
//! API and always returns a normalized [`GatewayResponse`]; internal errors are
//! caught at this boundary and never propagate to the host platform.
//!
//! Retry behavior is bounded throughout: a rejected bearer token triggers
//! exactly one refresh-and-retry during capture, and a still-processing
//! transaction is polled with exponential backoff up to a fixed attempt count
//! before an explicit pending result is returned.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::auth;
use crate::requests::{build_push_request, build_reversal_request, build_status_query};
use crate::types::{
    FailureCode, GatewayConfig, GatewayResponse, PaymentData, TransactionKind,
    INTERNAL_ERROR_MESSAGE, INVALID_ACCESS_TOKEN_MESSAGE, QUERY_SUCCESS_MESSAGE,
    REVERSAL_SUCCESS_CODE, TRANSACTION_PENDING_MESSAGE,
};

const STK_PUSH_PATH: &str = "mpesa/stkpush/v1/processrequest";
const STK_QUERY_PATH: &str = "mpesa/stkpushquery/v1/query";
const REVERSAL_PATH: &str = "mpesa/reversal/v1/request";

fn error_message(body: &Value) -> Option<&str> {
    body.get("errorMessage").and_then(Value::as_str)
}

/// Initiates a push payment to the customer's phone.
///
/// On success the returned `raw_response` carries the upstream payload
/// augmented with the request `Timestamp`; both the timestamp and the
/// `CheckoutRequestID` in it are required by a later [`confirm`].
///
/// If the upstream rejects the bearer token, the token is refreshed and the
/// push is retried once.
pub async fn capture(payment: &PaymentData, config: &GatewayConfig) -> GatewayResponse {
    let kind = TransactionKind::Capture;
    let url = match config.connection.endpoint(STK_PUSH_PATH) {
        Ok(url) => url,
        Err(err) => {
            return GatewayResponse::failure(
                kind,
                payment,
                FailureCode::Internal,
                err.to_string(),
                false,
                None,
            )
        }
    };

    let mut refreshed_token = false;
    loop {
        let token = match auth::access_token(config).await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "capture aborted: no access token");
                return GatewayResponse::failure(
                    kind,
                    payment,
                    FailureCode::ProcessingError,
                    err.to_string(),
                    true,
                    None,
                );
            }
        };

        let request = build_push_request(payment, config);
        let sent = config
            .http_client
            .post(url.clone())
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "error initiating Mpesa payment");
                return GatewayResponse::failure(
                    kind,
                    payment,
                    FailureCode::ProcessingError,
                    err.to_string(),
                    true,
                    None,
                );
            }
        };

        let status = response.status();
        let body: Option<Value> = response.json().await.ok();

        if status.is_success() {
            let mut raw = match body {
                Some(body @ Value::Object(_)) => body,
                _ => json!({}),
            };
            // The status query needs the push timestamp to recompute the
            // password, so it rides along on the raw payload.
            raw["Timestamp"] = json!(request.timestamp);
            let transaction_id = raw
                .get("CheckoutRequestID")
                .and_then(Value::as_str)
                .unwrap_or(&payment.token)
                .to_string();
            debug!(%transaction_id, "Mpesa push initiated");
            return GatewayResponse::success(kind, payment, transaction_id, Some(raw));
        }

        match body {
            Some(body) => {
                let message = error_message(&body).unwrap_or_default().to_string();
                if message == INVALID_ACCESS_TOKEN_MESSAGE && !refreshed_token {
                    refreshed_token = true;
                    if let Err(err) = auth::refresh_access_token(config).await {
                        warn!(error = %err, "token refresh failed during capture");
                        return GatewayResponse::failure(
                            kind,
                            payment,
                            FailureCode::InvalidToken,
                            err.to_string(),
                            true,
                            Some(body),
                        );
                    }
                    continue;
                }
                warn!(%status, %message, "error initiating Mpesa payment");
                let message = if message.is_empty() {
                    INTERNAL_ERROR_MESSAGE.to_string()
                } else {
                    message
                };
                return GatewayResponse::failure(
                    kind,
                    payment,
                    FailureCode::ProcessingError,
                    message,
                    false,
                    Some(body),
                );
            }
            None => {
                warn!(%status, "Mpesa push failed without a parseable body");
                return GatewayResponse::failure(
                    kind,
                    payment,
                    FailureCode::Internal,
                    INTERNAL_ERROR_MESSAGE,
                    true,
                    None,
                );
            }
        }
    }
}

/// Polls the status of a previously captured push.
///
/// Requires the raw payload returned by [`capture`] on
/// [`PaymentData::gateway_payload`]; its stored timestamp and checkout-session
/// id drive the query. While the upstream reports the transaction as still
/// processing, the query is repeated with exponential backoff up to
/// `config.timing.max_poll_attempts`, after which an explicit
/// [`FailureCode::Pending`] result is returned.
pub async fn confirm(payment: &PaymentData, config: &GatewayConfig) -> GatewayResponse {
    let kind = TransactionKind::Confirm;

    let Some(raw) = payment.gateway_payload.as_ref() else {
        return GatewayResponse::failure(
            kind,
            payment,
            FailureCode::Internal,
            "missing capture payload for confirmation",
            true,
            None,
        );
    };
    let (Some(timestamp), Some(checkout_request_id)) = (
        raw.get("Timestamp").and_then(Value::as_str),
        raw.get("CheckoutRequestID").and_then(Value::as_str),
    ) else {
        return GatewayResponse::failure(
            kind,
            payment,
            FailureCode::Internal,
            "capture payload missing Timestamp or CheckoutRequestID",
            true,
            None,
        );
    };

    let url = match config.connection.endpoint(STK_QUERY_PATH) {
        Ok(url) => url,
        Err(err) => {
            return GatewayResponse::failure(
                kind,
                payment,
                FailureCode::Internal,
                err.to_string(),
                false,
                None,
            )
        }
    };

    let request = build_status_query(timestamp, checkout_request_id, config);
    let mut delay = config.timing.poll_interval;
    let mut attempts = 0u32;

    loop {
        let token = match auth::access_token(config).await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "confirm aborted: no access token");
                return GatewayResponse::failure(
                    kind,
                    payment,
                    FailureCode::ProcessingError,
                    err.to_string(),
                    true,
                    None,
                );
            }
        };

        let sent = config
            .http_client
            .post(url.clone())
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "error querying Mpesa push status");
                return GatewayResponse::failure(
                    kind,
                    payment,
                    FailureCode::ProcessingError,
                    err.to_string(),
                    true,
                    None,
                );
            }
        };

        let status = response.status();
        let body: Option<Value> = response.json().await.ok();

        if status.is_success() {
            return match body {
                Some(body) => {
                    let description = body
                        .get("ResultDesc")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    if description == QUERY_SUCCESS_MESSAGE {
                        debug!(%checkout_request_id, "Mpesa payment confirmed");
                        GatewayResponse::success(
                            kind,
                            payment,
                            checkout_request_id.to_string(),
                            Some(body),
                        )
                    } else {
                        warn!(%description, "Mpesa payment declined");
                        let message = if description.is_empty() {
                            INTERNAL_ERROR_MESSAGE.to_string()
                        } else {
                            description.to_string()
                        };
                        GatewayResponse::failure(
                            kind,
                            payment,
                            FailureCode::Declined,
                            message,
                            true,
                            Some(body),
                        )
                    }
                }
                None => GatewayResponse::failure(
                    kind,
                    payment,
                    FailureCode::Internal,
                    INTERNAL_ERROR_MESSAGE,
                    true,
                    None,
                ),
            };
        }

        match body {
            Some(body)
                if error_message(&body) == Some(TRANSACTION_PENDING_MESSAGE) =>
            {
                attempts += 1;
                if attempts >= config.timing.max_poll_attempts {
                    warn!(attempts, "Mpesa transaction still processing; giving up");
                    return GatewayResponse::failure(
                        kind,
                        payment,
                        FailureCode::Pending,
                        format!("transaction still processing after {attempts} status checks"),
                        true,
                        Some(body),
                    );
                }
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Some(body) => {
                let message = error_message(&body)
                    .unwrap_or(INTERNAL_ERROR_MESSAGE)
                    .to_string();
                warn!(%status, %message, "error querying Mpesa push status");
                return GatewayResponse::failure(
                    kind,
                    payment,
                    FailureCode::ProcessingError,
                    message,
                    true,
                    Some(body),
                );
            }
            None => {
                warn!(%status, "Mpesa status query failed without a parseable body");
                return GatewayResponse::failure(
                    kind,
                    payment,
                    FailureCode::Internal,
                    INTERNAL_ERROR_MESSAGE,
                    true,
                    None,
                );
            }
        }
    }
}

/// Reverses a completed transaction.
///
/// The payment token identifies the upstream transaction to reverse. Success
/// requires a 2xx reply with response code `"0"` and a non-null description;
/// anything else surfaces the upstream description or a generic message.
pub async fn refund(payment: &PaymentData, config: &GatewayConfig) -> GatewayResponse {
    let kind = TransactionKind::Refund;
    let url = match config.connection.endpoint(REVERSAL_PATH) {
        Ok(url) => url,
        Err(err) => {
            return GatewayResponse::failure(
                kind,
                payment,
                FailureCode::Internal,
                err.to_string(),
                false,
                None,
            )
        }
    };

    let token = match auth::access_token(config).await {
        Ok(token) => token,
        Err(err) => {
            warn!(error = %err, "refund aborted: no access token");
            return GatewayResponse::failure(
                kind,
                payment,
                FailureCode::ProcessingError,
                err.to_string(),
                false,
                None,
            );
        }
    };

    let request = build_reversal_request(payment, config);
    let sent = config
        .http_client
        .post(url)
        .bearer_auth(&token)
        .json(&request)
        .send()
        .await;

    let response = match sent {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "error requesting Mpesa reversal");
            return GatewayResponse::failure(
                kind,
                payment,
                FailureCode::ProcessingError,
                INTERNAL_ERROR_MESSAGE,
                false,
                None,
            );
        }
    };

    let status = response.status();
    let body: Option<Value> = response.json().await.ok();

    if !status.is_success() {
        let message = body
            .as_ref()
            .and_then(|b| {
                error_message(b)
                    .or_else(|| b.get("ResponseDescription").and_then(Value::as_str))
            })
            .unwrap_or(INTERNAL_ERROR_MESSAGE)
            .to_string();
        warn!(%status, %message, "Mpesa reversal request failed");
        return GatewayResponse::failure(
            kind,
            payment,
            FailureCode::ProcessingError,
            message,
            false,
            body,
        );
    }

    let body = body.unwrap_or_else(|| json!({}));
    let code = body.get("ResponseCode").and_then(Value::as_str);
    let description = body.get("ResponseDescription").and_then(Value::as_str);

    match (code, description) {
        (Some(REVERSAL_SUCCESS_CODE), Some(_)) => {
            debug!(transaction_id = %payment.token, "Mpesa reversal accepted");
            GatewayResponse::success(kind, payment, payment.token.clone(), Some(body))
        }
        _ => {
            let message = description.unwrap_or(INTERNAL_ERROR_MESSAGE).to_string();
            warn!(%message, "Mpesa reversal rejected");
            GatewayResponse::failure(
                kind,
                payment,
                FailureCode::ProcessingError,
                message,
                false,
                Some(body),
            )
        }
    }
}

/// Voids a transaction.
///
/// The upstream API offers no void operation for this flow, so this reports
/// success without making a network call.
pub fn void(payment: &PaymentData, _config: &GatewayConfig) -> GatewayResponse {
    GatewayResponse::success(TransactionKind::Void, payment, payment.token.clone(), None)
}

/// Synchronous pay flow: capture, wait out the customer's phone prompt, confirm.
///
/// Returns the capture response unchanged when the push fails. Otherwise the
/// capture's raw payload is threaded into the confirmation after
/// `config.timing.confirm_delay`.
pub async fn process_payment(payment: &PaymentData, config: &GatewayConfig) -> GatewayResponse {
    let captured = capture(payment, config).await;
    if !captured.is_success {
        return captured;
    }

    tokio::time::sleep(config.timing.confirm_delay).await;

    let mut follow_up = payment.clone();
    follow_up.gateway_payload = captured.raw_response.clone();
    confirm(&follow_up, config).await
}
