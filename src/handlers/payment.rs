use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use base64::prelude::{Engine, BASE64_STANDARD};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::entities::booking::{self, PaymentStatus};
use crate::error::{AppError, AppResult};
use crate::utils::signature;
use crate::AppState;

/// Gateway sentinel for a settled payment, compared case-insensitively.
const STATUS_COMPLETE: &str = "COMPLETE";

// ============ Payment preparation ============

#[derive(Debug, Deserialize)]
pub struct PreparePaymentRequest {
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct EsewaFormData {
    pub amount: i64,
    pub tax_amount: String,
    pub total_amount: i64,
    pub transaction_uuid: Uuid,
    pub product_code: String,
    pub product_service_charge: String,
    pub product_delivery_charge: String,
    pub success_url: String,
    pub failure_url: String,
    pub signed_field_names: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct PreparePaymentResponse {
    pub esewa_form_submit_url: String,
    pub form_data: EsewaFormData,
}

/// Build the signed form the client submits to the gateway. Read-only with
/// respect to the ledger: the booking stays Pending until the callback.
pub async fn prepare_payment(
    State(state): State<AppState>,
    Json(payload): Json<PreparePaymentRequest>,
) -> AppResult<Json<PreparePaymentResponse>> {
    let booking = booking::Entity::find_by_id(payload.booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found to initiate payment".to_string()))?;

    if booking.payment_status == PaymentStatus::Completed {
        return Err(AppError::Conflict(
            "This booking has already been paid".to_string(),
        ));
    }

    let config = &state.config;
    let message = signature::outbound_message(
        booking.total_amount,
        &booking.transaction_uuid.to_string(),
        &config.esewa_merchant_code,
    );
    let signed = signature::sign_message(&message, &config.esewa_secret_key);

    tracing::debug!(%message, signature = %signed, "Prepared gateway payment request");

    Ok(Json(PreparePaymentResponse {
        esewa_form_submit_url: config.esewa_form_submit_url.clone(),
        form_data: EsewaFormData {
            amount: booking.total_amount,
            tax_amount: "0".to_string(),
            total_amount: booking.total_amount,
            transaction_uuid: booking.transaction_uuid,
            product_code: config.esewa_merchant_code.clone(),
            product_service_charge: "0".to_string(),
            product_delivery_charge: "0".to_string(),
            success_url: format!(
                "{}/api/payment/esewa/callback/success",
                config.server_base_url
            ),
            failure_url: format!(
                "{}/api/payment/esewa/callback/failure",
                config.server_base_url
            ),
            signed_field_names: signature::SIGNED_FIELD_NAMES.to_string(),
            signature: signed,
        },
    }))
}

// ============ Success callback ============

/// A callback payload that decoded cleanly and passed signature verification.
#[derive(Debug, PartialEq)]
struct VerifiedPayment {
    transaction_uuid: Uuid,
    transaction_code: Option<String>,
    status: String,
}

#[derive(Debug, PartialEq)]
enum CallbackRejection {
    /// Payload could not be decoded or is structurally invalid.
    Malformed(String),
    /// Recomputed signature did not match; the payload may be forged.
    SignatureMismatch {
        transaction_uuid: Option<Uuid>,
        message: String,
        received: String,
        computed: String,
    },
}

/// Decode the base64 JSON payload and verify its signature against the
/// field order the payload itself declares. The payload's own status field
/// is not trusted until verification passes.
fn verify_success_payload(data: &str, secret: &str) -> Result<VerifiedPayment, CallbackRejection> {
    let bytes = BASE64_STANDARD
        .decode(data)
        .map_err(|e| CallbackRejection::Malformed(format!("invalid base64: {}", e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| CallbackRejection::Malformed(format!("invalid UTF-8: {}", e)))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| CallbackRejection::Malformed(format!("invalid JSON: {}", e)))?;
    let fields = value
        .as_object()
        .ok_or_else(|| CallbackRejection::Malformed("payload is not a JSON object".to_string()))?;

    let transaction_uuid = fields
        .get("transaction_uuid")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());

    let signed_field_names = fields
        .get("signed_field_names")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CallbackRejection::Malformed("missing signed_field_names".to_string()))?;
    let received = fields
        .get("signature")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CallbackRejection::Malformed("missing signature".to_string()))?;

    let message = signature::callback_message(signed_field_names, fields).ok_or_else(|| {
        CallbackRejection::Malformed("signed field missing from payload".to_string())
    })?;

    let computed = signature::sign_message(&message, secret);
    if computed != received {
        return Err(CallbackRejection::SignatureMismatch {
            transaction_uuid,
            message,
            received: received.to_string(),
            computed,
        });
    }

    // Verified payloads always carry the uuid we generated; anything else
    // cannot be correlated to a booking.
    let transaction_uuid = transaction_uuid.ok_or_else(|| {
        CallbackRejection::Malformed("missing or invalid transaction_uuid".to_string())
    })?;

    Ok(VerifiedPayment {
        transaction_uuid,
        transaction_code: fields
            .get("transaction_code")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        status: fields
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct SuccessCallbackQuery {
    pub data: Option<String>,
}

/// Gateway success callback. The caller is a browser redirected by the
/// gateway, so every outcome ends in a redirect, never an error body.
pub async fn esewa_success_callback(
    State(state): State<AppState>,
    Query(query): Query<SuccessCallbackQuery>,
) -> Redirect {
    match handle_success(&state, query.data.as_deref()).await {
        Ok(redirect) => redirect,
        Err(err) => {
            tracing::error!(error = %err, "Unhandled error in gateway success callback");
            failure_redirect(&state.config, "Server_error_during_payment_confirmation")
        }
    }
}

async fn handle_success(state: &AppState, data: Option<&str>) -> AppResult<Redirect> {
    let config = &state.config;

    let Some(data) = data else {
        tracing::warn!("Gateway success callback missing data parameter");
        return Ok(failure_redirect(config, "Invalid_gateway_response"));
    };

    let payment = match verify_success_payload(data, &config.esewa_secret_key) {
        Ok(payment) => payment,
        Err(CallbackRejection::Malformed(reason)) => {
            tracing::warn!(%reason, "Malformed gateway success callback");
            return Ok(failure_redirect(config, "Invalid_gateway_response"));
        }
        Err(CallbackRejection::SignatureMismatch {
            transaction_uuid,
            message,
            received,
            computed,
        }) => {
            tracing::warn!(
                %message,
                %received,
                %computed,
                "Gateway signature verification failed; possible forgery"
            );
            if let Some(uuid) = transaction_uuid {
                fail_pending_booking(&state.db, uuid).await?;
            }
            return Ok(failure_redirect(
                config,
                "Payment_verification_failed_(Signature_Mismatch)",
            ));
        }
    };

    if !payment.status.eq_ignore_ascii_case(STATUS_COMPLETE) {
        tracing::warn!(status = %payment.status, "Gateway reported non-complete payment status");
        fail_pending_booking(&state.db, payment.transaction_uuid).await?;
        return Ok(failure_redirect(
            config,
            &format!("Payment_not_completed_on_eSewa&status={}", payment.status),
        ));
    }

    // Single conditional update: only a booking still Pending may complete,
    // so a stale or duplicate callback cannot re-apply.
    let updated = booking::Entity::update_many()
        .col_expr(
            booking::Column::PaymentStatus,
            Expr::value(PaymentStatus::Completed),
        )
        .col_expr(
            booking::Column::GatewayRefId,
            Expr::value(payment.transaction_code.clone()),
        )
        .filter(booking::Column::TransactionUuid.eq(payment.transaction_uuid))
        .filter(booking::Column::PaymentStatus.eq(PaymentStatus::Pending))
        .exec(&state.db)
        .await?;

    if updated.rows_affected == 0 {
        let already_completed = booking::Entity::find()
            .filter(booking::Column::TransactionUuid.eq(payment.transaction_uuid))
            .filter(booking::Column::PaymentStatus.eq(PaymentStatus::Completed))
            .one(&state.db)
            .await?;

        return Ok(match already_completed {
            // Benign duplicate delivery of an already-settled payment.
            Some(b) => {
                tracing::info!(booking_id = %b.id, "Duplicate gateway callback for completed booking");
                Redirect::to(&format!(
                    "{}/ticket.html?bookingId={}&status=already_completed",
                    config.app_base_url, b.id
                ))
            }
            None => {
                tracing::error!(
                    transaction_uuid = %payment.transaction_uuid,
                    "Gateway callback matched no pending or completed booking"
                );
                failure_redirect(config, "Booking_record_update_issue")
            }
        });
    }

    let booking = booking::Entity::find()
        .filter(booking::Column::TransactionUuid.eq(payment.transaction_uuid))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Internal("Booking missing after completion".to_string()))?;

    tracing::info!(booking_id = %booking.id, "Booking completed after gateway payment");

    Ok(Redirect::to(&format!(
        "{}/ticket.html?bookingId={}&status=esewa_success",
        config.app_base_url, booking.id
    )))
}

// ============ Failure callback ============

#[derive(Debug, Deserialize)]
pub struct FailureCallbackQuery {
    // The gateway's parameter naming is inconsistent between integrations;
    // accept any known alias, first one present wins.
    pub pid: Option<String>,
    pub transaction_uuid: Option<String>,
    pub oid: Option<String>,
}

impl FailureCallbackQuery {
    fn correlation_id(&self) -> Option<&str> {
        self.pid
            .as_deref()
            .or(self.transaction_uuid.as_deref())
            .or(self.oid.as_deref())
    }
}

/// Gateway failure callback. A missing or unknown correlation id is logged,
/// not surfaced: the user-facing outcome is the same failure page.
pub async fn esewa_failure_callback(
    State(state): State<AppState>,
    Query(query): Query<FailureCallbackQuery>,
) -> Redirect {
    let correlation_id = query.correlation_id();
    tracing::info!(?correlation_id, "Gateway failure callback received");

    if let Some(id) = correlation_id {
        match Uuid::parse_str(id) {
            Ok(uuid) => {
                if let Err(err) = fail_pending_booking(&state.db, uuid).await {
                    tracing::error!(error = %err, "Failed to update booking from failure callback");
                }
            }
            Err(_) => {
                tracing::warn!(correlation_id = id, "Unparseable correlation id on failure callback");
            }
        }
    }

    Redirect::to(&format!(
        "{}/payment-failed.html?message=Payment_failed_or_cancelled_at_eSewa&transactionId={}",
        state.config.app_base_url,
        correlation_id.unwrap_or("N/A")
    ))
}

/// Transition the booking with this transaction uuid to Failed, but only if
/// it is still Pending. Completed and Failed are terminal.
async fn fail_pending_booking(db: &DatabaseConnection, transaction_uuid: Uuid) -> AppResult<()> {
    let result = booking::Entity::update_many()
        .col_expr(
            booking::Column::PaymentStatus,
            Expr::value(PaymentStatus::Failed),
        )
        .filter(booking::Column::TransactionUuid.eq(transaction_uuid))
        .filter(booking::Column::PaymentStatus.eq(PaymentStatus::Pending))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        tracing::debug!(%transaction_uuid, "No pending booking to mark failed");
    }

    Ok(())
}

fn failure_redirect(config: &Config, reason: &str) -> Redirect {
    Redirect::to(&format!(
        "{}/payment-failed.html?message={}",
        config.app_base_url, reason
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8gBm/:&EnhH.1/q";

    fn encode_payload(value: &serde_json::Value) -> String {
        BASE64_STANDARD.encode(value.to_string())
    }

    fn signed_payload(uuid: &str, status: &str) -> serde_json::Value {
        let mut value = serde_json::json!({
            "transaction_code": "000AWEO",
            "status": status,
            "total_amount": "300",
            "transaction_uuid": uuid,
            "product_code": "EPAYTEST",
            "signed_field_names": "total_amount,transaction_uuid,product_code",
        });
        let message = signature::callback_message(
            "total_amount,transaction_uuid,product_code",
            value.as_object().unwrap(),
        )
        .unwrap();
        value["signature"] = serde_json::Value::String(signature::sign_message(&message, SECRET));
        value
    }

    #[test]
    fn test_valid_payload_verifies() {
        let uuid = "f3b9a1d0-9c1e-4b56-9a70-aafc4f2f1d11";
        let payload = signed_payload(uuid, "COMPLETE");

        let payment = verify_success_payload(&encode_payload(&payload), SECRET).unwrap();
        assert_eq!(payment.transaction_uuid, Uuid::parse_str(uuid).unwrap());
        assert_eq!(payment.transaction_code.as_deref(), Some("000AWEO"));
        assert_eq!(payment.status, "COMPLETE");
    }

    #[test]
    fn test_tampered_amount_is_rejected() {
        let mut payload = signed_payload("f3b9a1d0-9c1e-4b56-9a70-aafc4f2f1d11", "COMPLETE");
        payload["total_amount"] = serde_json::Value::String("1".to_string());

        match verify_success_payload(&encode_payload(&payload), SECRET) {
            Err(CallbackRejection::SignatureMismatch {
                transaction_uuid, ..
            }) => {
                assert!(transaction_uuid.is_some());
            }
            other => panic!("expected signature mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_non_complete_status_survives_verification() {
        // status is outside the signed field set, so the payload verifies
        // and the status check decides the outcome.
        let payload = signed_payload("f3b9a1d0-9c1e-4b56-9a70-aafc4f2f1d11", "PENDING");
        let payment = verify_success_payload(&encode_payload(&payload), SECRET).unwrap();
        assert!(!payment.status.eq_ignore_ascii_case(STATUS_COMPLETE));
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        match verify_success_payload("%%%not-base64%%%", SECRET) {
            Err(CallbackRejection::Malformed(_)) => {}
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_non_json_payload_is_malformed() {
        let data = BASE64_STANDARD.encode("plain text, not json");
        match verify_success_payload(&data, SECRET) {
            Err(CallbackRejection::Malformed(_)) => {}
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_signed_field_is_malformed() {
        let mut payload = signed_payload("f3b9a1d0-9c1e-4b56-9a70-aafc4f2f1d11", "COMPLETE");
        payload.as_object_mut().unwrap().remove("product_code");

        match verify_success_payload(&encode_payload(&payload), SECRET) {
            Err(CallbackRejection::Malformed(_)) => {}
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let payload = signed_payload("f3b9a1d0-9c1e-4b56-9a70-aafc4f2f1d11", "COMPLETE");
        match verify_success_payload(&encode_payload(&payload), "other-secret") {
            Err(CallbackRejection::SignatureMismatch { .. }) => {}
            other => panic!("expected signature mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_query_alias_priority() {
        let query = FailureCallbackQuery {
            pid: None,
            transaction_uuid: Some("abc".to_string()),
            oid: Some("def".to_string()),
        };
        assert_eq!(query.correlation_id(), Some("abc"));

        let empty = FailureCallbackQuery {
            pid: None,
            transaction_uuid: None,
            oid: None,
        };
        assert_eq!(empty.correlation_id(), None);
    }
}
