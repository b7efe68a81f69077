use base64::prelude::{Engine, BASE64_STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Field names signed on outbound payment requests, in signing order.
/// The same list is transmitted to the gateway as `signed_field_names` so
/// the callback verifier can rebuild the identical message.
pub const SIGNED_FIELD_NAMES: &str = "total_amount,transaction_uuid,product_code";

/// HMAC-SHA256 over `message`, base64-encoded, as the gateway expects.
pub fn sign_message(message: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}

/// Canonical signing message for an outbound payment request.
/// Key order must match [`SIGNED_FIELD_NAMES`].
pub fn outbound_message(total_amount: i64, transaction_uuid: &str, product_code: &str) -> String {
    format!(
        "total_amount={},transaction_uuid={},product_code={}",
        total_amount, transaction_uuid, product_code
    )
}

/// Rebuild the signing message for an inbound callback from the field order
/// the gateway itself declared. The gateway is authoritative on order, since
/// it signs what it sends. Returns None if a declared field is absent from
/// the payload.
pub fn callback_message(
    signed_field_names: &str,
    payload: &serde_json::Map<String, serde_json::Value>,
) -> Option<String> {
    let mut parts = Vec::new();
    for field in signed_field_names.split(',') {
        let value = payload.get(field)?;
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        parts.push(format!("{}={}", field, rendered));
    }
    Some(parts.join(","))
}

/// Byte-for-byte comparison of the recomputed signature against the received
/// one. Both are compared in their base64 form, as the gateway transmits them.
pub fn verify_signature(message: &str, secret: &str, received: &str) -> bool {
    sign_message(message, secret) == received
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8gBm/:&EnhH.1/q";

    #[test]
    fn test_signing_is_deterministic() {
        let msg = outbound_message(300, "11-200-45", "EPAYTEST");
        assert_eq!(
            msg,
            "total_amount=300,transaction_uuid=11-200-45,product_code=EPAYTEST"
        );
        assert_eq!(sign_message(&msg, SECRET), sign_message(&msg, SECRET));
    }

    #[test]
    fn test_roundtrip_verifies() {
        let msg = outbound_message(300, "11-200-45", "EPAYTEST");
        let sig = sign_message(&msg, SECRET);
        assert!(verify_signature(&msg, SECRET, &sig));
    }

    #[test]
    fn test_tampered_message_fails() {
        let msg = outbound_message(300, "11-200-45", "EPAYTEST");
        let sig = sign_message(&msg, SECRET);

        let tampered = outbound_message(9999, "11-200-45", "EPAYTEST");
        assert!(!verify_signature(&tampered, SECRET, &sig));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let msg = outbound_message(300, "11-200-45", "EPAYTEST");
        let sig = sign_message(&msg, SECRET);
        assert!(!verify_signature(&msg, "another-secret", &sig));
    }

    #[test]
    fn test_callback_message_follows_declared_order() {
        let payload = serde_json::json!({
            "transaction_code": "0001TX",
            "status": "COMPLETE",
            "total_amount": "300",
            "transaction_uuid": "11-200-45",
            "product_code": "EPAYTEST",
        });
        let map = payload.as_object().unwrap();

        let msg = callback_message("total_amount,transaction_uuid,product_code", map).unwrap();
        assert_eq!(
            msg,
            "total_amount=300,transaction_uuid=11-200-45,product_code=EPAYTEST"
        );

        // A different declared order yields a different message.
        let reordered = callback_message("product_code,total_amount,transaction_uuid", map).unwrap();
        assert_eq!(
            reordered,
            "product_code=EPAYTEST,total_amount=300,transaction_uuid=11-200-45"
        );
    }

    #[test]
    fn test_callback_message_numeric_values() {
        let payload = serde_json::json!({ "total_amount": 300 });
        let map = payload.as_object().unwrap();
        assert_eq!(
            callback_message("total_amount", map).unwrap(),
            "total_amount=300"
        );
    }

    #[test]
    fn test_callback_message_missing_field() {
        let payload = serde_json::json!({ "total_amount": "300" });
        let map = payload.as_object().unwrap();
        assert!(callback_message("total_amount,transaction_uuid", map).is_none());
    }
}
