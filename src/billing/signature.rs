/// Webhook signature verification
///
/// The payment provider signs each webhook delivery with a header of
/// the form `t=<unix>,v1=<hex hmac>`, where the MAC covers the string
/// `"{t}.{raw body}"` keyed with the endpoint secret.
use crate::error::{HostError, HostResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Maximum allowed clock skew between the signature timestamp and now
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Verify a webhook signature header against the raw request body.
///
/// Timestamp checking bounds replay of captured deliveries.
pub fn verify_signature(
    header: &str,
    payload: &[u8],
    secret: &str,
    now_unix: i64,
) -> HostResult<()> {
    let (timestamp, signatures) = parse_header(header)?;

    if (now_unix - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
        return Err(HostError::SignatureInvalid(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    type HmacSha256 = Hmac<Sha256>;

    // Any v1 entry may match; providers send several during secret rotation
    for signature in signatures {
        let Ok(sig_bytes) = hex::decode(&signature) else {
            continue;
        };

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| HostError::Internal(format!("Invalid webhook secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&sig_bytes).is_ok() {
            return Ok(());
        }
    }

    Err(HostError::SignatureInvalid(
        "No matching signature".to_string(),
    ))
}

fn parse_header(header: &str) -> HostResult<(i64, Vec<String>)> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(v)) => {
                timestamp = v.parse().ok();
            }
            (Some("v1"), Some(v)) => {
                signatures.push(v.to_string());
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| HostError::SignatureInvalid("Missing timestamp".to_string()))?;

    if signatures.is_empty() {
        return Err(HostError::SignatureInvalid(
            "Missing v1 signature".to_string(),
        ));
    }

    Ok((timestamp, signatures))
}

/// Build a signature header for a payload, used by tests and the
/// local webhook replay tool
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"type":"invoice.payment_succeeded"}"#;
        let now = 1_700_000_000;
        let header = sign_payload(payload, SECRET, now);

        verify_signature(&header, payload, SECRET, now).unwrap();
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"{}";
        let now = 1_700_000_000;
        let header = sign_payload(payload, "whsec_other", now);

        let err = verify_signature(&header, payload, SECRET, now).unwrap_err();
        assert!(matches!(err, HostError::SignatureInvalid(_)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let now = 1_700_000_000;
        let header = sign_payload(b"{}", SECRET, now);

        let err = verify_signature(&header, b"{\"x\":1}", SECRET, now).unwrap_err();
        assert!(matches!(err, HostError::SignatureInvalid(_)));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let signed_at = 1_700_000_000;
        let header = sign_payload(payload, SECRET, signed_at);

        let err = verify_signature(
            &header,
            payload,
            SECRET,
            signed_at + TIMESTAMP_TOLERANCE_SECS + 1,
        )
        .unwrap_err();
        assert!(matches!(err, HostError::SignatureInvalid(_)));
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(verify_signature("garbage", b"{}", SECRET, 0).is_err());
        assert!(verify_signature("t=notanumber,v1=aa", b"{}", SECRET, 0).is_err());
        assert!(verify_signature("t=123", b"{}", SECRET, 123).is_err());
    }
}
