//! Canonical encoding and signatures for envelopes.
//!
//! ## Canonical Form `sie-canon/v1`
//!
//! The signed bytes are the compact JSON serialization of
//!
//! ```text
//! {"channel":  <channel or null>,
//!  "constraints": {...},
//!  "id": <id>,
//!  "issuer": <resolved issuer>,
//!  "payload": {"content": ..., "name": <or null>, "sha256": <or null>},
//!  "scope": [...],
//!  "v": "sie-canon/v1"}
//! ```
//!
//! with object keys sorted at every depth and no whitespace. `payload.issuer`
//! is covered through the resolved `issuer` field rather than separately.
//! Signers and verifiers must agree byte for byte; bump `v` for any change.

use serde_json::{json, Map, Value};
use sie_crypto::{b64_decode, b64_encode, ClassicalSigner, ClassicalVerifier, Ed25519Verifier};
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::VerifyError;

/// Version tag embedded in every canonical payload.
pub const CANONICAL_VERSION: &str = "sie-canon/v1";

/// Produce the canonical signable bytes for an envelope.
pub fn signable_bytes(envelope: &Envelope) -> Result<Vec<u8>, VerifyError> {
    let issuer = envelope.resolve_issuer()?;

    let value = json!({
        "channel": envelope.channel,
        "constraints": envelope.constraints,
        "id": envelope.id,
        "issuer": issuer,
        "payload": {
            "content": envelope.payload.content,
            "name": envelope.payload.name,
            "sha256": envelope.payload.sha256,
        },
        "scope": envelope.scope,
        "v": CANONICAL_VERSION,
    });

    serde_json::to_vec(&sorted(value)).map_err(|e| VerifyError::MalformedEnvelope {
        reason: format!("canonical encoding failed: {}", e),
    })
}

/// Sign an envelope in place, replacing any existing signature.
pub fn sign(envelope: &mut Envelope, signer: &dyn ClassicalSigner) -> Result<(), VerifyError> {
    let bytes = signable_bytes(envelope)?;
    let signature = signer.sign(&bytes)?;
    envelope.signature = b64_encode(&signature);
    debug!(
        envelope_id = %envelope.id,
        canonical_len = bytes.len(),
        "Envelope signed"
    );
    Ok(())
}

/// Verify an envelope signature against a base64 public key.
///
/// Returns `SignatureInvalid` for a mismatch and `MalformedKeyMaterial`
/// when the key or signature cannot be decoded or has the wrong length.
pub fn verify(envelope: &Envelope, public_key_b64: &str) -> Result<(), VerifyError> {
    let public_key = b64_decode(public_key_b64, "issuer public key")?;
    let signature = b64_decode(&envelope.signature, "envelope signature")?;
    let bytes = signable_bytes(envelope)?;

    if Ed25519Verifier::new().verify(&public_key, &bytes, &signature)? {
        Ok(())
    } else {
        Err(VerifyError::SignatureInvalid)
    }
}

/// Rebuild a JSON value with every object's keys in sorted order.
///
/// `serde_json::Map` is already ordered unless `preserve_order` is enabled
/// somewhere in the dependency graph; sorting explicitly keeps the canonical
/// form stable either way.
fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k, sorted(v));
            }
            Value::Object(out)
        },
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}
