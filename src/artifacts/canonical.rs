//! Canonical JSON and content hashing (§4.4). Canonicalization sorts object
//! keys at every level, drops `null` optional subtrees, and leaves
//! timestamps as the RFC-3339 UTC strings chrono's serde impl already
//! produces. `serde_json::Map` is `BTreeMap`-backed in this workspace (the
//! `preserve_order` feature is never enabled), so object keys are already
//! sorted; `canonicalize` still walks and re-builds the tree explicitly so
//! the guarantee doesn't silently depend on that crate default.
//!
//! `hash` is excluded at the top level: it is the artifact's identity, not
//! part of what gets hashed.

use crate::domain::Artifact;
use crate::errors::AppError;
use serde_json::Value;
use sha2::{Digest, Sha256};

fn canonicalize_value(value: Value, drop_hash: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            for key in keys {
                if drop_hash && key == "hash" {
                    continue;
                }
                let v = map.get(&key).cloned().unwrap_or(Value::Null);
                if v.is_null() {
                    continue;
                }
                sorted.insert(key, canonicalize_value(v, false));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(|v| canonicalize_value(v, false)).collect()),
        other => other,
    }
}

pub fn canonical_json(artifact: &Artifact) -> Result<String, AppError> {
    let value = serde_json::to_value(artifact)
        .map_err(|e| AppError::Fatal(format!("artifact serialization failed: {e}")))?;
    let canonical = canonicalize_value(value, true);
    serde_json::to_string(&canonical)
        .map_err(|e| AppError::Fatal(format!("canonical serialization failed: {e}")))
}

pub fn compute_hash(artifact: &Artifact) -> Result<String, AppError> {
    let canonical = canonical_json(artifact)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Recomputes the hash and compares to `artifact.hash`; a mismatch is fatal
/// for that artifact (§4.4 failure semantics).
pub fn verify(artifact: &Artifact) -> Result<(), AppError> {
    let computed = compute_hash(artifact)?;
    if computed != artifact.hash {
        return Err(AppError::Fatal(format!(
            "artifact {} hash mismatch: stored {} computed {computed}",
            artifact.artifact_id, artifact.hash
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RiskProfile, StrategyRef};
    use chrono::Utc;

    fn artifact_with_params(params: serde_json::Map<String, serde_json::Value>) -> Artifact {
        Artifact {
            id: uuid::Uuid::new_v4(),
            artifact_id: "sma_cross-2025-01-01T00:00:00Z".into(),
            schema_version: 1,
            strategy: StrategyRef {
                name: "sma_cross".into(),
                version: "1.0.0".into(),
                code_ref: None,
                params,
            },
            data_window: None,
            validation: None,
            risk_profile: RiskProfile {
                max_position_pct: 0.2,
                max_daily_loss: 0.05,
                allowed_order_types: vec!["LMT".into(), "MKT".into()],
            },
            hash: String::new(),
            signature: None,
            created_by: "system".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn key_order_does_not_affect_hash() {
        let mut params_a = serde_json::Map::new();
        params_a.insert("short".into(), serde_json::json!(10));
        params_a.insert("long".into(), serde_json::json!(30));

        let mut params_b = serde_json::Map::new();
        params_b.insert("long".into(), serde_json::json!(30));
        params_b.insert("short".into(), serde_json::json!(10));

        let a = artifact_with_params(params_a);
        let b = artifact_with_params(params_b);

        assert_eq!(compute_hash(&a).unwrap(), compute_hash(&b).unwrap());
    }

    #[test]
    fn verify_detects_tampering() {
        let mut artifact = artifact_with_params(serde_json::Map::new());
        artifact.hash = compute_hash(&artifact).unwrap();
        assert!(verify(&artifact).is_ok());

        artifact.strategy.version = "2.0.0".into();
        assert!(verify(&artifact).is_err());
    }

    #[test]
    fn null_optional_subtrees_are_omitted() {
        let artifact = artifact_with_params(serde_json::Map::new());
        let json = canonical_json(&artifact).unwrap();
        assert!(!json.contains("data_window"));
        assert!(!json.contains("validation"));
        assert!(!json.contains("signature"));
    }
}
