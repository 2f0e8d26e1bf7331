//! Pool manager authorization.
//!
//! Mutating requests carry a `signature` field: an EIP-191 personal-message
//! signature over the canonical JSON of the rest of the body (object keys
//! sorted, no whitespace). The recovered signer must be one of the pool's
//! managers as reported by the indexer.

use alloy_primitives::{Address, Signature};
use checker_core::{Error, Result, indexer::Indexer, pool::PoolKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A request body with its detached signature.
#[derive(Debug, Clone, Deserialize)]
pub struct Signed<T> {
  #[serde(flatten)]
  pub body:      T,
  pub signature: String,
}

/// Check that `signed` was signed by a manager of `pool`. Returns the
/// signer.
pub async fn authorize<I, T>(indexer: &I, pool: PoolKey, signed: &Signed<T>) -> Result<Address>
where
  I: Indexer,
  T: Serialize,
{
  let message = canonical_json(&signed.body)?;
  let managers = indexer.pool_managers(pool.clone()).await?;
  let signer = check_signer(&message, &signed.signature, &managers)?;
  tracing::debug!(pool = %pool, signer = %signer, "authorized pool manager");
  Ok(signer)
}

/// The signed form of `body`.
pub fn canonical_json<T: Serialize>(body: &T) -> Result<String> {
  let value = serde_json::to_value(body)?;
  Ok(serde_json::to_string(&sorted(value))?)
}

fn sorted(value: Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut entries: Vec<(String, Value)> = map.into_iter().collect();
      entries.sort_by(|a, b| a.0.cmp(&b.0));
      Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect::<Map<_, _>>())
    }
    Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
    other => other,
  }
}

/// Recover the signer of `message` and require it among `managers`.
/// Manager addresses compare case-insensitively; unparseable ones never
/// match.
pub fn check_signer(message: &str, signature: &str, managers: &[String]) -> Result<Address> {
  let signer = recover_signer(message, signature)?;
  let is_manager = managers
    .iter()
    .filter_map(|m| m.trim().parse::<Address>().ok())
    .any(|m| m == signer);
  if is_manager {
    Ok(signer)
  } else {
    Err(Error::Unauthorized(format!("{signer} is not a pool manager")))
  }
}

pub fn recover_signer(message: &str, signature: &str) -> Result<Address> {
  let bytes = hex::decode(signature.trim().trim_start_matches("0x"))
    .map_err(|e| Error::Unauthorized(format!("malformed signature: {e}")))?;
  let signature = Signature::try_from(bytes.as_slice())
    .map_err(|e| Error::Unauthorized(format!("malformed signature: {e}")))?;
  signature
    .recover_address_from_msg(message.as_bytes())
    .map_err(|e| Error::Unauthorized(format!("unrecoverable signature: {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  // A well-known personal_sign vector: "Some data" signed by the key
  // 0x4c0883a6...f362318.
  const MESSAGE: &str = "Some data";
  const SIGNATURE: &str = "0xb91467e570a6466aa9e9876cbcd013baba02900b8979d43fe208a4a4f339f5fd6007e74cd82e037b800186422fc2da167c747ef045e5d18a5f5d4300f8e1a0291c";
  const SIGNER: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";

  #[test]
  fn canonical_json_sorts_keys_recursively() {
    let body = json!({
      "chainId": 10,
      "alloPoolId": "42",
      "summaryInput": { "summary": "ok", "questions": [{ "questionIndex": 0, "answerEnum": 1 }] },
    });
    assert_eq!(
      canonical_json(&body).unwrap(),
      r#"{"alloPoolId":"42","chainId":10,"summaryInput":{"questions":[{"answerEnum":1,"questionIndex":0}],"summary":"ok"}}"#
    );
  }

  #[test]
  fn recovers_known_signer() {
    let signer = recover_signer(MESSAGE, SIGNATURE).unwrap();
    assert_eq!(signer, SIGNER.parse::<Address>().unwrap());
  }

  #[test]
  fn manager_match_ignores_case() {
    let managers = vec!["0xdead".to_owned(), SIGNER.to_lowercase()];
    assert!(check_signer(MESSAGE, SIGNATURE, &managers).is_ok());
  }

  #[test]
  fn non_manager_is_unauthorized() {
    let managers = vec!["0x0000000000000000000000000000000000000002".to_owned()];
    let err = check_signer(MESSAGE, SIGNATURE, &managers).unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)), "{err:?}");
  }

  #[test]
  fn tampered_message_recovers_someone_else() {
    let managers = vec![SIGNER.to_owned()];
    let err = check_signer("Some other data", SIGNATURE, &managers).unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)), "{err:?}");
  }

  #[test]
  fn malformed_signature_is_unauthorized() {
    for signature in ["", "0x1234", "not hex at all"] {
      let err = recover_signer(MESSAGE, signature).unwrap_err();
      assert!(matches!(err, Error::Unauthorized(_)), "{signature}: {err:?}");
    }
  }

  #[test]
  fn signed_body_splits_off_signature() {
    #[derive(Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Body {
      chain_id:     i64,
      allo_pool_id: String,
    }

    let signed: Signed<Body> = serde_json::from_value(json!({
      "chainId": 10,
      "alloPoolId": "42",
      "signature": "0xabc",
    }))
    .unwrap();
    assert_eq!(signed.signature, "0xabc");
    assert_eq!(canonical_json(&signed.body).unwrap(), r#"{"alloPoolId":"42","chainId":10}"#);
  }
}
