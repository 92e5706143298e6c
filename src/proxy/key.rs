//! Cache key derivation.
//!
//! A key is `operation(digest)` where digest is the hex SHA-256 of the
//! argument list serialized as JSON. `serde_json` maps keep their keys
//! sorted, so structurally equal arguments serialize to the same bytes no
//! matter how they were built.

use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};
use crate::value::Value;

/// Derives the store path for calling `operation` with `args`.
///
/// Fails with [`CacheError::Serialization`] when an argument cannot be
/// serialized, which is always the case for object values.
pub fn derive_key(operation: &str, args: &[Value]) -> Result<String> {
    let serialized = serde_json::to_vec(args).map_err(|source| CacheError::Serialization {
        operation: operation.to_string(),
        source,
    })?;
    let digest = Sha256::digest(&serialized);
    Ok(format!("{}({})", operation, hex::encode(digest)))
}
