//! Published key set wire format and the verified-key snapshot built from it.
//!
//! # Purpose
//! Decodes the identity provider's `/.well-known/jwks.json` document and turns
//! its RSA signature keys into ready-to-use decoding keys indexed by `kid`.
//!
//! # Key invariants
//! - A [`KeySet`] only contains RSA keys usable for signatures whose `n`/`e`
//!   components decode. Anything else is dropped when the snapshot is built, so
//!   lookups for such a `kid` behave exactly like an absent key.
//! - A [`KeySet`] is immutable once built; the cache replaces it wholesale.
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

/// A provider public key, identified by `key_id`.
#[derive(Clone)]
pub struct SigningKey {
    pub key_id: String,
    pub key_type: String,
    pub usage: String,
    pub modulus: String,
    pub exponent: String,
    pub algorithm: Option<String>,
    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("key_type", &self.key_type)
            .field("usage", &self.usage)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Build a signing key from a published JWK.
    ///
    /// # Errors
    /// Returns a short reason when the JWK is not an RSA signature key or its
    /// components cannot be decoded.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, String> {
        let key_id = jwk.kid.clone().ok_or_else(|| "missing kid".to_string())?;
        if jwk.kty != "RSA" {
            return Err(format!("unsupported kty {}", jwk.kty));
        }
        // Keys without `use` are accepted; keys published for encryption are not.
        let usage = jwk.use_field.clone().unwrap_or_else(|| "sig".to_string());
        if usage != "sig" {
            return Err(format!("unsupported use {usage}"));
        }
        let modulus = jwk.n.clone().ok_or_else(|| "missing n".to_string())?;
        let exponent = jwk.e.clone().ok_or_else(|| "missing e".to_string())?;
        let decoding_key = DecodingKey::from_rsa_components(&modulus, &exponent)
            .map_err(|err| format!("invalid rsa components: {err}"))?;
        Ok(Self {
            key_id,
            key_type: jwk.kty.clone(),
            usage,
            modulus,
            exponent,
            algorithm: jwk.alg.clone(),
            decoding_key,
        })
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Whether this key may verify a token signed with `alg`. Keys that do not
    /// pin an algorithm accept any configured RSA algorithm.
    pub fn supports(&self, alg: Algorithm) -> bool {
        match &self.algorithm {
            Some(name) => name.parse::<Algorithm>().ok() == Some(alg),
            None => true,
        }
    }
}

/// Immutable `kid -> key` snapshot of one fetched key set.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,
}

impl KeySet {
    pub fn from_jwks(jwks: &Jwks) -> Self {
        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            match SigningKey::from_jwk(jwk) {
                Ok(key) => {
                    if keys.contains_key(&key.key_id) {
                        tracing::debug!(kid = %key.key_id, "duplicate kid in key set, keeping first");
                        continue;
                    }
                    keys.insert(key.key_id.clone(), Arc::new(key));
                }
                Err(reason) => {
                    tracing::debug!(kid = ?jwk.kid, %reason, "skipping unusable jwk");
                }
            }
        }
        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
