use std::{fmt, str::FromStr};

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of digest bytes kept in an address.
pub const ADDRESS_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("invalid secret key hex: {0}")]
    InvalidSecretHex(String),
    #[error("secret key must be 32 bytes (64 hex chars), got {0} bytes")]
    InvalidSecretLength(usize),
    #[error("invalid address {0}: expected 0x followed by {expected} hex chars", expected = ADDRESS_LEN * 2)]
    InvalidAddress(String),
}

/// External identity of a depositor.
///
/// Addresses are `0x` + hex of the first [`ADDRESS_LEN`] bytes of
/// `SHA-256(verifying_key)`, always lowercase.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        Self(format!("0x{}", hex::encode(&digest[..ADDRESS_LEN])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix("0x")
            .ok_or_else(|| AccountError::InvalidAddress(s.to_string()))?;
        if body.len() != ADDRESS_LEN * 2 || hex::decode(body).is_err() {
            return Err(AccountError::InvalidAddress(s.to_string()));
        }
        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

/// Signing key of an account holder. Whoever holds it acts as the account.
#[derive(Clone)]
pub struct AccountKey {
    signing: SigningKey,
}

impl AccountKey {
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(secret),
        }
    }

    pub fn from_hex(sk_hex: &str) -> Result<Self, AccountError> {
        let bytes = hex::decode(sk_hex.trim())
            .map_err(|err| AccountError::InvalidSecretHex(err.to_string()))?;
        let secret: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AccountError::InvalidSecretLength(bytes.len()))?;
        Ok(Self::from_bytes(&secret))
    }

    pub fn address(&self) -> AccountId {
        AccountId::from_verifying_key(&self.signing.verifying_key())
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing.to_bytes())
    }

    pub fn public_hex(&self) -> String {
        hex::encode(self.signing.verifying_key().as_bytes())
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_stable_for_a_key() {
        let key = AccountKey::from_bytes(&[7u8; 32]);
        let again = AccountKey::from_hex(&key.secret_hex()).unwrap();
        assert_eq!(key.address(), again.address());
        assert_eq!(key.address().as_str().len(), 2 + ADDRESS_LEN * 2);
        assert!(key.address().as_str().starts_with("0x"));
    }

    #[test]
    fn distinct_keys_have_distinct_addresses() {
        let a = AccountKey::from_bytes(&[1u8; 32]).address();
        let b = AccountKey::from_bytes(&[2u8; 32]).address();
        assert_ne!(a, b);
    }

    #[test]
    fn parsing_normalises_case_and_rejects_garbage() {
        let addr = AccountKey::from_bytes(&[3u8; 32]).address();
        let upper = format!("0x{}", addr.as_str()[2..].to_ascii_uppercase());
        assert_eq!(upper.parse::<AccountId>().unwrap(), addr);
        assert!("deadbeef".parse::<AccountId>().is_err());
        assert!("0x1234".parse::<AccountId>().is_err());
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = AccountKey::from_hex("abcd").unwrap_err();
        assert_eq!(err, AccountError::InvalidSecretLength(2));
        assert!(matches!(
            AccountKey::from_hex("zz"),
            Err(AccountError::InvalidSecretHex(_))
        ));
    }

    #[test]
    fn account_id_serializes_as_plain_string() {
        let addr = AccountKey::from_bytes(&[4u8; 32]).address();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
