//! Secret
//!
//! The secret data that allows spending ecash.

use std::fmt;
use std::str::FromStr;

use bitcoin::secp256k1::rand::{self, RngCore};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::util::hex;

/// Maximum length of a secret in bytes
pub const MAX_SECRET_LENGTH: usize = 1024;

/// Secret Errors
#[derive(Debug, Error)]
pub enum Error {
    /// Secret is longer than the protocol allows
    #[error("Secret exceeds maximum allowed length")]
    InvalidLength,
}

/// Secret of a [`crate::nuts::Proof`]
///
/// `Y = hash_to_curve(secret)` is the stable identifier the mint tracks for
/// spent-state lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Secret::new(s).map_err(serde::de::Error::custom)
    }
}

impl Secret {
    /// Create new [`Secret`]
    pub fn new<S>(secret: S) -> Result<Self, Error>
    where
        S: Into<String>,
    {
        let secret: String = secret.into();
        if secret.len() > MAX_SECRET_LENGTH {
            return Err(Error::InvalidLength);
        }
        Ok(Self(secret))
    }

    /// Generate a new random secret as the recommended 32 byte hex
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();

        let mut random_bytes = [0u8; 32];
        rng.fill_bytes(&mut random_bytes);

        Self(hex::encode(random_bytes))
    }

    /// [`Secret`] as bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// [`Secret`] to bytes
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl FromStr for Secret {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
