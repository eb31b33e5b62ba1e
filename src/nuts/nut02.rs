//! NUT-02: Keysets and keyset ID
//!
//! <https://github.com/cashubtc/nuts/blob/main/02.md>

use core::fmt;
use core::str::FromStr;
use std::array::TryFromSliceError;
use std::collections::BTreeMap;

use bitcoin::hashes::sha256::Hash as Sha256;
use bitcoin::hashes::Hash;
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{serde_as, VecSkipError};
use thiserror::Error;

use super::nut00::CurrencyUnit;
use super::nut01::{Keys, MintKeyPair, MintKeys, SecretKey};
use crate::util::hex;
use crate::Amount;

/// Default highest denomination exponent: keysets carry `2^0..=2^20`
pub const DEFAULT_MAX_ORDER: u8 = 20;

/// NUT02 Error
#[derive(Debug, Error)]
pub enum Error {
    /// Hex Error
    #[error(transparent)]
    HexError(#[from] hex::Error),
    /// Keyset length error
    #[error("NUT02: ID length invalid")]
    Length,
    /// Unknown version
    #[error("NUT02: Unknown Version")]
    UnknownVersion,
    /// Slice Error
    #[error(transparent)]
    Slice(#[from] TryFromSliceError),
}

/// Keyset version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeySetVersion {
    /// Current Version 00
    Version00,
}

impl KeySetVersion {
    /// [`KeySetVersion`] to byte
    pub fn to_byte(&self) -> u8 {
        match self {
            Self::Version00 => 0,
        }
    }

    /// [`KeySetVersion`] from byte
    pub fn from_byte(byte: &u8) -> Result<Self, Error> {
        match byte {
            0 => Ok(Self::Version00),
            _ => Err(Error::UnknownVersion),
        }
    }
}

impl fmt::Display for KeySetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySetVersion::Version00 => f.write_str("00"),
        }
    }
}

/// Keyset ID
///
/// Derivable by anyone who knows the set of public keys of a mint; identifies
/// the keyset a token was signed under. A version byte followed by seven
/// bytes of the hash of the denomination-sorted public keys, 16 hex chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id {
    version: KeySetVersion,
    id: [u8; Self::BYTELEN],
}

impl Id {
    const STRLEN: usize = 14;
    const BYTELEN: usize = 7;

    /// [`Id`] to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        [vec![self.version.to_byte()], self.id.to_vec()].concat()
    }

    /// [`Id`] from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != Self::BYTELEN + 1 {
            return Err(Error::Length);
        }

        Ok(Self {
            version: KeySetVersion::from_byte(&bytes[0])?,
            id: bytes[1..].try_into()?,
        })
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format!("{}{}", self.version, hex::encode(self.id)))
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::STRLEN + 2 {
            return Err(Error::Length);
        }

        Ok(Self {
            version: KeySetVersion::from_byte(&hex::decode(&s[..2])?[0])?,
            id: hex::decode(&s[2..])?
                .try_into()
                .map_err(|_| Error::Length)?,
        })
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let id = String::deserialize(deserializer)?;
        Id::from_str(&id).map_err(serde::de::Error::custom)
    }
}

impl From<&Keys> for Id {
    /// NUT-02 derivation:
    /// 1. sort public keys by their denomination in ascending order
    /// 2. concatenate all (compressed) public keys
    /// 3. SHA256 the concatenation
    /// 4. take the first 14 characters of the hex-encoded hash
    /// 5. prefix with the keyset ID version byte
    fn from(keys: &Keys) -> Self {
        let mut entries: Vec<(&Amount, &super::PublicKey)> = keys.iter().collect();

        entries.sort_by_key(|(amount, _)| *amount);

        let pubkeys_concat: Vec<u8> = entries
            .iter()
            .map(|(_, pubkey)| pubkey.to_bytes())
            .collect::<Vec<[u8; 33]>>()
            .concat();

        let hash = Sha256::hash(&pubkeys_concat);
        let hex_of_hash = hex::encode(hash.to_byte_array());

        Self {
            version: KeySetVersion::Version00,
            id: hex::decode(&hex_of_hash[0..Self::STRLEN])
                .expect("hash is hex")
                .try_into()
                .expect("first seven bytes of hash"),
        }
    }
}

/// Keyset with public keys
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeySet {
    /// Keyset [`Id`]
    pub id: Id,
    /// Keyset [`CurrencyUnit`]
    pub unit: CurrencyUnit,
    /// Keyset [`Keys`]
    pub keys: Keys,
}

impl From<MintKeySet> for KeySet {
    fn from(keyset: MintKeySet) -> Self {
        Self {
            id: keyset.id,
            unit: keyset.unit,
            keys: Keys::from(keyset.keys),
        }
    }
}

/// Keyset summaries response [NUT-02]
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysetResponse {
    /// Set of keysets the mint has issued under
    #[serde_as(as = "VecSkipError<_>")]
    pub keysets: Vec<KeySetInfo>,
}

/// Keyset summary
#[derive(Debug, Clone, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeySetInfo {
    /// Keyset [`Id`]
    pub id: Id,
    /// Keyset [`CurrencyUnit`]
    pub unit: CurrencyUnit,
    /// Whether the mint signs under this keyset
    ///
    /// Validation of existing signatures is allowed regardless.
    pub active: bool,
    /// Input fee, parts per thousand per input
    #[serde(default)]
    pub input_fee_ppk: u64,
}

/// Keyset with private keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintKeySet {
    /// Keyset [`Id`]
    pub id: Id,
    /// Keyset [`CurrencyUnit`]
    pub unit: CurrencyUnit,
    /// Keyset [`MintKeys`]
    pub keys: MintKeys,
}

impl MintKeySet {
    /// Generate a new [`MintKeySet`]
    ///
    /// A fresh scalar is sampled from the CSPRNG for every denomination
    /// `2^0..=2^max_order`.
    pub fn generate(unit: CurrencyUnit, max_order: u8) -> Self {
        let mut map = BTreeMap::new();
        for i in 0..=u32::from(max_order) {
            let amount = Amount::from(2_u64.pow(i));
            let secret_key = SecretKey::generate();
            map.insert(amount, MintKeyPair::from_secret_key(secret_key));
        }

        let keys = MintKeys::new(map);
        Self {
            id: (&keys).into(),
            unit,
            keys,
        }
    }
}

impl From<&MintKeys> for Id {
    fn from(keys: &MintKeys) -> Self {
        let keys: Keys = keys.clone().into();

        Id::from(&keys)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const SHORT_KEYSET_ID: &str = "00456a94ab4e1c46";
    const SHORT_KEYSET: &str = r#"
        {
            "1":"03a40f20667ed53513075dc51e715ff2046cad64eb68960632269ba7f0210e38bc",
            "2":"03fd4ce5a16b65576145949e6f99f445f8249fee17c606b688b504a849cdc452de",
            "4":"02648eccfa4c026960966276fa5a4cae46ce0fd432211a4f449bf84f13aa5f8303",
            "8":"02fdfd6796bfeac490cbee12f778f867f0a2c68f6508d17c649759ea0dc3547528"
        }
    "#;

    #[test]
    fn test_id_derivation_from_test_vector() {
        let keys: Keys = serde_json::from_str(SHORT_KEYSET).unwrap();

        let id: Id = (&keys).into();

        assert_eq!(id, Id::from_str(SHORT_KEYSET_ID).unwrap());
    }

    #[test]
    fn test_id_shape() {
        let keyset = MintKeySet::generate(CurrencyUnit::Sat, DEFAULT_MAX_ORDER);

        let id = keyset.id.to_string();
        assert_eq!(id.len(), 16);
        assert_eq!(&id[0..2], "00");

        // Pure function of the public keys
        let keys: Keys = keyset.keys.clone().into();
        assert_eq!(Id::from(&keys), keyset.id);

        // Default max order keysets carry 21 denominations
        assert_eq!(keys.len(), 21);
    }

    #[test]
    fn test_id_rejects_bad_lengths() {
        assert!(Id::from_str("00456a94ab4e1c4").is_err());
        assert!(Id::from_str("00456a94ab4e1c4600").is_err());
        assert!(Id::from_str("01456a94ab4e1c46").is_err());
    }

    #[test]
    fn test_keyset_bytes() {
        let id = Id::from_str("009a1f293253e41e").unwrap();

        let id_bytes = id.to_bytes();

        assert_eq!(id_bytes.len(), 8);

        let id_from_bytes = Id::from_bytes(&id_bytes).unwrap();

        assert_eq!(id_from_bytes, id);
    }

    #[test]
    fn test_deserialization_keyset_info() {
        let h = r#"{"id":"009a1f293253e41e","unit":"sat","active":true}"#;

        let keyset_info: KeySetInfo = serde_json::from_str(h).unwrap();
        assert_eq!(keyset_info.input_fee_ppk, 0);

        let h = r#"{"id":"009a1f293253e41e","unit":"sat","active":true,"input_fee_ppk":100}"#;

        let keyset_info: KeySetInfo = serde_json::from_str(h).unwrap();
        assert_eq!(keyset_info.input_fee_ppk, 100);
    }
}
