//! NUT-14: Hashed Time Lock Contracts (HTLC)
//!
//! <https://github.com/cashubtc/nuts/blob/main/14.md>

use std::str::FromStr;

use bitcoin::hashes::sha256::Hash as Sha256Hash;
use bitcoin::hashes::Hash;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::nut10::{Kind, Secret as Nut10Secret};
use super::nut11::{decode_signatures, valid_signatures, Conditions};
use super::Proof;
use crate::util::{ct_eq, hex, unix_time};

pub mod serde_htlc_witness;

/// NUT14 Errors
#[derive(Debug, Error)]
pub enum Error {
    /// Incorrect secret kind
    #[error("Secret is not a HTLC secret")]
    IncorrectSecretKind,
    /// Hash lock is not valid
    #[error("Hash lock is not valid")]
    InvalidHash,
    /// Preimage does not match
    #[error("Preimage does not match")]
    Preimage,
    /// HTLC preimage must be valid hex encoding
    #[error("Preimage must be valid hex encoding")]
    InvalidHexPreimage,
    /// HTLC preimage must be exactly 32 bytes
    #[error("Preimage must be exactly 32 bytes (64 hex characters)")]
    PreimageInvalidSize,
    /// Witness is missing or not an HTLC witness
    #[error("Witness is missing or not an HTLC witness")]
    WitnessMissing,
    /// Witness Signatures not provided
    #[error("Witness did not provide signatures")]
    SignaturesNotProvided,
    /// NUT10 Error
    #[error(transparent)]
    NUT10(#[from] super::nut10::Error),
    /// NUT11 Error
    #[error(transparent)]
    NUT11(#[from] super::nut11::Error),
}

/// HTLC Witness
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HTLCWitness {
    /// Preimage, hex encoded
    pub preimage: String,
    /// Signatures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<String>>,
}

impl HTLCWitness {
    /// Decode the preimage and require it to be exactly 32 bytes
    pub fn preimage_data(&self) -> Result<[u8; 32], Error> {
        let preimage_bytes = hex::decode(&self.preimage).map_err(|_| Error::InvalidHexPreimage)?;

        preimage_bytes
            .try_into()
            .map_err(|_| Error::PreimageInvalidSize)
    }
}

impl Proof {
    /// Verify HTLC conditions on [Proof]
    ///
    /// A matching preimage spends, together with `n_sigs` signatures when
    /// signing keys are committed. With a wrong or missing preimage the
    /// refund path applies: locktime in the past and one valid refund
    /// signature over the secret.
    pub fn verify_htlc(&self) -> Result<(), Error> {
        let secret: Nut10Secret = (&self.secret).try_into()?;

        if secret.kind != Kind::HTLC {
            return Err(Error::IncorrectSecretKind);
        }

        let conditions: Conditions = secret
            .secret_data
            .tags
            .clone()
            .unwrap_or_default()
            .try_into()?;

        let hash_lock: [u8; 32] = hex::decode(&secret.secret_data.data)
            .map_err(|_| Error::InvalidHash)?
            .try_into()
            .map_err(|_| Error::InvalidHash)?;

        let witness = match &self.witness {
            Some(super::nut00::Witness::HTLCWitness(witness)) => Some(witness),
            _ => None,
        };

        let preimage_matches = match witness {
            Some(witness) => {
                let preimage = witness.preimage_data()?;
                let hash = Sha256Hash::hash(&preimage).to_byte_array();

                ct_eq(&hash, &hash_lock)
            }
            None => false,
        };

        if preimage_matches {
            if let Some(pubkeys) = &conditions.pubkeys {
                let signatures = witness
                    .and_then(|w| w.signatures.clone())
                    .ok_or(Error::SignaturesNotProvided)?;
                let signatures = decode_signatures(&signatures)?;

                let valid = valid_signatures(self.secret.as_bytes(), pubkeys, &signatures)?;

                if valid < conditions.num_sigs.unwrap_or(1) {
                    return Err(Error::SignaturesNotProvided);
                }
            }

            return Ok(());
        }

        // Refund path
        if let (Some(locktime), Some(refund_keys)) = (conditions.locktime, &conditions.refund_keys)
        {
            if locktime.lt(&unix_time()) {
                let signatures = self
                    .witness
                    .as_ref()
                    .and_then(|w| w.signatures())
                    .ok_or(Error::SignaturesNotProvided)?;
                let signatures = decode_signatures(&signatures)?;

                if valid_signatures(self.secret.as_bytes(), refund_keys, &signatures)? >= 1 {
                    return Ok(());
                }
            }
        }

        Err(Error::Preimage)
    }

    /// Add an HTLC preimage to the witness
    pub fn add_preimage(&mut self, preimage: String) {
        self.witness = Some(super::nut00::Witness::HTLCWitness(HTLCWitness {
            preimage,
            signatures: None,
        }))
    }
}

/// Build an HTLC secret for `SHA256(preimage)`
pub fn htlc_secret_for_hash(
    hash: Sha256Hash,
    conditions: Option<Conditions>,
) -> Nut10Secret {
    Nut10Secret::new(Kind::HTLC, hash.to_string(), conditions)
}

impl FromStr for HTLCWitness {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map_err(|_| Error::WitnessMissing)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::nuts::nut01::SecretKey;
    use crate::nuts::{Id, Witness};
    use crate::secret::Secret;
    use crate::Amount;

    const PREIMAGE: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    fn htlc_proof(conditions: Option<Conditions>) -> Proof {
        let preimage_bytes = hex::decode(PREIMAGE).unwrap();
        let hash = Sha256Hash::hash(&preimage_bytes);

        let secret: Secret = htlc_secret_for_hash(hash, conditions).try_into().unwrap();

        Proof {
            amount: Amount::from(1),
            keyset_id: Id::from_str("009a1f293253e41e").unwrap(),
            secret,
            c: crate::nuts::nut01::PublicKey::from_str(
                "02698c4e2b5f9534cd0687d87513c759790cf829aa5739184a3e3735471fbda904",
            )
            .unwrap(),
            witness: None,
        }
    }

    #[test]
    fn test_valid_preimage_spends() {
        let mut proof = htlc_proof(None);
        proof.add_preimage(PREIMAGE.to_string());

        assert!(proof.verify_htlc().is_ok());
    }

    #[test]
    fn test_wrong_preimage_rejected() {
        let mut proof = htlc_proof(None);
        proof.add_preimage(
            "0000000000000000000000000000000000000000000000000000000000000002".to_string(),
        );

        assert!(matches!(proof.verify_htlc().unwrap_err(), Error::Preimage));
    }

    #[test]
    fn test_short_preimage_rejected() {
        let mut proof = htlc_proof(None);
        proof.add_preimage("00ff".to_string());

        assert!(matches!(
            proof.verify_htlc().unwrap_err(),
            Error::PreimageInvalidSize
        ));
    }

    #[test]
    fn test_preimage_with_signature_condition() {
        let signer = SecretKey::generate();

        let conditions = Conditions::new(None, Some(vec![signer.public_key()]), None, None, None);

        let mut proof = htlc_proof(Some(conditions));
        proof.add_preimage(PREIMAGE.to_string());

        // Preimage alone is not enough when pubkeys are committed
        assert!(proof.verify_htlc().is_err());

        let signature = signer.sign(proof.secret.as_bytes()).unwrap();
        proof.witness = Some(Witness::HTLCWitness(HTLCWitness {
            preimage: PREIMAGE.to_string(),
            signatures: Some(vec![signature.to_string()]),
        }));

        assert!(proof.verify_htlc().is_ok());
    }

    #[test]
    fn test_refund_path_after_locktime() {
        let refund = SecretKey::generate();

        let conditions = Conditions::new(
            // Locktime in the past
            Some(21),
            None,
            Some(vec![refund.public_key()]),
            None,
            None,
        );

        let mut proof = htlc_proof(Some(conditions));

        let signature = refund.sign(proof.secret.as_bytes()).unwrap();
        proof.witness = Some(Witness::HTLCWitness(HTLCWitness {
            // Wrong preimage, but a valid refund signature
            preimage: "0000000000000000000000000000000000000000000000000000000000000099"
                .to_string(),
            signatures: Some(vec![signature.to_string()]),
        }));

        assert!(proof.verify_htlc().is_ok());
    }
}
