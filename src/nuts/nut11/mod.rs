//! NUT-11: Pay to Public Key (P2PK)
//!
//! <https://github.com/cashubtc/nuts/blob/main/11.md>

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use bitcoin::secp256k1::schnorr::Signature;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::nut00::Witness;
use super::nut01::PublicKey;
use super::nut10::{Kind, Secret as Nut10Secret};
use super::Proof;
use crate::util::unix_time;

pub mod serde_p2pk_witness;

/// NUT11 Error
#[derive(Debug, Error)]
pub enum Error {
    /// Incorrect secret kind
    #[error("Secret is not a p2pk secret")]
    IncorrectSecretKind,
    /// Witness signature is not valid
    #[error("Invalid signature")]
    InvalidSignature,
    /// Unknown tag in P2PK secret
    #[error("Unknown tag in P2PK secret")]
    UnknownTag,
    /// Unknown Sigflag
    #[error("Unknown sigflag")]
    UnknownSigFlag,
    /// P2PK Spend conditions not met
    #[error("P2PK spend conditions are not met")]
    SpendConditionsNotMet,
    /// Witness Signatures not provided
    #[error("Witness signatures not provided")]
    SignaturesNotProvided,
    /// Kind not found
    #[error("Tag kind not found")]
    KindNotFound,
    /// Parse int error
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),
    /// Secp256k1 error
    #[error(transparent)]
    Secp256k1(#[from] bitcoin::secp256k1::Error),
    /// NUT01 Error
    #[error(transparent)]
    NUT01(#[from] super::nut01::Error),
    /// NUT10 Error
    #[error(transparent)]
    NUT10(#[from] super::nut10::Error),
}

/// P2PK Witness
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct P2PKWitness {
    /// Schnorr signatures, hex encoded
    pub signatures: Vec<String>,
}

impl P2PKWitness {
    /// Whether the witness carries no signatures
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl Proof {
    /// Add a P2PK signature over the proof secret
    pub fn sign_p2pk(&mut self, secret_key: &super::nut01::SecretKey) -> Result<(), Error> {
        let msg: &[u8] = self.secret.as_bytes();
        let signature: Signature = secret_key.sign(msg)?;

        let signatures = vec![signature.to_string()];

        match self.witness.as_mut() {
            Some(witness) => {
                witness.add_signatures(signatures);
            }
            None => {
                let mut p2pk_witness = Witness::P2PKWitness(P2PKWitness::default());
                p2pk_witness.add_signatures(signatures);
                self.witness = Some(p2pk_witness);
            }
        };

        Ok(())
    }

    /// Verify P2PK conditions on [Proof]
    ///
    /// With a locktime in the past and refund keys present, a single valid
    /// refund signature spends; with a locktime in the past and no refund
    /// keys, the proof is spendable by anyone. Otherwise `n_sigs` valid
    /// signatures from distinct committed keys are required.
    pub fn verify_p2pk(&self) -> Result<(), Error> {
        let secret: Nut10Secret = (&self.secret).try_into()?;

        if secret.kind != Kind::P2PK {
            return Err(Error::IncorrectSecretKind);
        }

        let conditions: Conditions = secret
            .secret_data
            .tags
            .clone()
            .unwrap_or_default()
            .try_into()?;
        let msg: &[u8] = self.secret.as_bytes();

        let witness_signatures = self
            .witness
            .as_ref()
            .and_then(|witness| witness.signatures());

        if let Some(locktime) = conditions.locktime {
            if locktime.lt(&unix_time()) {
                match &conditions.refund_keys {
                    Some(refund_keys) => {
                        let signatures = decode_signatures(
                            &witness_signatures.ok_or(Error::SignaturesNotProvided)?,
                        )?;

                        // One valid refund signature spends
                        if valid_signatures(msg, refund_keys, &signatures)? >= 1 {
                            return Ok(());
                        }

                        return Err(Error::SpendConditionsNotMet);
                    }
                    // Expired lock with no refund path: spendable by anyone
                    None => return Ok(()),
                }
            }
        }

        let mut pubkeys = conditions.pubkeys.clone().unwrap_or_default();
        pubkeys.push(PublicKey::from_str(&secret.secret_data.data)?);

        let signatures =
            decode_signatures(&witness_signatures.ok_or(Error::SignaturesNotProvided)?)?;

        let valid = valid_signatures(msg, &pubkeys, &signatures)?;

        if valid >= conditions.num_sigs.unwrap_or(1) {
            Ok(())
        } else {
            Err(Error::SpendConditionsNotMet)
        }
    }
}

/// Decode hex signatures, rejecting malformed ones
pub fn decode_signatures(signatures: &[String]) -> Result<Vec<Signature>, Error> {
    signatures
        .iter()
        .map(|s| Signature::from_str(s).map_err(|_| Error::InvalidSignature))
        .collect()
}

/// Count of distinct pubkeys with a valid signature over `msg`
///
/// Several signatures from the same key count once.
pub fn valid_signatures(
    msg: &[u8],
    pubkeys: &[PublicKey],
    signatures: &[Signature],
) -> Result<u64, Error> {
    let mut signed: HashSet<PublicKey> = HashSet::new();

    for pubkey in pubkeys {
        for signature in signatures {
            if pubkey.verify(msg, signature).is_ok() {
                signed.insert(*pubkey);
            }
        }
    }

    Ok(signed.len() as u64)
}

/// P2PK and HTLC spending conditions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Conditions {
    /// Unix timestamp after which the refund path opens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locktime: Option<u64>,
    /// Additional signing keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkeys: Option<Vec<PublicKey>>,
    /// Keys that can claim after the locktime
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_keys: Option<Vec<PublicKey>>,
    /// Number of required signatures, defaults to 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_sigs: Option<u64>,
    /// Signature scope
    pub sig_flag: SigFlag,
}

impl Conditions {
    /// Create new [`Conditions`]
    pub fn new(
        locktime: Option<u64>,
        pubkeys: Option<Vec<PublicKey>>,
        refund_keys: Option<Vec<PublicKey>>,
        num_sigs: Option<u64>,
        sig_flag: Option<SigFlag>,
    ) -> Self {
        Self {
            locktime,
            pubkeys,
            refund_keys,
            num_sigs,
            sig_flag: sig_flag.unwrap_or_default(),
        }
    }
}

impl From<Conditions> for Vec<Vec<String>> {
    fn from(conditions: Conditions) -> Vec<Vec<String>> {
        let Conditions {
            locktime,
            pubkeys,
            refund_keys,
            num_sigs,
            sig_flag,
        } = conditions;

        let mut tags = Vec::new();

        if let Some(pubkeys) = pubkeys {
            tags.push(Tag::PubKeys(pubkeys).as_vec());
        }

        if let Some(locktime) = locktime {
            tags.push(Tag::LockTime(locktime).as_vec());
        }

        if let Some(num_sigs) = num_sigs {
            tags.push(Tag::NSigs(num_sigs).as_vec());
        }

        if let Some(refund_keys) = refund_keys {
            tags.push(Tag::Refund(refund_keys).as_vec())
        }
        tags.push(Tag::SigFlag(sig_flag).as_vec());
        tags
    }
}

impl TryFrom<Vec<Vec<String>>> for Conditions {
    type Error = Error;

    fn try_from(tags: Vec<Vec<String>>) -> Result<Conditions, Self::Error> {
        let tags: HashMap<TagKind, Tag> = tags
            .into_iter()
            .flat_map(Tag::try_from)
            .map(|t| (t.kind(), t))
            .collect();

        let pubkeys = match tags.get(&TagKind::Pubkeys) {
            Some(Tag::PubKeys(pubkeys)) => Some(pubkeys.clone()),
            _ => None,
        };

        let locktime = match tags.get(&TagKind::Locktime) {
            Some(Tag::LockTime(locktime)) => Some(*locktime),
            _ => None,
        };

        let refund_keys = match tags.get(&TagKind::Refund) {
            Some(Tag::Refund(keys)) => Some(keys.clone()),
            _ => None,
        };

        let sig_flag = match tags.get(&TagKind::SigFlag) {
            Some(Tag::SigFlag(sigflag)) => *sigflag,
            _ => SigFlag::default(),
        };

        let num_sigs = match tags.get(&TagKind::NSigs) {
            Some(Tag::NSigs(num_sigs)) => Some(*num_sigs),
            _ => None,
        };

        Ok(Conditions {
            locktime,
            pubkeys,
            refund_keys,
            num_sigs,
            sig_flag,
        })
    }
}

/// P2PK and HTLC spending condition tags
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// Signature flag
    SigFlag,
    /// Number of signatures required
    #[serde(rename = "n_sigs")]
    NSigs,
    /// Locktime
    Locktime,
    /// Refund
    Refund,
    /// Pubkeys
    Pubkeys,
    /// Custom tag kind
    Custom(String),
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SigFlag => write!(f, "sigflag"),
            Self::NSigs => write!(f, "n_sigs"),
            Self::Locktime => write!(f, "locktime"),
            Self::Refund => write!(f, "refund"),
            Self::Pubkeys => write!(f, "pubkeys"),
            Self::Custom(kind) => write!(f, "{kind}"),
        }
    }
}

impl<S> From<S> for TagKind
where
    S: AsRef<str>,
{
    fn from(tag: S) -> Self {
        match tag.as_ref() {
            "sigflag" => Self::SigFlag,
            "n_sigs" => Self::NSigs,
            "locktime" => Self::Locktime,
            "refund" => Self::Refund,
            "pubkeys" => Self::Pubkeys,
            t => Self::Custom(t.to_owned()),
        }
    }
}

/// Signature scope of a conditioned proof
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord, Hash,
)]
pub enum SigFlag {
    /// Signatures commit to the input alone
    #[default]
    SigInputs,
    /// Signatures commit to all inputs and all outputs of the transaction
    SigAll,
}

impl fmt::Display for SigFlag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SigAll => write!(f, "SIG_ALL"),
            Self::SigInputs => write!(f, "SIG_INPUTS"),
        }
    }
}

impl FromStr for SigFlag {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "SIG_ALL" => Ok(Self::SigAll),
            "SIG_INPUTS" => Ok(Self::SigInputs),
            _ => Err(Error::UnknownSigFlag),
        }
    }
}

/// Spending condition tag
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum Tag {
    /// Signature scope
    SigFlag(SigFlag),
    /// Required signature count
    NSigs(u64),
    /// Locktime
    LockTime(u64),
    /// Refund keys
    Refund(Vec<PublicKey>),
    /// Additional signing keys
    PubKeys(Vec<PublicKey>),
}

impl Tag {
    /// Kind of the [`Tag`]
    pub fn kind(&self) -> TagKind {
        match self {
            Self::SigFlag(_) => TagKind::SigFlag,
            Self::NSigs(_) => TagKind::NSigs,
            Self::LockTime(_) => TagKind::Locktime,
            Self::Refund(_) => TagKind::Refund,
            Self::PubKeys(_) => TagKind::Pubkeys,
        }
    }

    /// [`Tag`] as string vector
    pub fn as_vec(&self) -> Vec<String> {
        self.clone().into()
    }
}

impl<S> TryFrom<Vec<S>> for Tag
where
    S: AsRef<str>,
{
    type Error = Error;

    fn try_from(tag: Vec<S>) -> Result<Self, Self::Error> {
        let tag_kind: TagKind = match tag.first() {
            Some(kind) => TagKind::from(kind),
            None => return Err(Error::KindNotFound),
        };

        let value = tag.get(1).map(|v| v.as_ref()).ok_or(Error::UnknownTag);

        match tag_kind {
            TagKind::SigFlag => Ok(Tag::SigFlag(SigFlag::from_str(value?)?)),
            TagKind::NSigs => Ok(Tag::NSigs(value?.parse()?)),
            TagKind::Locktime => Ok(Tag::LockTime(value?.parse()?)),
            TagKind::Refund => {
                let pubkeys = tag
                    .iter()
                    .skip(1)
                    .flat_map(|p| PublicKey::from_str(p.as_ref()))
                    .collect();

                Ok(Self::Refund(pubkeys))
            }
            TagKind::Pubkeys => {
                let pubkeys = tag
                    .iter()
                    .skip(1)
                    .flat_map(|p| PublicKey::from_str(p.as_ref()))
                    .collect();

                Ok(Self::PubKeys(pubkeys))
            }
            _ => Err(Error::UnknownTag),
        }
    }
}

impl From<Tag> for Vec<String> {
    fn from(data: Tag) -> Self {
        match data {
            Tag::SigFlag(sigflag) => vec![TagKind::SigFlag.to_string(), sigflag.to_string()],
            Tag::NSigs(num_sig) => vec![TagKind::NSigs.to_string(), num_sig.to_string()],
            Tag::LockTime(locktime) => vec![TagKind::Locktime.to_string(), locktime.to_string()],
            Tag::PubKeys(pubkeys) => {
                let mut tag = vec![TagKind::Pubkeys.to_string()];
                for pubkey in pubkeys.into_iter() {
                    tag.push(pubkey.to_string())
                }
                tag
            }
            Tag::Refund(pubkeys) => {
                let mut tag = vec![TagKind::Refund.to_string()];

                for pubkey in pubkeys {
                    tag.push(pubkey.to_string())
                }
                tag
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::nuts::nut01::SecretKey;
    use crate::nuts::Id;
    use crate::secret::Secret;
    use crate::Amount;

    fn p2pk_proof(
        owner: &SecretKey,
        conditions: Conditions,
    ) -> Proof {
        let secret: Secret = Nut10Secret::new(
            Kind::P2PK,
            owner.public_key().to_hex(),
            Some(conditions),
        )
        .try_into()
        .unwrap();

        Proof {
            keyset_id: Id::from_str("009a1f293253e41e").unwrap(),
            amount: Amount::ZERO,
            secret,
            c: crate::nuts::nut01::PublicKey::from_str(
                "02698c4e2b5f9534cd0687d87513c759790cf829aa5739184a3e3735471fbda904",
            )
            .unwrap(),
            witness: None,
        }
    }

    #[test]
    fn test_sign_and_verify_p2pk() {
        let owner = SecretKey::generate();
        let mut proof = p2pk_proof(&owner, Conditions::default());

        assert!(matches!(
            proof.verify_p2pk().unwrap_err(),
            Error::SignaturesNotProvided
        ));

        proof.sign_p2pk(&owner).unwrap();
        assert!(proof.verify_p2pk().is_ok());
    }

    #[test]
    fn test_wrong_key_does_not_verify() {
        let owner = SecretKey::generate();
        let intruder = SecretKey::generate();

        let mut proof = p2pk_proof(&owner, Conditions::default());
        proof.sign_p2pk(&intruder).unwrap();

        assert!(proof.verify_p2pk().is_err());
    }

    #[test]
    fn test_multisig_requires_distinct_signers() {
        let owner = SecretKey::generate();
        let second = SecretKey::generate();

        let conditions = Conditions::new(
            None,
            Some(vec![second.public_key()]),
            None,
            Some(2),
            None,
        );

        let mut proof = p2pk_proof(&owner, conditions);

        // Signing twice with the same key must not satisfy n_sigs = 2
        proof.sign_p2pk(&owner).unwrap();
        proof.sign_p2pk(&owner).unwrap();
        assert!(proof.verify_p2pk().is_err());

        proof.sign_p2pk(&second).unwrap();
        assert!(proof.verify_p2pk().is_ok());
    }

    #[test]
    fn test_expired_locktime_with_refund_key() {
        let owner = SecretKey::generate();
        let refund = SecretKey::generate();

        let conditions = Conditions::new(
            // Locktime in the past
            Some(21),
            None,
            Some(vec![refund.public_key()]),
            None,
            None,
        );

        let mut proof = p2pk_proof(&owner, conditions.clone());

        // Owner signature no longer spends after the locktime
        proof.sign_p2pk(&owner).unwrap();
        assert!(proof.verify_p2pk().is_err());

        let mut proof = p2pk_proof(&owner, conditions);
        proof.sign_p2pk(&refund).unwrap();
        assert!(proof.verify_p2pk().is_ok());
    }

    #[test]
    fn test_expired_locktime_without_refund_is_open() {
        let owner = SecretKey::generate();

        let conditions = Conditions::new(Some(21), None, None, None, None);

        let proof = p2pk_proof(&owner, conditions);
        assert!(proof.verify_p2pk().is_ok());
    }

    #[test]
    fn test_future_locktime_requires_owner() {
        let owner = SecretKey::generate();
        let refund = SecretKey::generate();

        let conditions = Conditions::new(
            Some(unix_time() + 10_000),
            None,
            Some(vec![refund.public_key()]),
            None,
            None,
        );

        let mut proof = p2pk_proof(&owner, conditions);
        proof.sign_p2pk(&refund).unwrap();
        assert!(proof.verify_p2pk().is_err());

        proof.sign_p2pk(&owner).unwrap();
        assert!(proof.verify_p2pk().is_ok());
    }

    #[test]
    fn test_conditions_tag_round_trip() {
        let pubkey = PublicKey::from_str(
            "02698c4e2b5f9534cd0687d87513c759790cf829aa5739184a3e3735471fbda904",
        )
        .unwrap();

        let conditions = Conditions::new(
            Some(99999),
            Some(vec![pubkey]),
            Some(vec![pubkey]),
            Some(2),
            Some(SigFlag::SigAll),
        );

        let tags: Vec<Vec<String>> = conditions.clone().into();
        let parsed: Conditions = tags.try_into().unwrap();

        assert_eq!(parsed, conditions);
    }

    #[test]
    fn test_vector_verify() {
        // Proof with a valid signature
        let json: &str = r#"{
            "amount":1,
            "secret":"[\"P2PK\",{\"nonce\":\"859d4935c4907062a6297cf4e663e2835d90d97ecdd510745d32f6816323a41f\",\"data\":\"0249098aa8b9d2fbec49ff8598feb17b592b986e62319a4fa488a3dc36387157a7\",\"tags\":[[\"sigflag\",\"SIG_INPUTS\"]]}]",
            "C":"02698c4e2b5f9534cd0687d87513c759790cf829aa5739184a3e3735471fbda904",
            "id":"009a1f293253e41e",
            "witness":"{\"signatures\":[\"60f3c9b766770b46caac1d27e1ae6b77c8866ebaeba0b9489fe6a15a837eaa6fcd6eaa825499c72ac342983983fd3ba3a8a41f56677cc99ffd73da68b59e1383\"]}"
        }"#;
        let valid_proof: Proof = serde_json::from_str(json).unwrap();

        assert!(valid_proof.verify_p2pk().is_ok());

        // Same proof with a signature over a different secret
        let invalid_proof = r#"{"amount":1,"secret":"[\"P2PK\",{\"nonce\":\"859d4935c4907062a6297cf4e663e2835d90d97ecdd510745d32f6816323a41f\",\"data\":\"0249098aa8b9d2fbec49ff8598feb17b592b986e62319a4fa488a3dc36387157a7\",\"tags\":[[\"sigflag\",\"SIG_INPUTS\"]]}]","C":"02698c4e2b5f9534cd0687d87513c759790cf829aa5739184a3e3735471fbda904","id":"009a1f293253e41e","witness":"{\"signatures\":[\"3426df9730d365a9d18d79bed2f3e78e9172d7107c55306ac5ddd1b2d065893366cfa24ff3c874ebf1fc22360ba5888ddf6ff5dbcb9e5f2f5a1368f7afc64f15\"]}"}"#;

        let invalid_proof: Proof = serde_json::from_str(invalid_proof).unwrap();

        assert!(invalid_proof.verify_p2pk().is_err());
    }
}
