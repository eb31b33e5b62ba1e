//! Mint internal types
//!
//! Rows owned by the mint process: quotes, spent and pending proofs, and
//! the operating limits injected at startup.

use bitcoin::secp256k1::rand::{self, RngCore};
use serde::{Deserialize, Serialize};

use crate::nuts::{
    CurrencyUnit, Id, MeltQuoteState, MintQuoteState, PublicKey, Witness,
};
use crate::util::hex;
use crate::Amount;

/// Generate a cryptographically random 16 byte quote id, hex encoded
pub fn random_quote_id() -> String {
    let mut rng = rand::thread_rng();

    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);

    hex::encode(bytes)
}

/// Mint quote
///
/// Bridges an incoming Lightning payment to ecash issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuote {
    /// Quote id
    pub id: String,
    /// Quote unit
    pub unit: CurrencyUnit,
    /// Amount of quote
    pub amount: Amount,
    /// Bolt11 payment request
    pub request: String,
    /// Payment hash of the invoice, unique per quote
    pub payment_hash: String,
    /// Quote state
    pub state: MintQuoteState,
    /// Unix timestamp the quote expires at
    pub expiry: u64,
    /// Unix timestamp tokens were issued at
    pub issued_at: Option<u64>,
}

impl MintQuote {
    /// Create new [`MintQuote`] in the unpaid state
    pub fn new(
        unit: CurrencyUnit,
        amount: Amount,
        request: String,
        payment_hash: String,
        expiry: u64,
    ) -> Self {
        Self {
            id: random_quote_id(),
            unit,
            amount,
            request,
            payment_hash,
            state: MintQuoteState::Unpaid,
            expiry,
            issued_at: None,
        }
    }
}

/// Melt quote
///
/// Bridges ecash redemption to an outgoing Lightning payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuote {
    /// Quote id
    pub id: String,
    /// Quote unit
    pub unit: CurrencyUnit,
    /// Bolt11 payment request to pay
    pub request: String,
    /// Payment hash of the invoice
    pub payment_hash: String,
    /// Amount to pay, in the quote unit
    pub amount: Amount,
    /// Fee reserve required on top of the amount
    pub fee_reserve: Amount,
    /// Quote state
    pub state: MeltQuoteState,
    /// Preimage of the paid invoice
    pub payment_preimage: Option<String>,
    /// Lightning fee actually paid
    pub fee_paid: Option<Amount>,
    /// Unix timestamp the quote expires at
    pub expiry: u64,
    /// Partial amount in millisatoshi under MPP [NUT-15]
    pub mpp_amount_msat: Option<u64>,
}

impl MeltQuote {
    /// Create new [`MeltQuote`] in the unpaid state
    pub fn new(
        unit: CurrencyUnit,
        request: String,
        payment_hash: String,
        amount: Amount,
        fee_reserve: Amount,
        expiry: u64,
        mpp_amount_msat: Option<u64>,
    ) -> Self {
        Self {
            id: random_quote_id(),
            unit,
            request,
            payment_hash,
            amount,
            fee_reserve,
            state: MeltQuoteState::Unpaid,
            payment_preimage: None,
            fee_paid: None,
            expiry,
            mpp_amount_msat,
        }
    }
}

/// Spent proof row
///
/// Terminal. `y` carries a storage level unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentProof {
    /// `hash_to_curve(secret)` of the spent proof
    pub y: PublicKey,
    /// Keyset the proof was signed under
    pub keyset_id: Id,
    /// Proof amount
    pub amount: Amount,
    /// Witness supplied when spending
    pub witness: Option<Witness>,
    /// Unix timestamp the proof was spent at
    pub spent_at: u64,
}

/// Pending proof row
///
/// Locked to an in-flight melt; promoted to [`SpentProof`] on Lightning
/// success, removed on failure or expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingProof {
    /// `hash_to_curve(secret)` of the locked proof
    pub y: PublicKey,
    /// Keyset the proof was signed under
    pub keyset_id: Id,
    /// Proof amount
    pub amount: Amount,
    /// Witness supplied with the melt inputs
    pub witness: Option<Witness>,
    /// Melt quote holding the lock
    pub quote_id: Option<String>,
    /// Unix timestamp the lock was taken at
    pub created_at: u64,
    /// Unix timestamp the lock lapses at
    pub expires_at: u64,
}

/// Blind signature record, keyed by `B_`
///
/// Append only; backs NUT-09 restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignatureRecord {
    /// Blinded message the signature was issued on
    pub blinded_message: PublicKey,
    /// Keyset the signature was issued under
    pub keyset_id: Id,
    /// Amount of the signature
    pub amount: Amount,
    /// Blinded signature `C_`
    pub c: PublicKey,
    /// DLEQ proof [NUT-12]
    pub dleq: Option<crate::nuts::BlindSignatureDleq>,
}

/// Fee reserve estimation for melt quotes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeReserve {
    /// Base fee in the quote unit
    pub base_fee: Amount,
    /// Relative fee rate
    pub fee_rate: f64,
}

impl FeeReserve {
    /// Reserve for paying `amount`: `max(1, base_fee + ceil(amount * fee_rate))`
    pub fn for_amount(&self, amount: Amount) -> Amount {
        let relative: u64 = (u64::from(amount) as f64 * self.fee_rate).ceil() as u64;

        Amount::from(u64::from(self.base_fee) + relative).max(Amount::ONE)
    }
}

impl Default for FeeReserve {
    fn default() -> Self {
        Self {
            base_fee: Amount::ONE,
            fee_rate: 0.01,
        }
    }
}

/// Quote and pending-proof time to live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTTL {
    /// Mint quote ttl in seconds
    pub mint_ttl: u64,
    /// Melt quote ttl in seconds
    pub melt_ttl: u64,
    /// Pending proof lock ttl in seconds
    pub pending_ttl: u64,
}

impl Default for QuoteTTL {
    fn default() -> Self {
        Self {
            mint_ttl: 3600,
            melt_ttl: 3600,
            // Pending melt locks lapse after five minutes
            pending_ttl: 300,
        }
    }
}

/// Amount limits for mint and melt quotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintLimits {
    /// Smallest mint quote amount
    pub mint_min: Amount,
    /// Largest mint quote amount
    pub mint_max: Amount,
    /// Smallest melt quote amount
    pub melt_min: Amount,
    /// Largest melt quote amount
    pub melt_max: Amount,
}

impl Default for MintLimits {
    fn default() -> Self {
        Self {
            mint_min: Amount::ONE,
            mint_max: Amount::from(1_000_000),
            melt_min: Amount::ONE,
            melt_max: Amount::from(1_000_000),
        }
    }
}
