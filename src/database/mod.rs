//! Mint storage
//!
//! A transactional key-indexed store. Correctness of the double-spend
//! defense rests on the contracts here: unique constraints on `Y`,
//! `quote_id`, `payment_hash` and `B_`, all-or-nothing batch inserts, and
//! compare-and-swap quote state transitions. Every write method is a single
//! transaction in a SQL backend.

use async_trait::async_trait;
use thiserror::Error as ThisError;

use crate::nuts::nut07::State;
use crate::nuts::{CurrencyUnit, Id, KeySetInfo, MeltQuoteState, MintKeySet, MintQuoteState, PublicKey};
use crate::types::{BlindSignatureRecord, MeltQuote, MintQuote, PendingProof, SpentProof};

mod memory;

pub use memory::MintMemoryDatabase;

/// Database Error
#[derive(Debug, ThisError)]
pub enum Error {
    /// Unique constraint on `Y` violated
    ///
    /// Carries every `Y` of the batch that already exists; the whole batch
    /// was rolled back.
    #[error("Proofs already known: {ys:?}")]
    Duplicate {
        /// Offending `Y`s
        ys: Vec<PublicKey>,
    },
    /// Unique constraint on `B_` violated
    #[error("Blinded message already signed")]
    AlreadySigned,
    /// Unique constraint on a quote id or payment hash violated
    #[error("Quote already exists")]
    DuplicateQuote,
    /// Unique constraint on a keyset id violated
    #[error("Keyset already exists")]
    DuplicateKeyset,
    /// Compare-and-swap on a quote state failed
    #[error("Quote state is `{actual}`, expected `{expected}`")]
    QuoteStateMismatch {
        /// State the caller required
        expected: String,
        /// State found in the row
        actual: String,
    },
    /// Quote is not known
    #[error("Unknown quote")]
    UnknownQuote,
    /// Keyset is not known
    #[error("Unknown keyset")]
    UnknownKeyset,
    /// Backend failure
    #[error("Database error: {0}")]
    Internal(String),
}

/// Mint storage backend
#[async_trait]
pub trait MintDatabase: Send + Sync {
    // Keysets

    /// Persist a keyset with its summary
    ///
    /// When `info.active` is set, the previously active keyset of the unit
    /// is flipped inactive in the same transaction.
    async fn add_keyset(&self, keyset: MintKeySet, info: KeySetInfo) -> Result<(), Error>;

    /// Keyset with private keys
    async fn get_keyset(&self, id: &Id) -> Result<Option<MintKeySet>, Error>;

    /// All keysets with private keys
    async fn get_keysets(&self) -> Result<Vec<(MintKeySet, KeySetInfo)>, Error>;

    /// Keyset summary
    async fn get_keyset_info(&self, id: &Id) -> Result<Option<KeySetInfo>, Error>;

    /// All keyset summaries
    async fn get_keyset_infos(&self) -> Result<Vec<KeySetInfo>, Error>;

    /// Active keyset for a unit
    async fn get_active_keyset_id(&self, unit: &CurrencyUnit) -> Result<Option<Id>, Error>;

    /// Flip the active flag of a keyset
    async fn set_keyset_active(&self, id: &Id, active: bool) -> Result<(), Error>;

    // Spent and pending proofs

    /// Insert spent proof rows, all-or-nothing
    ///
    /// Rejects with [`Error::Duplicate`] when any `Y` already exists in the
    /// spent or (non-expired) pending namespace; nothing is inserted then.
    async fn add_spent_proofs(&self, proofs: Vec<SpentProof>) -> Result<(), Error>;

    /// Insert pending proof rows, all-or-nothing
    ///
    /// Same uniqueness domain as [`MintDatabase::add_spent_proofs`].
    async fn add_pending_proofs(&self, proofs: Vec<PendingProof>) -> Result<(), Error>;

    /// Move pending rows to spent, single transaction
    async fn promote_pending_to_spent(
        &self,
        ys: &[PublicKey],
        spent_at: u64,
    ) -> Result<(), Error>;

    /// Release pending rows
    async fn remove_pending_proofs(&self, ys: &[PublicKey]) -> Result<(), Error>;

    /// State per `Y`, in request order
    ///
    /// `None` for a `Y` never seen; expired pending locks read as unseen.
    async fn get_proofs_states(&self, ys: &[PublicKey]) -> Result<Vec<Option<State>>, Error>;

    /// Spent rows per `Y`, in request order
    async fn get_spent_proofs(&self, ys: &[PublicKey]) -> Result<Vec<Option<SpentProof>>, Error>;

    /// Pending rows locked by a melt quote
    async fn get_pending_proofs_by_quote(
        &self,
        quote_id: &str,
    ) -> Result<Vec<PendingProof>, Error>;

    /// Delete pending rows whose lock lapsed before `now`, returning the count
    async fn sweep_expired_pending(&self, now: u64) -> Result<u64, Error>;

    // Mint quotes

    /// Persist a mint quote
    ///
    /// `quote_id` and `payment_hash` are unique.
    async fn add_mint_quote(&self, quote: MintQuote) -> Result<(), Error>;

    /// Mint quote by id
    async fn get_mint_quote(&self, quote_id: &str) -> Result<Option<MintQuote>, Error>;

    /// Mint quote by the payment hash of its invoice
    async fn get_mint_quote_by_payment_hash(
        &self,
        payment_hash: &str,
    ) -> Result<Option<MintQuote>, Error>;

    /// All mint quotes
    async fn get_mint_quotes(&self) -> Result<Vec<MintQuote>, Error>;

    /// Compare-and-swap the state of a mint quote
    async fn update_mint_quote_state(
        &self,
        quote_id: &str,
        expected: MintQuoteState,
        new_state: MintQuoteState,
    ) -> Result<(), Error>;

    /// Remove a mint quote
    async fn remove_mint_quote(&self, quote_id: &str) -> Result<(), Error>;

    // Melt quotes

    /// Persist a melt quote
    async fn add_melt_quote(&self, quote: MeltQuote) -> Result<(), Error>;

    /// Melt quote by id
    async fn get_melt_quote(&self, quote_id: &str) -> Result<Option<MeltQuote>, Error>;

    /// All melt quotes
    async fn get_melt_quotes(&self) -> Result<Vec<MeltQuote>, Error>;

    /// Compare-and-swap the state of a melt quote
    async fn update_melt_quote_state(
        &self,
        quote_id: &str,
        expected: MeltQuoteState,
        new_state: MeltQuoteState,
    ) -> Result<(), Error>;

    /// Record a settled payment: `PENDING -> PAID` with preimage and fee
    async fn mark_melt_quote_paid(
        &self,
        quote_id: &str,
        payment_preimage: Option<String>,
        fee_paid: Option<crate::Amount>,
    ) -> Result<(), Error>;

    /// Remove a melt quote
    async fn remove_melt_quote(&self, quote_id: &str) -> Result<(), Error>;

    // Blind signature records

    /// Append signature records, all-or-nothing on the `B_` index
    async fn add_blind_signatures(
        &self,
        records: Vec<BlindSignatureRecord>,
    ) -> Result<(), Error>;

    /// Records per `B_`, in request order
    async fn get_blind_signatures(
        &self,
        blinded_messages: &[PublicKey],
    ) -> Result<Vec<Option<BlindSignatureRecord>>, Error>;
}
