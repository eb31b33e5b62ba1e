//! In-memory mint storage
//!
//! Reference implementation of [`MintDatabase`]. A single `RwLock` over all
//! tables makes every write method one transaction; uniqueness checks run
//! against the locked state before any row is touched, which gives the
//! all-or-nothing semantics the contract requires.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Error, MintDatabase};
use crate::nuts::nut07::State;
use crate::nuts::{
    CurrencyUnit, Id, KeySetInfo, MeltQuoteState, MintKeySet, MintQuoteState, PublicKey,
};
use crate::types::{BlindSignatureRecord, MeltQuote, MintQuote, PendingProof, SpentProof};
use crate::util::unix_time;
use crate::Amount;

#[derive(Debug, Default)]
struct Tables {
    keysets: HashMap<Id, (MintKeySet, KeySetInfo)>,
    active_keysets: HashMap<CurrencyUnit, Id>,
    spent_proofs: HashMap<[u8; 33], SpentProof>,
    pending_proofs: HashMap<[u8; 33], PendingProof>,
    mint_quotes: HashMap<String, MintQuote>,
    mint_quotes_by_payment_hash: HashMap<String, String>,
    melt_quotes: HashMap<String, MeltQuote>,
    blind_signatures: HashMap<[u8; 33], BlindSignatureRecord>,
}

impl Tables {
    /// Whether `y` is taken in the spent or live pending namespace
    fn is_y_taken(&self, y: &PublicKey, now: u64) -> bool {
        let key = y.to_bytes();

        if self.spent_proofs.contains_key(&key) {
            return true;
        }

        match self.pending_proofs.get(&key) {
            Some(pending) => pending.expires_at >= now,
            None => false,
        }
    }
}

/// In-memory [`MintDatabase`]
#[derive(Debug, Clone, Default)]
pub struct MintMemoryDatabase {
    tables: Arc<RwLock<Tables>>,
}

impl MintMemoryDatabase {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MintDatabase for MintMemoryDatabase {
    async fn add_keyset(&self, keyset: MintKeySet, info: KeySetInfo) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        if tables.keysets.contains_key(&keyset.id) {
            return Err(Error::DuplicateKeyset);
        }

        if info.active {
            if let Some(previous) = tables.active_keysets.get(&info.unit).copied() {
                if let Some((_, prev_info)) = tables.keysets.get_mut(&previous) {
                    prev_info.active = false;
                }
            }
            tables.active_keysets.insert(info.unit.clone(), keyset.id);
        }

        tables.keysets.insert(keyset.id, (keyset, info));
        Ok(())
    }

    async fn get_keyset(&self, id: &Id) -> Result<Option<MintKeySet>, Error> {
        Ok(self
            .tables
            .read()
            .await
            .keysets
            .get(id)
            .map(|(keyset, _)| keyset.clone()))
    }

    async fn get_keysets(&self) -> Result<Vec<(MintKeySet, KeySetInfo)>, Error> {
        Ok(self.tables.read().await.keysets.values().cloned().collect())
    }

    async fn get_keyset_info(&self, id: &Id) -> Result<Option<KeySetInfo>, Error> {
        Ok(self
            .tables
            .read()
            .await
            .keysets
            .get(id)
            .map(|(_, info)| info.clone()))
    }

    async fn get_keyset_infos(&self) -> Result<Vec<KeySetInfo>, Error> {
        Ok(self
            .tables
            .read()
            .await
            .keysets
            .values()
            .map(|(_, info)| info.clone())
            .collect())
    }

    async fn get_active_keyset_id(&self, unit: &CurrencyUnit) -> Result<Option<Id>, Error> {
        Ok(self.tables.read().await.active_keysets.get(unit).copied())
    }

    async fn set_keyset_active(&self, id: &Id, active: bool) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        let unit = {
            let (_, info) = tables.keysets.get_mut(id).ok_or(Error::UnknownKeyset)?;
            info.active = active;
            info.unit.clone()
        };

        if active {
            tables.active_keysets.insert(unit, *id);
        } else if tables.active_keysets.get(&unit) == Some(id) {
            tables.active_keysets.remove(&unit);
        }

        Ok(())
    }

    async fn add_spent_proofs(&self, proofs: Vec<SpentProof>) -> Result<(), Error> {
        let mut tables = self.tables.write().await;
        let now = unix_time();

        let duplicates: Vec<PublicKey> = proofs
            .iter()
            .filter(|proof| tables.is_y_taken(&proof.y, now))
            .map(|proof| proof.y)
            .collect();

        if !duplicates.is_empty() {
            return Err(Error::Duplicate { ys: duplicates });
        }

        for proof in proofs {
            // An expired pending lock on the same y is superseded
            tables.pending_proofs.remove(&proof.y.to_bytes());
            tables.spent_proofs.insert(proof.y.to_bytes(), proof);
        }

        Ok(())
    }

    async fn add_pending_proofs(&self, proofs: Vec<PendingProof>) -> Result<(), Error> {
        let mut tables = self.tables.write().await;
        let now = unix_time();

        let duplicates: Vec<PublicKey> = proofs
            .iter()
            .filter(|proof| tables.is_y_taken(&proof.y, now))
            .map(|proof| proof.y)
            .collect();

        if !duplicates.is_empty() {
            return Err(Error::Duplicate { ys: duplicates });
        }

        for proof in proofs {
            tables.pending_proofs.insert(proof.y.to_bytes(), proof);
        }

        Ok(())
    }

    async fn promote_pending_to_spent(
        &self,
        ys: &[PublicKey],
        spent_at: u64,
    ) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        // All rows must exist before any is moved
        for y in ys {
            if !tables.pending_proofs.contains_key(&y.to_bytes()) {
                return Err(Error::Internal(format!("No pending proof for y {y}")));
            }
        }

        for y in ys {
            let pending = tables
                .pending_proofs
                .remove(&y.to_bytes())
                .expect("Presence checked above");

            tables.spent_proofs.insert(
                y.to_bytes(),
                SpentProof {
                    y: pending.y,
                    keyset_id: pending.keyset_id,
                    amount: pending.amount,
                    witness: pending.witness,
                    spent_at,
                },
            );
        }

        Ok(())
    }

    async fn remove_pending_proofs(&self, ys: &[PublicKey]) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        for y in ys {
            tables.pending_proofs.remove(&y.to_bytes());
        }

        Ok(())
    }

    async fn get_proofs_states(&self, ys: &[PublicKey]) -> Result<Vec<Option<State>>, Error> {
        let tables = self.tables.read().await;
        let now = unix_time();

        Ok(ys
            .iter()
            .map(|y| {
                let key = y.to_bytes();

                if tables.spent_proofs.contains_key(&key) {
                    Some(State::Spent)
                } else {
                    match tables.pending_proofs.get(&key) {
                        Some(pending) if pending.expires_at >= now => Some(State::Pending),
                        _ => None,
                    }
                }
            })
            .collect())
    }

    async fn get_spent_proofs(&self, ys: &[PublicKey]) -> Result<Vec<Option<SpentProof>>, Error> {
        let tables = self.tables.read().await;

        Ok(ys
            .iter()
            .map(|y| tables.spent_proofs.get(&y.to_bytes()).cloned())
            .collect())
    }

    async fn get_pending_proofs_by_quote(
        &self,
        quote_id: &str,
    ) -> Result<Vec<PendingProof>, Error> {
        Ok(self
            .tables
            .read()
            .await
            .pending_proofs
            .values()
            .filter(|pending| pending.quote_id.as_deref() == Some(quote_id))
            .cloned()
            .collect())
    }

    async fn sweep_expired_pending(&self, now: u64) -> Result<u64, Error> {
        let mut tables = self.tables.write().await;

        let before = tables.pending_proofs.len();
        tables
            .pending_proofs
            .retain(|_, pending| pending.expires_at >= now);

        Ok((before - tables.pending_proofs.len()) as u64)
    }

    async fn add_mint_quote(&self, quote: MintQuote) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        if tables.mint_quotes.contains_key(&quote.id)
            || tables
                .mint_quotes_by_payment_hash
                .contains_key(&quote.payment_hash)
        {
            return Err(Error::DuplicateQuote);
        }

        tables
            .mint_quotes_by_payment_hash
            .insert(quote.payment_hash.clone(), quote.id.clone());
        tables.mint_quotes.insert(quote.id.clone(), quote);

        Ok(())
    }

    async fn get_mint_quote(&self, quote_id: &str) -> Result<Option<MintQuote>, Error> {
        Ok(self.tables.read().await.mint_quotes.get(quote_id).cloned())
    }

    async fn get_mint_quote_by_payment_hash(
        &self,
        payment_hash: &str,
    ) -> Result<Option<MintQuote>, Error> {
        let tables = self.tables.read().await;

        Ok(tables
            .mint_quotes_by_payment_hash
            .get(payment_hash)
            .and_then(|quote_id| tables.mint_quotes.get(quote_id))
            .cloned())
    }

    async fn get_mint_quotes(&self) -> Result<Vec<MintQuote>, Error> {
        Ok(self
            .tables
            .read()
            .await
            .mint_quotes
            .values()
            .cloned()
            .collect())
    }

    async fn update_mint_quote_state(
        &self,
        quote_id: &str,
        expected: MintQuoteState,
        new_state: MintQuoteState,
    ) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        let quote = tables
            .mint_quotes
            .get_mut(quote_id)
            .ok_or(Error::UnknownQuote)?;

        if quote.state != expected {
            return Err(Error::QuoteStateMismatch {
                expected: expected.to_string(),
                actual: quote.state.to_string(),
            });
        }

        quote.state = new_state;
        if new_state == MintQuoteState::Issued {
            quote.issued_at = Some(unix_time());
        }

        Ok(())
    }

    async fn remove_mint_quote(&self, quote_id: &str) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        if let Some(quote) = tables.mint_quotes.remove(quote_id) {
            tables
                .mint_quotes_by_payment_hash
                .remove(&quote.payment_hash);
        }

        Ok(())
    }

    async fn add_melt_quote(&self, quote: MeltQuote) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        if tables.melt_quotes.contains_key(&quote.id) {
            return Err(Error::DuplicateQuote);
        }

        tables.melt_quotes.insert(quote.id.clone(), quote);

        Ok(())
    }

    async fn get_melt_quote(&self, quote_id: &str) -> Result<Option<MeltQuote>, Error> {
        Ok(self.tables.read().await.melt_quotes.get(quote_id).cloned())
    }

    async fn get_melt_quotes(&self) -> Result<Vec<MeltQuote>, Error> {
        Ok(self
            .tables
            .read()
            .await
            .melt_quotes
            .values()
            .cloned()
            .collect())
    }

    async fn update_melt_quote_state(
        &self,
        quote_id: &str,
        expected: MeltQuoteState,
        new_state: MeltQuoteState,
    ) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        let quote = tables
            .melt_quotes
            .get_mut(quote_id)
            .ok_or(Error::UnknownQuote)?;

        if quote.state != expected {
            return Err(Error::QuoteStateMismatch {
                expected: expected.to_string(),
                actual: quote.state.to_string(),
            });
        }

        quote.state = new_state;

        Ok(())
    }

    async fn mark_melt_quote_paid(
        &self,
        quote_id: &str,
        payment_preimage: Option<String>,
        fee_paid: Option<Amount>,
    ) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        let quote = tables
            .melt_quotes
            .get_mut(quote_id)
            .ok_or(Error::UnknownQuote)?;

        if quote.state != MeltQuoteState::Pending {
            return Err(Error::QuoteStateMismatch {
                expected: MeltQuoteState::Pending.to_string(),
                actual: quote.state.to_string(),
            });
        }

        quote.state = MeltQuoteState::Paid;
        quote.payment_preimage = payment_preimage;
        quote.fee_paid = fee_paid;

        Ok(())
    }

    async fn remove_melt_quote(&self, quote_id: &str) -> Result<(), Error> {
        self.tables.write().await.melt_quotes.remove(quote_id);

        Ok(())
    }

    async fn add_blind_signatures(
        &self,
        records: Vec<BlindSignatureRecord>,
    ) -> Result<(), Error> {
        let mut tables = self.tables.write().await;

        if records
            .iter()
            .any(|record| {
                tables
                    .blind_signatures
                    .contains_key(&record.blinded_message.to_bytes())
            })
        {
            return Err(Error::AlreadySigned);
        }

        for record in records {
            tables
                .blind_signatures
                .insert(record.blinded_message.to_bytes(), record);
        }

        Ok(())
    }

    async fn get_blind_signatures(
        &self,
        blinded_messages: &[PublicKey],
    ) -> Result<Vec<Option<BlindSignatureRecord>>, Error> {
        let tables = self.tables.read().await;

        Ok(blinded_messages
            .iter()
            .map(|b| tables.blind_signatures.get(&b.to_bytes()).cloned())
            .collect())
    }
}
