//! Cashu Mint
//!
//! Ties the keyset manager, blind signer, proof store, quote machines and
//! Lightning backend together into the swap/mint/melt orchestrators.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::database::MintDatabase;
use crate::dhke::sign_message;
use crate::lightning::MintLightning;
use crate::nuts::{
    BlindSignature, BlindedMessage, CurrencyUnit, Id, KeySetInfo, MintInfo, MintKeySet, SecretKey,
};
use crate::types::{BlindSignatureRecord, FeeReserve, MintLimits, QuoteTTL};
use crate::{Amount, Error};

mod check_spendable;
mod conditions;
mod keysets;
mod melt;
mod mint_nut04;
mod proofs;
mod restore;
mod start_up_check;
mod swap;
mod verification;

/// Operating parameters injected at startup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MintConfig {
    /// Amount limits for quotes
    pub limits: MintLimits,
    /// Quote and pending lock lifetimes
    pub quote_ttl: QuoteTTL,
    /// Fee reserve estimation for melt quotes
    pub fee_reserve: FeeReserve,
    /// Upper bound on a single Lightning pay attempt, seconds
    pub pay_invoice_timeout_secs: u64,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            limits: MintLimits::default(),
            quote_ttl: QuoteTTL::default(),
            fee_reserve: FeeReserve::default(),
            pay_invoice_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct KeysetCache {
    pub(crate) keysets: HashMap<Id, (MintKeySet, KeySetInfo)>,
    pub(crate) active: HashMap<CurrencyUnit, Id>,
}

/// Cashu Mint
///
/// The process hosts exactly one of these; the store and Lightning handles
/// are injected, never reached through globals.
#[derive(Clone)]
pub struct Mint {
    mint_info: MintInfo,
    pub(crate) localstore: Arc<dyn MintDatabase>,
    pub(crate) ln: Arc<dyn MintLightning>,
    /// Authoritative for reads; writes go through store and cache together
    pub(crate) keysets: Arc<RwLock<KeysetCache>>,
    pub(crate) config: MintConfig,
}

impl Mint {
    /// Create new [`Mint`]
    ///
    /// Loads all persisted keysets into the cache.
    pub async fn new(
        mint_info: MintInfo,
        localstore: Arc<dyn MintDatabase>,
        ln: Arc<dyn MintLightning>,
        config: MintConfig,
    ) -> Result<Self, Error> {
        let mut cache = KeysetCache::default();

        for (keyset, info) in localstore.get_keysets().await? {
            if info.active {
                cache.active.insert(info.unit.clone(), keyset.id);
            }
            cache.keysets.insert(keyset.id, (keyset, info));
        }

        tracing::info!(
            "Mint starting with {} keysets, {} active",
            cache.keysets.len(),
            cache.active.len()
        );

        Ok(Self {
            mint_info,
            localstore,
            ln,
            keysets: Arc::new(RwLock::new(cache)),
            config,
        })
    }

    /// Mint info document
    pub fn mint_info(&self) -> &MintInfo {
        &self.mint_info
    }

    /// Sign a single blinded message
    ///
    /// The keyset must be active; a DLEQ proof is attached.
    #[instrument(skip_all)]
    pub async fn blind_sign(
        &self,
        blinded_message: &BlindedMessage,
    ) -> Result<BlindSignature, Error> {
        let BlindedMessage {
            amount,
            keyset_id,
            blinded_secret,
            ..
        } = blinded_message;

        let (key, active) = {
            let cache = self.keysets.read().await;
            let (keyset, info) = cache
                .keysets
                .get(keyset_id)
                .ok_or(Error::KeysetUnknown(*keyset_id))?;

            let pair = keyset
                .keys
                .get(amount)
                .ok_or(Error::AmountNotSupported(*amount, *keyset_id))?;

            (pair.secret_key.clone(), info.active)
        };

        if !active {
            return Err(Error::KeysetInactive);
        }

        let c = sign_message(&key, blinded_secret)?;

        let dleq = crate::nuts::nut12::calculate_dleq(c, blinded_secret, &key)?;

        Ok(BlindSignature {
            amount: *amount,
            keyset_id: *keyset_id,
            c,
            dleq: Some(dleq),
        })
    }

    /// Sign a batch of blinded messages, order preserving
    ///
    /// Returns the signatures with the records to append to the restore
    /// index; persisting the records is the caller's commit point.
    pub(crate) async fn sign_outputs(
        &self,
        outputs: &[BlindedMessage],
    ) -> Result<(Vec<BlindSignature>, Vec<BlindSignatureRecord>), Error> {
        let mut signatures = Vec::with_capacity(outputs.len());
        let mut records = Vec::with_capacity(outputs.len());

        for blinded_message in outputs {
            let signature = self.blind_sign(blinded_message).await?;

            records.push(BlindSignatureRecord {
                blinded_message: blinded_message.blinded_secret,
                keyset_id: signature.keyset_id,
                amount: signature.amount,
                c: signature.c,
                dleq: signature.dleq.clone(),
            });
            signatures.push(signature);
        }

        Ok((signatures, records))
    }

    /// Private key for a denomination of a keyset
    pub(crate) async fn get_private_key(
        &self,
        keyset_id: &Id,
        amount: Amount,
    ) -> Result<SecretKey, Error> {
        let cache = self.keysets.read().await;

        let (keyset, _) = cache
            .keysets
            .get(keyset_id)
            .ok_or(Error::KeysetUnknown(*keyset_id))?;

        Ok(keyset
            .keys
            .get(&amount)
            .ok_or(Error::AmountNotSupported(amount, *keyset_id))?
            .secret_key
            .clone())
    }
}
