//! Keyset management

use tracing::instrument;

use super::Mint;
use crate::nuts::nut02::DEFAULT_MAX_ORDER;
use crate::nuts::{
    CurrencyUnit, Id, KeySet, KeySetInfo, KeysResponse, KeysetResponse, MintKeySet,
};
use crate::Error;

impl Mint {
    /// Generate a keyset and record it as active for its unit
    ///
    /// The previously active keyset of the unit, if any, is deactivated in
    /// the same store transaction. Historical keysets still validate.
    #[instrument(skip(self))]
    pub async fn generate_keyset(
        &self,
        unit: CurrencyUnit,
        input_fee_ppk: u64,
        max_order: u8,
    ) -> Result<KeySetInfo, Error> {
        let keyset = MintKeySet::generate(unit.clone(), max_order);

        let info = KeySetInfo {
            id: keyset.id,
            unit: unit.clone(),
            active: true,
            input_fee_ppk,
        };

        // Writes hold the cache lock across the store write so readers
        // never observe a keyset the store does not have
        let mut cache = self.keysets.write().await;

        self.localstore
            .add_keyset(keyset.clone(), info.clone())
            .await?;

        if let Some(previous) = cache.active.insert(unit, keyset.id) {
            if let Some((_, prev_info)) = cache.keysets.get_mut(&previous) {
                prev_info.active = false;
            }
        }
        cache.keysets.insert(keyset.id, (keyset, info.clone()));

        tracing::info!("Generated keyset {} for {}", info.id, info.unit);

        Ok(info)
    }

    /// Ensure an active keyset exists for `unit`
    pub async fn ensure_active_keyset(
        &self,
        unit: CurrencyUnit,
        input_fee_ppk: u64,
    ) -> Result<KeySetInfo, Error> {
        {
            let cache = self.keysets.read().await;
            if let Some(id) = cache.active.get(&unit) {
                if let Some((_, info)) = cache.keysets.get(id) {
                    return Ok(info.clone());
                }
            }
        }

        self.generate_keyset(unit, input_fee_ppk, DEFAULT_MAX_ORDER)
            .await
    }

    /// Rotate the active keyset of a unit
    ///
    /// Generates a replacement and deactivates the previous one. Keysets
    /// are never deleted.
    #[instrument(skip(self))]
    pub async fn rotate_keyset(
        &self,
        unit: CurrencyUnit,
        input_fee_ppk: u64,
        max_order: u8,
    ) -> Result<KeySetInfo, Error> {
        self.generate_keyset(unit, input_fee_ppk, max_order).await
    }

    /// Deactivate a keyset
    ///
    /// Signing under it fails afterwards; validation remains permitted.
    #[instrument(skip(self))]
    pub async fn deactivate_keyset(&self, id: &Id) -> Result<(), Error> {
        let mut cache = self.keysets.write().await;

        self.localstore.set_keyset_active(id, false).await?;

        let unit = match cache.keysets.get_mut(id) {
            Some((_, info)) => {
                info.active = false;
                info.unit.clone()
            }
            None => return Err(Error::KeysetUnknown(*id)),
        };

        if cache.active.get(&unit) == Some(id) {
            cache.active.remove(&unit);
        }

        Ok(())
    }

    /// Active keyset id for a unit
    pub async fn active_keyset_id(&self, unit: &CurrencyUnit) -> Option<Id> {
        self.keysets.read().await.active.get(unit).copied()
    }

    /// Keyset summary from the cache
    pub async fn keyset_info(&self, id: &Id) -> Option<KeySetInfo> {
        self.keysets
            .read()
            .await
            .keysets
            .get(id)
            .map(|(_, info)| info.clone())
    }

    /// Public keys of every active keyset
    ///
    /// `GET /v1/keys`
    #[instrument(skip_all)]
    pub async fn pubkeys(&self) -> KeysResponse {
        let cache = self.keysets.read().await;

        let keysets = cache
            .active
            .values()
            .filter_map(|id| cache.keysets.get(id))
            .map(|(keyset, _)| KeySet::from(keyset.clone()))
            .collect();

        KeysResponse { keysets }
    }

    /// Public keys of a specific keyset, active or not
    ///
    /// `GET /v1/keys/{id}`
    #[instrument(skip(self))]
    pub async fn keyset_pubkeys(&self, id: &Id) -> Result<KeysResponse, Error> {
        let cache = self.keysets.read().await;

        let (keyset, _) = cache
            .keysets
            .get(id)
            .ok_or(Error::KeysetUnknown(*id))?;

        Ok(KeysResponse {
            keysets: vec![KeySet::from(keyset.clone())],
        })
    }

    /// Summaries of every keyset
    ///
    /// `GET /v1/keysets`
    #[instrument(skip_all)]
    pub async fn keysets(&self) -> KeysetResponse {
        let keysets = self
            .keysets
            .read()
            .await
            .keysets
            .values()
            .map(|(_, info)| info.clone())
            .collect();

        KeysetResponse { keysets }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::database::MintMemoryDatabase;
    use crate::mint::MintConfig;
    use crate::nuts::MintInfo;

    async fn test_mint() -> Mint {
        let localstore = Arc::new(MintMemoryDatabase::new());
        let ln = Arc::new(crate::lightning::tests::NullLightning);

        Mint::new(MintInfo::default(), localstore, ln, MintConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_generate_and_rotate() {
        let mint = test_mint().await;

        let first = mint
            .generate_keyset(CurrencyUnit::Sat, 0, 5)
            .await
            .unwrap();
        assert!(first.active);
        assert_eq!(
            mint.active_keyset_id(&CurrencyUnit::Sat).await,
            Some(first.id)
        );

        let second = mint.rotate_keyset(CurrencyUnit::Sat, 100, 5).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(
            mint.active_keyset_id(&CurrencyUnit::Sat).await,
            Some(second.id)
        );

        // The rotated-out keyset remains known but inactive
        let first_info = mint.keyset_info(&first.id).await.unwrap();
        assert!(!first_info.active);

        assert_eq!(mint.keysets().await.keysets.len(), 2);
        assert_eq!(mint.pubkeys().await.keysets.len(), 1);
    }

    #[tokio::test]
    async fn test_deactivate_blocks_signing() {
        let mint = test_mint().await;

        let info = mint
            .generate_keyset(CurrencyUnit::Sat, 0, 5)
            .await
            .unwrap();

        let keyset = mint.localstore.get_keyset(&info.id).await.unwrap().unwrap();
        let pair = keyset.keys.get(&crate::Amount::from(1)).unwrap();

        let (blinded, _r) =
            crate::dhke::blind_message(crate::secret::Secret::generate().as_bytes(), None)
                .unwrap();
        let message =
            crate::nuts::BlindedMessage::new(crate::Amount::from(1), info.id, blinded);

        assert!(mint.blind_sign(&message).await.is_ok());

        mint.deactivate_keyset(&info.id).await.unwrap();

        assert!(matches!(
            mint.blind_sign(&message).await.unwrap_err(),
            Error::KeysetInactive
        ));

        // Validation of existing signatures still works
        let c = crate::dhke::sign_message(&pair.secret_key, &blinded).unwrap();
        let _ = c;
    }

    #[tokio::test]
    async fn test_keysets_survive_restart() {
        let localstore = Arc::new(MintMemoryDatabase::new());
        let ln = Arc::new(crate::lightning::tests::NullLightning);

        let mint = Mint::new(
            MintInfo::default(),
            localstore.clone(),
            ln.clone(),
            MintConfig::default(),
        )
        .await
        .unwrap();

        let info = mint
            .generate_keyset(CurrencyUnit::Sat, 0, 5)
            .await
            .unwrap();

        // A new mint over the same store sees the same active keyset
        let restarted = Mint::new(MintInfo::default(), localstore, ln, MintConfig::default())
            .await
            .unwrap();

        assert_eq!(
            restarted.active_keyset_id(&CurrencyUnit::Sat).await,
            Some(info.id)
        );
    }
}
