//! Proof validation

use tracing::instrument;

use super::Mint;
use crate::dhke::verify_message;
use crate::nuts::nut07::State;
use crate::nuts::{Proof, PublicKey};
use crate::Error;

impl Mint {
    /// Verify the BDHKE signature on a single proof
    ///
    /// Resolves the keyset (inactive keysets still validate), locates the
    /// denomination key and checks `k * hash_to_curve(secret) == C`.
    #[instrument(skip_all)]
    pub async fn verify_proof(&self, proof: &Proof) -> Result<(), Error> {
        let key = self
            .get_private_key(&proof.keyset_id, proof.amount)
            .await?;

        verify_message(&key, proof.c, proof.secret.as_bytes())
            .map_err(|_| Error::InvalidSignature)?;

        Ok(())
    }

    /// Reject any `Y` that is spent or locked pending
    ///
    /// A pending lock reads as already spent towards the wallet. This is a
    /// pre-check only; the storage unique constraint is the authority.
    pub(crate) async fn check_ys_spendable(&self, ys: &[PublicKey]) -> Result<(), Error> {
        let states = self.localstore.get_proofs_states(ys).await?;

        if states
            .iter()
            .any(|state| matches!(state, Some(State::Spent) | Some(State::Pending)))
        {
            return Err(Error::TokenAlreadySpent);
        }

        Ok(())
    }

    /// Verify a batch of proofs: signature per proof, no spent or pending `Y`
    pub(crate) async fn verify_proofs(&self, proofs: &[Proof], ys: &[PublicKey]) -> Result<(), Error> {
        self.check_ys_spendable(ys).await?;

        for proof in proofs {
            self.verify_proof(proof).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::database::MintMemoryDatabase;
    use crate::dhke::{blind_message, sign_message, unblind_message};
    use crate::mint::MintConfig;
    use crate::nuts::{CurrencyUnit, MintInfo};
    use crate::secret::Secret;
    use crate::Amount;

    #[tokio::test]
    async fn test_verify_proof() {
        let mint = Mint::new(
            MintInfo::default(),
            Arc::new(MintMemoryDatabase::new()),
            Arc::new(crate::lightning::tests::NullLightning),
            MintConfig::default(),
        )
        .await
        .unwrap();

        let info = mint
            .generate_keyset(CurrencyUnit::Sat, 0, 5)
            .await
            .unwrap();

        let keyset = mint.localstore.get_keyset(&info.id).await.unwrap().unwrap();
        let pair = keyset.keys.get(&Amount::from(4)).unwrap();

        let secret = Secret::generate();
        let (blinded, r) = blind_message(secret.as_bytes(), None).unwrap();
        let c_blinded = sign_message(&pair.secret_key, &blinded).unwrap();
        let c = unblind_message(&c_blinded, &r, &pair.public_key).unwrap();

        let proof = Proof::new(Amount::from(4), info.id, secret.clone(), c);
        assert!(mint.verify_proof(&proof).await.is_ok());

        // Signature from another denomination key does not verify
        let wrong = Proof::new(Amount::from(8), info.id, secret.clone(), c);
        assert!(matches!(
            mint.verify_proof(&wrong).await.unwrap_err(),
            Error::InvalidSignature
        ));

        // Unknown denomination
        let unsupported = Proof::new(Amount::from(3), info.id, secret, c);
        assert!(matches!(
            mint.verify_proof(&unsupported).await.unwrap_err(),
            Error::AmountNotSupported(_, _)
        ));
    }
}
