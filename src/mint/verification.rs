//! Transaction shape checks
//!
//! Uniqueness, unit and balance validation shared by the orchestrators.

use std::collections::{HashMap, HashSet};

use super::Mint;
use crate::fees::calculate_fee;
use crate::nuts::{
    BlindedMessage, CurrencyUnit, Id, Proofs, ProofsMethods, PublicKey,
};
use crate::{Amount, Error};

impl Mint {
    /// Inputs must be unique by `Y`
    pub(crate) fn check_inputs_unique(ys: &[PublicKey]) -> Result<(), Error> {
        if ys.iter().collect::<HashSet<_>>().len() != ys.len() {
            return Err(Error::DuplicateInputs);
        }

        Ok(())
    }

    /// Outputs must be unique by `B_`
    pub(crate) fn check_outputs_unique(outputs: &[BlindedMessage]) -> Result<(), Error> {
        let count = outputs.len();

        if outputs
            .iter()
            .map(|output| &output.blinded_secret)
            .collect::<HashSet<_>>()
            .len()
            != count
        {
            return Err(Error::DuplicateOutputs);
        }

        Ok(())
    }

    /// Single unit across all input keysets
    pub(crate) async fn verify_inputs_keyset(&self, inputs: &Proofs) -> Result<CurrencyUnit, Error> {
        let keyset_ids: HashSet<Id> = inputs.iter().map(|proof| proof.keyset_id).collect();

        let mut units = HashSet::new();

        {
            let cache = self.keysets.read().await;
            for id in &keyset_ids {
                let (_, info) = cache.keysets.get(id).ok_or(Error::KeysetUnknown(*id))?;
                units.insert(info.unit.clone());
            }
        }

        if units.len() != 1 {
            tracing::debug!("Inputs span multiple units: {units:?}");
            return Err(Error::MultipleUnits);
        }

        Ok(units.into_iter().next().expect("Length checked above"))
    }

    /// Outputs must be on active keysets of a single unit
    pub(crate) async fn verify_outputs_keyset(
        &self,
        outputs: &[BlindedMessage],
    ) -> Result<CurrencyUnit, Error> {
        let keyset_ids: HashSet<Id> = outputs.iter().map(|output| output.keyset_id).collect();

        let mut units = HashSet::new();

        {
            let cache = self.keysets.read().await;
            for id in &keyset_ids {
                let (_, info) = cache.keysets.get(id).ok_or(Error::KeysetUnknown(*id))?;

                if !info.active {
                    return Err(Error::KeysetInactive);
                }

                units.insert(info.unit.clone());
            }
        }

        if units.len() != 1 {
            tracing::debug!("Outputs span multiple units: {units:?}");
            return Err(Error::MultipleUnits);
        }

        Ok(units.into_iter().next().expect("Length checked above"))
    }

    /// Reject outputs the restore index has already signed
    pub(crate) async fn check_outputs_already_signed(
        &self,
        outputs: &[BlindedMessage],
    ) -> Result<(), Error> {
        let blinded: Vec<PublicKey> = outputs.iter().map(|o| o.blinded_secret).collect();

        if self
            .localstore
            .get_blind_signatures(&blinded)
            .await?
            .iter()
            .any(Option::is_some)
        {
            tracing::info!("Output has already been signed");
            return Err(Error::BlindedMessageAlreadySigned);
        }

        Ok(())
    }

    /// NUT-02 input fee for a proof set
    pub(crate) async fn input_fee(&self, inputs: &Proofs) -> Result<Amount, Error> {
        let proofs_count = inputs.count_by_keyset();

        let fee_ppk: HashMap<Id, u64> = {
            let cache = self.keysets.read().await;
            proofs_count
                .keys()
                .map(|id| {
                    cache
                        .keysets
                        .get(id)
                        .map(|(_, info)| (*id, info.input_fee_ppk))
                        .ok_or(Error::KeysetUnknown(*id))
                })
                .collect::<Result<_, _>>()?
        };

        calculate_fee(&proofs_count, &fee_ppk)
    }

    /// Full swap shape check: uniqueness, units, active outputs, balance
    ///
    /// `sum(inputs) - fee == sum(outputs)` must hold exactly.
    pub(crate) async fn verify_transaction_balanced(
        &self,
        inputs: &Proofs,
        input_ys: &[PublicKey],
        outputs: &[BlindedMessage],
    ) -> Result<(), Error> {
        Mint::check_inputs_unique(input_ys)?;
        Mint::check_outputs_unique(outputs)?;
        self.check_outputs_already_signed(outputs).await?;

        let input_unit = self.verify_inputs_keyset(inputs).await?;
        let output_unit = self.verify_outputs_keyset(outputs).await?;

        if input_unit != output_unit {
            return Err(Error::UnitMismatch);
        }

        let input_amount = inputs.total_amount()?;
        let output_amount = Amount::try_sum(outputs.iter().map(|o| o.amount))?;

        let fee = self.input_fee(inputs).await?;

        if input_amount.checked_sub(fee) != Some(output_amount) {
            tracing::debug!(
                "Unbalanced swap: inputs {input_amount}, outputs {output_amount}, fee {fee}"
            );
            return Err(Error::TransactionUnbalanced(
                input_amount.into(),
                output_amount.into(),
                fee.into(),
            ));
        }

        Ok(())
    }
}
