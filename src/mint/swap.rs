//! Swap processing

use tracing::instrument;

use super::Mint;
use crate::nuts::{ProofsMethods, SwapRequest, SwapResponse};
use crate::types::SpentProof;
use crate::util::unix_time;
use crate::Error;

impl Mint {
    /// Process a swap request
    ///
    /// Validates shape, balance, proofs and spending conditions, then marks
    /// the inputs spent and signs the outputs. The spent marking is the
    /// point of no return: a failure after it leaves the rows standing and
    /// the wallet recovers its signatures through restore.
    #[instrument(skip_all)]
    pub async fn process_swap_request(
        &self,
        swap_request: SwapRequest,
    ) -> Result<SwapResponse, Error> {
        if swap_request.inputs.is_empty() {
            return Err(Error::InputsRequired);
        }
        if swap_request.outputs.is_empty() {
            return Err(Error::OutputsRequired);
        }

        let input_ys = swap_request.inputs.ys()?;

        if let Err(err) = self
            .verify_transaction_balanced(&swap_request.inputs, &input_ys, &swap_request.outputs)
            .await
        {
            tracing::debug!("Attempt to swap unbalanced transaction, aborting: {err}");
            return Err(err);
        }

        self.verify_proofs(&swap_request.inputs, &input_ys).await?;

        self.verify_spending_conditions(&swap_request.inputs, &swap_request.outputs)
            .await?;

        let spent_at = unix_time();
        let spent_rows: Vec<SpentProof> = swap_request
            .inputs
            .iter()
            .zip(input_ys.iter())
            .map(|(proof, y)| SpentProof {
                y: *y,
                keyset_id: proof.keyset_id,
                amount: proof.amount,
                witness: proof.witness.clone(),
                spent_at,
            })
            .collect();

        // Sole authority on double spends; a duplicate y rolls the whole
        // batch back and surfaces as already spent
        self.localstore.add_spent_proofs(spent_rows).await?;

        let (signatures, records) = match self.sign_outputs(&swap_request.outputs).await {
            Ok(signed) => signed,
            Err(err) => {
                // Inputs are burned and stay burned; the client restores
                tracing::error!("Signing failed after inputs were marked spent: {err}");
                return Err(Error::Internal);
            }
        };

        self.localstore.add_blind_signatures(records).await?;

        Ok(SwapResponse::new(signatures))
    }
}
