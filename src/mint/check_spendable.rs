//! Proof state lookup

use tracing::instrument;

use super::Mint;
use crate::nuts::nut07::State;
use crate::nuts::{CheckStateRequest, CheckStateResponse, ProofState};
use crate::Error;

impl Mint {
    /// State of a batch of `Y`s, in request order
    ///
    /// `POST /v1/checkstate`. Spent proofs carry the witness they were
    /// spent with.
    #[instrument(skip_all)]
    pub async fn check_state(
        &self,
        check_state: &CheckStateRequest,
    ) -> Result<CheckStateResponse, Error> {
        let states = self.localstore.get_proofs_states(&check_state.ys).await?;

        let spent_rows = self.localstore.get_spent_proofs(&check_state.ys).await?;

        let states = check_state
            .ys
            .iter()
            .zip(states.into_iter().zip(spent_rows))
            .map(|(y, (state, spent))| {
                let witness = match state {
                    Some(State::Spent) => spent
                        .and_then(|row| row.witness)
                        .and_then(|witness| serde_json::to_string(&witness).ok()),
                    _ => None,
                };

                ProofState {
                    y: *y,
                    state: state.unwrap_or(State::Unspent),
                    witness,
                }
            })
            .collect();

        Ok(CheckStateResponse { states })
    }
}
