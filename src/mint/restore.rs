//! NUT-09 restore

use tracing::instrument;

use super::Mint;
use crate::nuts::{BlindSignature, RestoreRequest, RestoreResponse};
use crate::Error;

impl Mint {
    /// Return previously issued signatures for known blinded messages
    ///
    /// `POST /v1/restore`. Only the outputs the restore index knows come
    /// back, in request order, with their original signatures.
    #[instrument(skip_all)]
    pub async fn restore(&self, request: RestoreRequest) -> Result<RestoreResponse, Error> {
        let blinded: Vec<_> = request
            .outputs
            .iter()
            .map(|output| output.blinded_secret)
            .collect();

        let records = self.localstore.get_blind_signatures(&blinded).await?;

        let mut outputs = Vec::new();
        let mut signatures = Vec::new();

        for (output, record) in request.outputs.into_iter().zip(records) {
            if let Some(record) = record {
                outputs.push(output);
                signatures.push(BlindSignature {
                    amount: record.amount,
                    keyset_id: record.keyset_id,
                    c: record.c,
                    dleq: record.dleq,
                });
            }
        }

        Ok(RestoreResponse {
            outputs,
            signatures,
        })
    }
}
