//! Spending condition enforcement
//!
//! Dispatches per-input P2PK and HTLC checks and implements the SIG_ALL
//! aggregate, whose signatures commit to every input secret and every
//! output `B_` of the transaction.

use std::str::FromStr;

use tracing::instrument;

use super::Mint;
use crate::nuts::nut11::{decode_signatures, valid_signatures, Conditions};
use crate::nuts::{
    BlindedMessage, Kind, Nut10Secret, Proof, Proofs, PublicKey, SigFlag,
};
use crate::Error;

/// Parsed view of a conditioned input
struct ParsedInput<'a> {
    proof: &'a Proof,
    secret: Option<Nut10Secret>,
    conditions: Option<Conditions>,
}

fn parse_input(proof: &Proof) -> ParsedInput<'_> {
    let secret = Nut10Secret::try_from(&proof.secret).ok();

    let conditions = secret.as_ref().and_then(|secret| {
        secret
            .secret_data
            .tags
            .clone()
            .unwrap_or_default()
            .try_into()
            .ok()
    });

    ParsedInput {
        proof,
        secret,
        conditions,
    }
}

impl Mint {
    /// Enforce spending conditions over a transaction
    ///
    /// `outputs` is the output set the SIG_ALL aggregate commits to; for a
    /// melt these are the blank change outputs.
    #[instrument(skip_all)]
    pub(crate) async fn verify_spending_conditions(
        &self,
        inputs: &Proofs,
        outputs: &[BlindedMessage],
    ) -> Result<(), Error> {
        let parsed: Vec<ParsedInput> = inputs.iter().map(parse_input).collect();

        let sig_all = parsed.iter().any(|input| {
            input
                .conditions
                .as_ref()
                .map(|conditions| conditions.sig_flag == SigFlag::SigAll)
                .unwrap_or(false)
        });

        if sig_all {
            return verify_sig_all(&parsed, outputs);
        }

        for input in &parsed {
            match input.secret.as_ref().map(|secret| secret.kind) {
                Some(Kind::P2PK) => input.proof.verify_p2pk()?,
                Some(Kind::HTLC) => input.proof.verify_htlc()?,
                // Plain secret, no conditions to enforce
                None => {}
            }
        }

        Ok(())
    }
}

/// Verify the SIG_ALL aggregate
///
/// Every input must be a SIG_ALL P2PK secret locked to the same key with
/// the same `n_sigs`. The signed message is the concatenation of all input
/// secrets followed by all output `B_`s; the first input's witness bears
/// the signatures.
fn verify_sig_all(inputs: &[ParsedInput], outputs: &[BlindedMessage]) -> Result<(), Error> {
    let first = inputs.first().ok_or(Error::InputsRequired)?;

    let (first_secret, first_conditions) = match (&first.secret, &first.conditions) {
        (Some(secret), Some(conditions)) => (secret, conditions),
        _ => return Err(Error::WitnessMissingOrInvalid),
    };

    let required_sigs = first_conditions.num_sigs.unwrap_or(1);

    for input in inputs {
        let (secret, conditions) = match (&input.secret, &input.conditions) {
            (Some(secret), Some(conditions)) => (secret, conditions),
            _ => return Err(Error::WitnessMissingOrInvalid),
        };

        if secret.kind != Kind::P2PK
            || conditions.sig_flag != SigFlag::SigAll
            || secret.secret_data.data != first_secret.secret_data.data
            || conditions.num_sigs.unwrap_or(1) != required_sigs
        {
            tracing::info!("SIG_ALL transaction with mismatched inputs");
            return Err(Error::WitnessMissingOrInvalid);
        }
    }

    // secret_0 || .. || secret_m-1 || B_0 || .. || B_n-1
    let mut message = String::new();
    for input in inputs {
        message.push_str(&input.proof.secret.to_string());
    }
    for output in outputs {
        message.push_str(&output.blinded_secret.to_hex());
    }

    let mut pubkeys = first_conditions.pubkeys.clone().unwrap_or_default();
    pubkeys.push(
        PublicKey::from_str(&first_secret.secret_data.data)
            .map_err(|_| Error::WitnessMissingOrInvalid)?,
    );

    let signatures = first
        .proof
        .witness
        .as_ref()
        .and_then(|witness| witness.signatures())
        .ok_or(Error::WitnessMissingOrInvalid)?;
    let signatures = decode_signatures(&signatures).map_err(|_| Error::WitnessMissingOrInvalid)?;

    let valid = valid_signatures(message.as_bytes(), &pubkeys, &signatures)
        .map_err(|_| Error::WitnessMissingOrInvalid)?;

    if valid >= required_sigs {
        Ok(())
    } else {
        tracing::info!("SIG_ALL aggregate carried {valid} of {required_sigs} signatures");
        Err(Error::WitnessMissingOrInvalid)
    }
}
