//! NUT-03: Swap tokens
//!
//! <https://github.com/cashubtc/nuts/blob/main/03.md>

use serde::{Deserialize, Serialize};

use super::nut00::{BlindSignature, BlindedMessage, Proofs};
use crate::Amount;

/// Swap request [NUT-03]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    /// Proofs being spent
    pub inputs: Proofs,
    /// Blinded messages to sign
    pub outputs: Vec<BlindedMessage>,
}

impl SwapRequest {
    /// Create new [`SwapRequest`]
    pub fn new(inputs: Proofs, outputs: Vec<BlindedMessage>) -> Self {
        Self { inputs, outputs }
    }

    /// Total [`Amount`] of inputs
    pub fn input_amount(&self) -> Result<Amount, crate::amount::Error> {
        Amount::try_sum(self.inputs.iter().map(|proof| proof.amount))
    }

    /// Total [`Amount`] of outputs
    pub fn output_amount(&self) -> Result<Amount, crate::amount::Error> {
        Amount::try_sum(self.outputs.iter().map(|output| output.amount))
    }
}

/// Swap response [NUT-03]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResponse {
    /// Blind signatures on the requested outputs
    pub signatures: Vec<BlindSignature>,
}

impl SwapResponse {
    /// Create new [`SwapResponse`]
    pub fn new(signatures: Vec<BlindSignature>) -> Self {
        Self { signatures }
    }
}
