//! Notation Usage Terms (NUTs)
//!
//! One module per implemented NUT.

pub mod nut00;
pub mod nut01;
pub mod nut02;
pub mod nut03;
pub mod nut04;
pub mod nut05;
pub mod nut06;
pub mod nut07;
pub mod nut09;
pub mod nut10;
pub mod nut11;
pub mod nut12;
pub mod nut14;

pub use nut00::{
    BlindSignature, BlindedMessage, CurrencyUnit, PaymentMethod, Proof, Proofs, ProofsMethods,
    Witness,
};
pub use nut01::{Keys, KeysResponse, MintKeyPair, MintKeys, PublicKey, SecretKey};
pub use nut02::{Id, KeySet, KeySetInfo, KeySetVersion, KeysetResponse, MintKeySet};
pub use nut03::{SwapRequest, SwapResponse};
pub use nut04::{
    MintBolt11Request, MintBolt11Response, MintQuoteBolt11Request, MintQuoteBolt11Response,
    QuoteState as MintQuoteState,
};
pub use nut05::{
    MeltBolt11Request, MeltOptions, MeltQuoteBolt11Request, MeltQuoteBolt11Response, Mpp,
    QuoteState as MeltQuoteState,
};
pub use nut06::{MintInfo, MintVersion, Nuts, SupportedSettings};
pub use nut07::{CheckStateRequest, CheckStateResponse, ProofState, State};
pub use nut09::{RestoreRequest, RestoreResponse};
pub use nut10::{Kind, Secret as Nut10Secret, SecretData};
pub use nut11::{Conditions, P2PKWitness, SigFlag};
pub use nut12::BlindSignatureDleq;
pub use nut14::HTLCWitness;
