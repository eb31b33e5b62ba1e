//! # Cashu Mint
//!
//! Core of a Cashu mint: keyset management and BDHKE blind signing, the
//! spent/pending proof store backing double-spend defense, mint and melt
//! quote state machines, and the swap/mint/melt orchestrators that tie
//! ecash issuance and redemption to a Lightning backend.
//!
//! HTTP transport, configuration loading and the concrete Lightning node
//! are collaborators of this crate, not part of it. The persistence engine
//! is abstracted behind [`database::MintDatabase`]; the Lightning node
//! behind [`lightning::MintLightning`].

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod amount;
pub mod database;
pub mod dhke;
pub mod error;
pub mod fees;
pub mod lightning;
pub mod mint;
pub mod nuts;
pub mod secret;
pub mod types;
pub mod util;

pub use amount::Amount;
pub use bitcoin::hashes::sha256::Hash as Sha256;
pub use error::{Error, ErrorCode, ErrorResponse};
pub use lightning_invoice::Bolt11Invoice;
pub use mint::Mint;
pub use util::SECP256K1;
