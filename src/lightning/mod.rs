//! Lightning backend
//!
//! Abstract capability the mint requires of its Lightning node. The mint
//! holds only payment hashes and preimages as opaque handles; invoices and
//! payments are owned by the backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::nuts::CurrencyUnit;
use crate::Amount;

/// Lightning Error
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invoice already paid
    #[error("Invoice already paid")]
    InvoiceAlreadyPaid,
    /// Invoice amount unknown
    #[error("Invoice amount unknown")]
    InvoiceAmountUnknown,
    /// Payment state is unknown
    #[error("Payment state is unknown")]
    UnknownPaymentState,
    /// Unsupported unit
    #[error("Unsupported unit")]
    UnsupportedUnit,
    /// Backend failure
    #[error("Lightning error: {0}")]
    Lightning(Box<dyn std::error::Error + Send + Sync>),
}

/// Status of an invoice issued by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    /// Invoice has not been paid yet
    Pending,
    /// Invoice has been paid
    Paid,
    /// Invoice is expired
    Expired,
    /// Invoice was cancelled
    Cancelled,
}

/// Status of an outgoing payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// Payment settled
    Succeeded,
    /// Payment definitively failed
    Failed,
    /// Payment still in flight
    Pending,
}

/// Create invoice response
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CreateInvoiceResponse {
    /// Bolt11 payment request
    pub request: String,
    /// Payment hash used to look the invoice up later
    pub payment_hash: String,
    /// Unix expiry of the invoice
    pub expiry: Option<u64>,
}

/// Pay invoice response
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayInvoiceResponse {
    /// Status of the payment
    pub status: PaymentStatus,
    /// Payment preimage on success
    pub payment_preimage: Option<String>,
    /// Lightning fee paid, in sat
    pub fee_paid: Option<Amount>,
    /// Backend error detail on failure
    pub error: Option<String>,
}

/// Backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base unit of the backend
    pub unit: CurrencyUnit,
    /// Whether multi-path payments are supported [NUT-15]
    pub mpp: bool,
    /// Whether invoice descriptions are supported
    pub invoice_description: bool,
}

/// Lightning backend of the mint
#[async_trait]
pub trait MintLightning: Send + Sync {
    /// Backend settings
    fn get_settings(&self) -> Settings;

    /// Whether the backend is ready to serve
    async fn is_ready(&self) -> Result<bool, Error>;

    /// Node public key, hex encoded
    async fn get_node_pubkey(&self) -> Result<String, Error>;

    /// Spendable balance of the node, in sat
    async fn get_balance(&self) -> Result<Amount, Error>;

    /// Create a new invoice
    async fn create_invoice(
        &self,
        amount: Amount,
        description: String,
        unix_expiry: u64,
    ) -> Result<CreateInvoiceResponse, Error>;

    /// Status of an incoming invoice
    async fn get_invoice_status(&self, payment_hash: &str) -> Result<InvoiceStatus, Error>;

    /// Pay a bolt11 invoice
    ///
    /// `partial_amount_msat` carries the MPP partial amount [NUT-15].
    /// The backend must give up and report [`PaymentStatus::Pending`] no
    /// later than `timeout_secs` after the call.
    async fn pay_invoice(
        &self,
        bolt11: String,
        partial_amount_msat: Option<u64>,
        max_fee: Option<Amount>,
        timeout_secs: u64,
    ) -> Result<PayInvoiceResponse, Error>;

    /// Status of an outgoing payment
    async fn get_payment_status(&self, payment_hash: &str)
        -> Result<PayInvoiceResponse, Error>;
}
