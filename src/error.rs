//! Errors
//!
//! Crate error taxonomy and the NUT-00 wire error response.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::nuts::Id;
use crate::util::hex;
use crate::Amount;

/// Mint Error
#[derive(Debug, Error)]
pub enum Error {
    // Cryptographic
    /// BDHKE verification of a proof failed
    #[error("Invalid signature on proof")]
    InvalidSignature,
    /// Blinded message was signed before
    #[error("Blinded message is already signed")]
    BlindedMessageAlreadySigned,

    // Double spend
    /// Token is already spent or locked to an in-flight melt
    #[error("Token already spent")]
    TokenAlreadySpent,

    // Balance
    /// Transaction is not balanced
    #[error("Inputs: `{0}`, Outputs: `{1}`, Expected Fee: `{2}`")]
    TransactionUnbalanced(u64, u64, u64),
    /// Output sum does not equal the quote amount
    #[error("Output amount does not match quote amount")]
    AmountMismatch,
    /// Amount is outside the allowed range
    #[error("Amount must be between `{0}` and `{1}`, got `{2}`")]
    AmountOutofLimitRange(Amount, Amount, Amount),

    // Structural
    /// Duplicate inputs in request
    #[error("Duplicate inputs")]
    DuplicateInputs,
    /// Duplicate outputs in request
    #[error("Duplicate outputs")]
    DuplicateOutputs,
    /// Inputs or outputs of multiple units
    #[error("Cannot have multiple units")]
    MultipleUnits,
    /// Input unit does not match output unit
    #[error("Input unit must match output")]
    UnitMismatch,
    /// Invoice carries no amount
    #[error("Amountless invoices are not supported")]
    AmountlessInvoiceNotSupported,
    /// Unit is not supported
    #[error("Unit is not supported")]
    UnitUnsupported,
    /// Inputs required
    #[error("Inputs required")]
    InputsRequired,
    /// Outputs required
    #[error("Outputs required")]
    OutputsRequired,
    /// Witness missing or invalid
    #[error("Witness missing or invalid")]
    WitnessMissingOrInvalid,

    // Keyset
    /// Keyset is not known
    #[error("Unknown keyset: `{0}`")]
    KeysetUnknown(Id),
    /// Keyset is inactive, cannot sign
    #[error("Inactive keyset")]
    KeysetInactive,
    /// Mint does not have a key for the denomination
    #[error("No key for amount `{0}` in keyset `{1}`")]
    AmountNotSupported(Amount, Id),
    /// Key generation failed
    #[error("Key generation failed")]
    KeyGenFailed,

    // Quote
    /// Quote is not known
    #[error("Unknown quote")]
    UnknownQuote,
    /// Quote is not paid
    #[error("Quote not paid")]
    UnpaidQuote,
    /// Ecash already issued for quote
    #[error("Quote already issued")]
    IssuedQuote,
    /// Minting is disabled
    #[error("Minting is disabled")]
    MintingDisabled,
    /// Lightning payment failed
    #[error("Lightning payment failed")]
    PaymentFailed,
    /// Quote has an in-flight payment
    #[error("Quote pending")]
    PendingQuote,
    /// Invoice is already paid
    #[error("Invoice already paid")]
    RequestAlreadyPaid,
    /// Quote is expired
    #[error("Expired quote: expired at `{0}`, time `{1}`")]
    ExpiredQuote(u64, u64),

    // Internal
    /// Internal Error
    #[error("Internal error")]
    Internal,

    // External conversions
    /// Amount Error
    #[error(transparent)]
    Amount(#[from] crate::amount::Error),
    /// Secret error
    #[error(transparent)]
    Secret(#[from] crate::secret::Error),
    /// DHKE Error
    #[error(transparent)]
    DHKE(#[from] crate::dhke::Error),
    /// NUT00 Error
    #[error(transparent)]
    NUT00(#[from] crate::nuts::nut00::Error),
    /// NUT01 Error
    #[error(transparent)]
    NUT01(#[from] crate::nuts::nut01::Error),
    /// NUT02 Error
    #[error(transparent)]
    NUT02(#[from] crate::nuts::nut02::Error),
    /// NUT04 Error
    #[error(transparent)]
    NUT04(#[from] crate::nuts::nut04::Error),
    /// NUT05 Error
    #[error(transparent)]
    NUT05(#[from] crate::nuts::nut05::Error),
    /// NUT11 Error
    #[error(transparent)]
    NUT11(#[from] crate::nuts::nut11::Error),
    /// NUT12 Error
    #[error(transparent)]
    NUT12(#[from] crate::nuts::nut12::Error),
    /// NUT14 Error
    #[error(transparent)]
    NUT14(#[from] crate::nuts::nut14::Error),
    /// Hex Error
    #[error(transparent)]
    Hex(#[from] hex::Error),
    /// Database Error
    #[error(transparent)]
    Database(crate::database::Error),
    /// Lightning Error
    #[error(transparent)]
    Lightning(crate::lightning::Error),
}

impl From<crate::database::Error> for Error {
    fn from(err: crate::database::Error) -> Self {
        match err {
            crate::database::Error::Duplicate { .. } => Self::TokenAlreadySpent,
            crate::database::Error::AlreadySigned => Self::BlindedMessageAlreadySigned,
            err => Self::Database(err),
        }
    }
}

impl From<crate::lightning::Error> for Error {
    fn from(err: crate::lightning::Error) -> Self {
        match err {
            crate::lightning::Error::InvoiceAlreadyPaid => Self::RequestAlreadyPaid,
            err => Self::Lightning(err),
        }
    }
}

/// Error response [NUT-00]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable description
    #[serde(default)]
    pub detail: String,
    /// Error Code
    pub code: ErrorCode,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code: {}, detail: {}", self.code, self.detail)
    }
}

impl ErrorResponse {
    /// Create new [`ErrorResponse`]
    pub fn new(code: ErrorCode, detail: String) -> Self {
        Self { detail, code }
    }
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> ErrorResponse {
        let code = match &err {
            Error::InvalidSignature
            | Error::DHKE(_)
            | Error::NUT11(_)
            | Error::NUT12(_)
            | Error::NUT14(_)
            | Error::WitnessMissingOrInvalid => ErrorCode::TokenNotVerified,
            Error::BlindedMessageAlreadySigned => ErrorCode::BlindedMessageAlreadySigned,
            Error::TokenAlreadySpent => ErrorCode::TokenAlreadySpent,
            Error::TransactionUnbalanced(_, _, _) => ErrorCode::TransactionUnbalanced,
            Error::AmountMismatch => ErrorCode::AmountMismatch,
            Error::AmountOutofLimitRange(_, _, _) => ErrorCode::AmountOutofLimitRange,
            Error::DuplicateInputs | Error::InputsRequired => ErrorCode::DuplicateInputs,
            Error::DuplicateOutputs | Error::OutputsRequired => ErrorCode::DuplicateOutputs,
            Error::MultipleUnits => ErrorCode::MultipleUnits,
            Error::UnitMismatch => ErrorCode::UnitMismatch,
            Error::AmountlessInvoiceNotSupported => ErrorCode::AmountlessInvoiceNotSupported,
            Error::UnitUnsupported => ErrorCode::UnitUnsupported,
            Error::KeysetUnknown(_) | Error::AmountNotSupported(_, _) => ErrorCode::KeysetNotFound,
            Error::KeysetInactive => ErrorCode::KeysetInactive,
            Error::UnpaidQuote => ErrorCode::QuoteNotPaid,
            Error::IssuedQuote => ErrorCode::TokensAlreadyIssued,
            Error::MintingDisabled => ErrorCode::MintingDisabled,
            Error::PaymentFailed => ErrorCode::LightningError,
            Error::PendingQuote => ErrorCode::QuotePending,
            Error::RequestAlreadyPaid => ErrorCode::InvoiceAlreadyPaid,
            Error::ExpiredQuote(_, _) => ErrorCode::QuoteExpired,
            // Internal details are never leaked to the wire
            Error::Internal
            | Error::Database(_)
            | Error::Lightning(_)
            | Error::KeyGenFailed => {
                return ErrorResponse {
                    detail: "Internal error".to_string(),
                    code: ErrorCode::Internal,
                }
            }
            _ => ErrorCode::Internal,
        };

        ErrorResponse {
            detail: err.to_string(),
            code,
        }
    }
}

/// Possible error codes [NUT-00]
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ErrorCode {
    /// Proof verification failed (10003)
    TokenNotVerified,
    /// Blinded message already signed (10002)
    BlindedMessageAlreadySigned,
    /// Proofs already spent or pending (11001)
    TokenAlreadySpent,
    /// Transaction is not balanced (11002)
    TransactionUnbalanced,
    /// Unit in request is not supported (11005)
    UnitUnsupported,
    /// Amount outside of limit range (11006)
    AmountOutofLimitRange,
    /// Duplicate inputs provided (11007)
    DuplicateInputs,
    /// Duplicate outputs provided (11008)
    DuplicateOutputs,
    /// Inputs or outputs of multiple units (11009)
    MultipleUnits,
    /// Inputs and outputs not of same unit (11010)
    UnitMismatch,
    /// Amountless invoice is not supported (11011)
    AmountlessInvoiceNotSupported,
    /// Amount in request does not equal the quote (11012)
    AmountMismatch,
    /// Keyset is not known (12001)
    KeysetNotFound,
    /// Keyset is inactive, cannot sign messages (12002)
    KeysetInactive,
    /// Quote request is not paid (20001)
    QuoteNotPaid,
    /// Tokens have already been issued for quote (20002)
    TokensAlreadyIssued,
    /// Minting is disabled (20003)
    MintingDisabled,
    /// Lightning payment failed (20004)
    LightningError,
    /// Quote is pending (20005)
    QuotePending,
    /// Invoice already paid (20006)
    InvoiceAlreadyPaid,
    /// Quote is expired (20007)
    QuoteExpired,
    /// Internal error, details withheld (0)
    Internal,
    /// Unknown error code
    Unknown(u16),
}

impl ErrorCode {
    /// Error code from u16
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::Internal,
            10002 => Self::BlindedMessageAlreadySigned,
            10003 => Self::TokenNotVerified,
            11001 => Self::TokenAlreadySpent,
            11002 => Self::TransactionUnbalanced,
            11005 => Self::UnitUnsupported,
            11006 => Self::AmountOutofLimitRange,
            11007 => Self::DuplicateInputs,
            11008 => Self::DuplicateOutputs,
            11009 => Self::MultipleUnits,
            11010 => Self::UnitMismatch,
            11011 => Self::AmountlessInvoiceNotSupported,
            11012 => Self::AmountMismatch,
            12001 => Self::KeysetNotFound,
            12002 => Self::KeysetInactive,
            20001 => Self::QuoteNotPaid,
            20002 => Self::TokensAlreadyIssued,
            20003 => Self::MintingDisabled,
            20004 => Self::LightningError,
            20005 => Self::QuotePending,
            20006 => Self::InvoiceAlreadyPaid,
            20007 => Self::QuoteExpired,
            _ => Self::Unknown(code),
        }
    }

    /// Error code to u16
    pub fn to_code(&self) -> u16 {
        match self {
            Self::Internal => 0,
            Self::BlindedMessageAlreadySigned => 10002,
            Self::TokenNotVerified => 10003,
            Self::TokenAlreadySpent => 11001,
            Self::TransactionUnbalanced => 11002,
            Self::UnitUnsupported => 11005,
            Self::AmountOutofLimitRange => 11006,
            Self::DuplicateInputs => 11007,
            Self::DuplicateOutputs => 11008,
            Self::MultipleUnits => 11009,
            Self::UnitMismatch => 11010,
            Self::AmountlessInvoiceNotSupported => 11011,
            Self::AmountMismatch => 11012,
            Self::KeysetNotFound => 12001,
            Self::KeysetInactive => 12002,
            Self::QuoteNotPaid => 20001,
            Self::TokensAlreadyIssued => 20002,
            Self::MintingDisabled => 20003,
            Self::LightningError => 20004,
            Self::QuotePending => 20005,
            Self::InvoiceAlreadyPaid => 20006,
            Self::QuoteExpired => 20007,
            Self::Unknown(code) => *code,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(self.to_code())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = u16::deserialize(deserializer)?;

        Ok(ErrorCode::from_code(code))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_round_trip() {
        for code in [
            10002, 10003, 11001, 11002, 11005, 11006, 11007, 11008, 11009, 11010, 11011, 11012,
            12001, 12002, 20001, 20002, 20003, 20004, 20005, 20006, 20007,
        ] {
            assert_eq!(ErrorCode::from_code(code).to_code(), code);
        }
    }

    #[test]
    fn test_error_response_wire_shape() {
        let response: ErrorResponse = Error::TokenAlreadySpent.into();
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"detail":"Token already spent","code":11001}"#);
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let response: ErrorResponse = Error::Internal.into();
        assert_eq!(response.code.to_code(), 0);
        assert_eq!(response.detail, "Internal error");

        let response: ErrorResponse =
            Error::Database(crate::database::Error::Internal("secret detail".to_string()))
                .into();
        assert_eq!(response.code.to_code(), 0);
        assert!(!response.detail.contains("secret"));
    }

    #[test]
    fn test_quote_codes() {
        assert_eq!(
            ErrorResponse::from(Error::UnpaidQuote).code.to_code(),
            20001
        );
        assert_eq!(
            ErrorResponse::from(Error::IssuedQuote).code.to_code(),
            20002
        );
        assert_eq!(
            ErrorResponse::from(Error::PaymentFailed).code.to_code(),
            20004
        );
        assert_eq!(
            ErrorResponse::from(Error::PendingQuote).code.to_code(),
            20005
        );
        assert_eq!(
            ErrorResponse::from(Error::ExpiredQuote(0, 1)).code.to_code(),
            20007
        );
    }
}
