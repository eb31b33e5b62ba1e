//! Mint quote management and issuance

use tracing::instrument;

use super::Mint;
use crate::lightning::InvoiceStatus;
use crate::nuts::{
    MintBolt11Request, MintBolt11Response, MintQuoteBolt11Request, MintQuoteBolt11Response,
    MintQuoteState,
};
use crate::types::MintQuote;
use crate::util::unix_time;
use crate::{Amount, Error};

impl Mint {
    fn check_mint_request_acceptable(&self, amount: Amount) -> Result<(), Error> {
        if self.mint_info().nuts.nut04.disabled {
            return Err(Error::MintingDisabled);
        }

        let limits = &self.config.limits;
        if amount < limits.mint_min || amount > limits.mint_max {
            return Err(Error::AmountOutofLimitRange(
                limits.mint_min,
                limits.mint_max,
                amount,
            ));
        }

        Ok(())
    }

    /// Create a mint quote
    ///
    /// `POST /v1/mint/quote/bolt11`
    #[instrument(skip_all)]
    pub async fn get_mint_bolt11_quote(
        &self,
        request: MintQuoteBolt11Request,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let MintQuoteBolt11Request {
            amount,
            unit,
            description,
        } = request;

        self.check_mint_request_acceptable(amount)?;

        let settings = self.ln.get_settings();
        if settings.unit != unit {
            tracing::info!("Mint quote requested for unsupported unit {unit}");
            return Err(Error::UnitUnsupported);
        }

        let quote_expiry = unix_time() + self.config.quote_ttl.mint_ttl;

        let invoice = self
            .ln
            .create_invoice(amount, description.unwrap_or_default(), quote_expiry)
            .await
            .map_err(|err| {
                tracing::error!("Could not create invoice: {err}");
                Error::from(err)
            })?;

        let quote = MintQuote::new(
            unit,
            amount,
            invoice.request,
            invoice.payment_hash,
            invoice.expiry.unwrap_or(quote_expiry),
        );

        tracing::debug!("New mint quote {} for {} {}", quote.id, amount, quote.unit);

        self.localstore.add_mint_quote(quote.clone()).await.map_err(
            |err| match err {
                crate::database::Error::DuplicateQuote => Error::RequestAlreadyPaid,
                err => err.into(),
            },
        )?;

        Ok(MintQuoteBolt11Response {
            quote: quote.id,
            request: quote.request,
            state: quote.state,
            expiry: Some(quote.expiry),
        })
    }

    /// Check the state of a mint quote, polling the backend while unpaid
    ///
    /// `GET /v1/mint/quote/bolt11/{id}`
    #[instrument(skip(self))]
    pub async fn check_mint_quote(
        &self,
        quote_id: &str,
    ) -> Result<MintQuoteBolt11Response, Error> {
        let quote = self
            .localstore
            .get_mint_quote(quote_id)
            .await?
            .ok_or(Error::UnknownQuote)?;

        let state = match quote.state {
            MintQuoteState::Unpaid => self.poll_unpaid_mint_quote(&quote).await?,
            state => state,
        };

        Ok(MintQuoteBolt11Response {
            quote: quote.id,
            request: quote.request,
            state,
            expiry: Some(quote.expiry),
        })
    }

    /// Poll the backend for an unpaid quote and transition on payment
    async fn poll_unpaid_mint_quote(&self, quote: &MintQuote) -> Result<MintQuoteState, Error> {
        match self.ln.get_invoice_status(&quote.payment_hash).await? {
            InvoiceStatus::Paid => {
                self.pay_mint_quote(&quote.id).await?;
                Ok(MintQuoteState::Paid)
            }
            InvoiceStatus::Expired => {
                Err(Error::ExpiredQuote(quote.expiry, unix_time()))
            }
            InvoiceStatus::Pending | InvoiceStatus::Cancelled => {
                let now = unix_time();
                if quote.expiry < now {
                    return Err(Error::ExpiredQuote(quote.expiry, now));
                }
                Ok(MintQuoteState::Unpaid)
            }
        }
    }

    /// Mark a mint quote paid
    ///
    /// Invoked from polling or from a backend payment notification; calling
    /// it twice is harmless.
    #[instrument(skip(self))]
    pub async fn pay_mint_quote(&self, quote_id: &str) -> Result<(), Error> {
        match self
            .localstore
            .update_mint_quote_state(quote_id, MintQuoteState::Unpaid, MintQuoteState::Paid)
            .await
        {
            Ok(()) => {
                tracing::debug!("Mint quote {quote_id} paid");
                Ok(())
            }
            // Already paid or issued; nothing regresses
            Err(crate::database::Error::QuoteStateMismatch { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Mark the quote of a paid invoice, looked up by payment hash
    #[instrument(skip_all)]
    pub async fn pay_mint_quote_for_payment_hash(
        &self,
        payment_hash: &str,
    ) -> Result<(), Error> {
        if let Some(quote) = self
            .localstore
            .get_mint_quote_by_payment_hash(payment_hash)
            .await?
        {
            self.pay_mint_quote(&quote.id).await?;
        }

        Ok(())
    }

    /// Issue ecash against a paid mint quote
    ///
    /// `POST /v1/mint/bolt11`. Outputs are signed before the
    /// `PAID -> ISSUED` transition commits, and the signatures are only
    /// persisted and returned when this call wins that transition; a
    /// signing failure leaves the quote `PAID` for a retry.
    #[instrument(skip_all)]
    pub async fn process_mint_request(
        &self,
        mint_request: MintBolt11Request,
    ) -> Result<MintBolt11Response, Error> {
        let quote = self
            .localstore
            .get_mint_quote(&mint_request.quote)
            .await?
            .ok_or(Error::UnknownQuote)?;

        let state = match quote.state {
            MintQuoteState::Unpaid => self.poll_unpaid_mint_quote(&quote).await?,
            state => state,
        };

        match state {
            MintQuoteState::Unpaid => return Err(Error::UnpaidQuote),
            MintQuoteState::Issued => return Err(Error::IssuedQuote),
            MintQuoteState::Paid => {}
        }

        if mint_request.outputs.is_empty() {
            return Err(Error::OutputsRequired);
        }

        Mint::check_outputs_unique(&mint_request.outputs)?;
        self.check_outputs_already_signed(&mint_request.outputs)
            .await?;

        let output_unit = self.verify_outputs_keyset(&mint_request.outputs).await?;
        if output_unit != quote.unit {
            return Err(Error::UnitUnsupported);
        }

        let output_amount = mint_request.total_amount()?;
        if output_amount != quote.amount {
            tracing::debug!(
                "Mint request for {} does not match quote amount {}",
                output_amount,
                quote.amount
            );
            return Err(Error::AmountMismatch);
        }

        let (signatures, records) = self.sign_outputs(&mint_request.outputs).await?;

        // Whoever wins this transition issues; a concurrent request ends
        // here with nothing persisted
        self.localstore
            .update_mint_quote_state(
                &mint_request.quote,
                MintQuoteState::Paid,
                MintQuoteState::Issued,
            )
            .await
            .map_err(|err| match err {
                crate::database::Error::QuoteStateMismatch { actual, .. }
                    if actual == MintQuoteState::Issued.to_string() =>
                {
                    Error::IssuedQuote
                }
                crate::database::Error::QuoteStateMismatch { .. } => Error::UnpaidQuote,
                err => err.into(),
            })?;

        self.localstore.add_blind_signatures(records).await?;

        tracing::debug!(
            "Issued {} for mint quote {}",
            output_amount,
            mint_request.quote
        );

        Ok(MintBolt11Response { signatures })
    }
}
