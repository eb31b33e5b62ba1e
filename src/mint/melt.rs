//! Melt quote management and payment orchestration

use std::time::Duration;

use tracing::instrument;

use super::Mint;
use crate::lightning::{PayInvoiceResponse, PaymentStatus};
use crate::nuts::{
    BlindSignature, BlindedMessage, MeltBolt11Request, MeltQuoteBolt11Request,
    MeltQuoteBolt11Response, MeltQuoteState, ProofsMethods, PublicKey,
};
use crate::types::{MeltQuote, PendingProof};
use crate::util::unix_time;
use crate::{lightning, Amount, Error};

impl Mint {
    fn check_melt_request_acceptable(&self, amount: Amount) -> Result<(), Error> {
        if self.mint_info().nuts.nut05.disabled {
            return Err(Error::MintingDisabled);
        }

        let limits = &self.config.limits;
        if amount < limits.melt_min || amount > limits.melt_max {
            return Err(Error::AmountOutofLimitRange(
                limits.melt_min,
                limits.melt_max,
                amount,
            ));
        }

        Ok(())
    }

    /// Create a melt quote
    ///
    /// `POST /v1/melt/quote/bolt11`. Under MPP the partial amount is taken
    /// from the request options after validation against the invoice.
    #[instrument(skip_all)]
    pub async fn get_melt_bolt11_quote(
        &self,
        melt_request: &MeltQuoteBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let MeltQuoteBolt11Request {
            request,
            unit,
            options,
        } = melt_request;

        let settings = self.ln.get_settings();
        if &settings.unit != unit {
            tracing::info!("Melt quote requested for unsupported unit {unit}");
            return Err(Error::UnitUnsupported);
        }

        let invoice_msat = request
            .amount_milli_satoshis()
            .ok_or(Error::AmountlessInvoiceNotSupported)?;

        let mpp_amount_msat = match options.and_then(|options| options.mpp) {
            Some(mpp) => {
                if !settings.mpp {
                    return Err(Error::UnitUnsupported);
                }

                let partial_msat: u64 = mpp.amount.into();
                if partial_msat == 0 || partial_msat > invoice_msat {
                    return Err(Error::AmountMismatch);
                }

                Some(partial_msat)
            }
            None => None,
        };

        let amount = Amount::from(mpp_amount_msat.unwrap_or(invoice_msat) / 1000);

        self.check_melt_request_acceptable(amount)?;

        let fee_reserve = self.config.fee_reserve.for_amount(amount);

        let quote = MeltQuote::new(
            unit.clone(),
            request.to_string(),
            request.payment_hash().to_string(),
            amount,
            fee_reserve,
            unix_time() + self.config.quote_ttl.melt_ttl,
            mpp_amount_msat,
        );

        tracing::debug!(
            "New melt quote {} for {} {} with fee reserve {}",
            quote.id,
            amount,
            unit,
            fee_reserve
        );

        self.localstore.add_melt_quote(quote.clone()).await?;

        Ok(melt_quote_response(&quote, None))
    }

    /// Check the state of a melt quote
    ///
    /// `GET /v1/melt/quote/bolt11/{id}`
    #[instrument(skip(self))]
    pub async fn check_melt_quote(
        &self,
        quote_id: &str,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let quote = self
            .localstore
            .get_melt_quote(quote_id)
            .await?
            .ok_or(Error::UnknownQuote)?;

        Ok(melt_quote_response(&quote, None))
    }

    /// Melt proofs against a quote by paying its invoice
    ///
    /// `POST /v1/melt/bolt11`. Once the quote is `PENDING` and the inputs
    /// are locked, the payment leg runs on its own task so a dropped
    /// request cannot abandon the state half way.
    #[instrument(skip_all)]
    pub async fn melt(
        &self,
        melt_request: &MeltBolt11Request,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let (quote, input_ys) = self.verify_melt_request(melt_request).await?;

        let mint = self.clone();
        let request = melt_request.clone();

        let handle =
            tokio::spawn(
                async move { mint.attempt_melt_payment(quote, request, input_ys).await },
            );

        handle.await.map_err(|err| {
            tracing::error!("Melt payment task failed: {err}");
            Error::Internal
        })?
    }

    /// Validate a melt request and take its locks
    ///
    /// On success the quote is `PENDING` and every input is locked in the
    /// pending namespace with the quote id and a lapse time. Any rejection
    /// reverts the quote to `UNPAID`.
    async fn verify_melt_request(
        &self,
        melt_request: &MeltBolt11Request,
    ) -> Result<(MeltQuote, Vec<PublicKey>), Error> {
        let quote = self
            .localstore
            .get_melt_quote(&melt_request.quote)
            .await?
            .ok_or(Error::UnknownQuote)?;

        let now = unix_time();
        if quote.expiry < now {
            return Err(Error::ExpiredQuote(quote.expiry, now));
        }

        self.localstore
            .update_melt_quote_state(
                &melt_request.quote,
                MeltQuoteState::Unpaid,
                MeltQuoteState::Pending,
            )
            .await
            .map_err(|err| match err {
                crate::database::Error::QuoteStateMismatch { actual, .. } => {
                    if actual == MeltQuoteState::Paid.to_string() {
                        Error::RequestAlreadyPaid
                    } else {
                        Error::PendingQuote
                    }
                }
                err => err.into(),
            })?;

        match self.lock_melt_inputs(&quote, melt_request).await {
            Ok(input_ys) => Ok((quote, input_ys)),
            Err(err) => {
                tracing::debug!("Melt request rejected: {err}");
                self.reset_melt_quote_unpaid(&quote.id).await;
                Err(err)
            }
        }
    }

    /// Validation half of [`Mint::verify_melt_request`], quote already pending
    async fn lock_melt_inputs(
        &self,
        quote: &MeltQuote,
        melt_request: &MeltBolt11Request,
    ) -> Result<Vec<PublicKey>, Error> {
        let inputs = &melt_request.inputs;

        if inputs.is_empty() {
            return Err(Error::InputsRequired);
        }

        let input_ys = inputs.ys()?;
        Mint::check_inputs_unique(&input_ys)?;

        let input_unit = self.verify_inputs_keyset(inputs).await?;
        if input_unit != quote.unit {
            return Err(Error::UnitMismatch);
        }

        let outputs = melt_request.outputs.clone().unwrap_or_default();
        if !outputs.is_empty() {
            Mint::check_outputs_unique(&outputs)?;
            self.check_outputs_already_signed(&outputs).await?;

            let output_unit = self.verify_outputs_keyset(&outputs).await?;
            if output_unit != quote.unit {
                return Err(Error::UnitMismatch);
            }
        }

        let input_fees = self.input_fee(inputs).await?;
        let inputs_amount = inputs.total_amount()?;

        let required = quote
            .amount
            .checked_add(quote.fee_reserve)
            .and_then(|sum| sum.checked_add(input_fees))
            .ok_or(Error::Amount(crate::amount::Error::AmountOverflow))?;

        if inputs_amount < required {
            tracing::info!(
                "Melt underfunded: inputs {}, amount {}, reserve {}, fees {}",
                inputs_amount,
                quote.amount,
                quote.fee_reserve,
                input_fees
            );
            return Err(Error::TransactionUnbalanced(
                inputs_amount.into(),
                quote.amount.into(),
                (quote.fee_reserve.checked_add(input_fees).unwrap_or_default()).into(),
            ));
        }

        self.verify_proofs(inputs, &input_ys).await?;

        // Blank outputs take part in the SIG_ALL aggregate
        self.verify_spending_conditions(inputs, &outputs).await?;

        let now = unix_time();
        let pending_rows: Vec<PendingProof> = inputs
            .iter()
            .zip(input_ys.iter())
            .map(|(proof, y)| PendingProof {
                y: *y,
                keyset_id: proof.keyset_id,
                amount: proof.amount,
                witness: proof.witness.clone(),
                quote_id: Some(quote.id.clone()),
                created_at: now,
                expires_at: now + self.config.quote_ttl.pending_ttl,
            })
            .collect();

        self.localstore.add_pending_proofs(pending_rows).await?;

        Ok(input_ys)
    }

    /// Pay the invoice and settle state from the result
    async fn attempt_melt_payment(
        &self,
        quote: MeltQuote,
        melt_request: MeltBolt11Request,
        input_ys: Vec<PublicKey>,
    ) -> Result<MeltQuoteBolt11Response, Error> {
        let timeout = Duration::from_secs(self.config.pay_invoice_timeout_secs);

        let attempt = tokio::time::timeout(
            timeout,
            self.ln.pay_invoice(
                quote.request.clone(),
                quote.mpp_amount_msat,
                Some(quote.fee_reserve),
                self.config.pay_invoice_timeout_secs,
            ),
        )
        .await;

        let pay = match attempt {
            // Backend did not conclude within the timeout; the payment may
            // still settle, so nothing is released yet
            Err(_elapsed) => {
                tracing::warn!("Lightning pay timed out for quote {}", quote.id);
                self.check_payment_status_once(&quote).await
            }
            Ok(Err(lightning::Error::InvoiceAlreadyPaid)) => {
                self.process_unpaid_melt(&quote.id, &input_ys).await?;
                return Err(Error::RequestAlreadyPaid);
            }
            Ok(Err(err)) => {
                tracing::error!("Error attempting to pay quote {}: {err}", quote.id);
                self.check_payment_status_once(&quote).await
            }
            Ok(Ok(pay)) => pay,
        };

        match pay.status {
            PaymentStatus::Succeeded => {
                let change = self
                    .finalize_melt_success(
                        &quote,
                        &input_ys,
                        melt_request.inputs.total_amount()?,
                        self.input_fee(&melt_request.inputs).await?,
                        melt_request.outputs.as_deref().unwrap_or_default(),
                        pay.payment_preimage.clone(),
                        pay.fee_paid,
                    )
                    .await?;

                let mut response = melt_quote_response(&quote, change);
                response.state = MeltQuoteState::Paid;
                response.payment_preimage = pay.payment_preimage;

                Ok(response)
            }
            PaymentStatus::Failed => {
                tracing::info!("Lightning payment for quote {} failed", quote.id);
                self.process_unpaid_melt(&quote.id, &input_ys).await?;
                Err(Error::PaymentFailed)
            }
            PaymentStatus::Pending => {
                tracing::warn!(
                    "Payment for quote {} still in flight, proofs stay locked",
                    quote.id
                );
                Err(Error::PendingQuote)
            }
        }
    }

    /// One status check when a pay attempt ended ambiguously
    ///
    /// When even the status cannot be read the proofs stay locked; the
    /// startup reconciler settles them later.
    async fn check_payment_status_once(&self, quote: &MeltQuote) -> PayInvoiceResponse {
        match self.ln.get_payment_status(&quote.payment_hash).await {
            Ok(status) => status,
            Err(err) => {
                tracing::error!(
                    "Could not check payment status for quote {}: {err}",
                    quote.id
                );
                PayInvoiceResponse {
                    status: PaymentStatus::Pending,
                    payment_preimage: None,
                    fee_paid: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Settle a confirmed payment: burn inputs, record payment, sign change
    ///
    /// The pending-to-spent promotion and the quote transition are the
    /// commit; a change-signing failure after that is logged severe and the
    /// spent rows stand.
    pub(crate) async fn finalize_melt_success(
        &self,
        quote: &MeltQuote,
        input_ys: &[PublicKey],
        inputs_amount: Amount,
        input_fees: Amount,
        outputs: &[BlindedMessage],
        payment_preimage: Option<String>,
        fee_paid: Option<Amount>,
    ) -> Result<Option<Vec<BlindSignature>>, Error> {
        self.localstore
            .promote_pending_to_spent(input_ys, unix_time())
            .await?;

        self.localstore
            .mark_melt_quote_paid(&quote.id, payment_preimage, fee_paid)
            .await?;

        let change = match self
            .sign_melt_change(quote, inputs_amount, input_fees, outputs, fee_paid)
            .await
        {
            Ok(change) => change,
            Err(err) => {
                // Inputs are burned and the invoice is paid; only the
                // change is lost
                tracing::error!(
                    "Could not sign change for paid melt quote {}: {err}",
                    quote.id
                );
                return Err(Error::Internal);
            }
        };

        Ok(change)
    }

    /// NUT-08: return overpaid fees as change on the provided blank outputs
    async fn sign_melt_change(
        &self,
        quote: &MeltQuote,
        inputs_amount: Amount,
        input_fees: Amount,
        outputs: &[BlindedMessage],
        fee_paid: Option<Amount>,
    ) -> Result<Option<Vec<BlindSignature>>, Error> {
        let spent = quote
            .amount
            .checked_add(fee_paid.unwrap_or_default())
            .and_then(|sum| sum.checked_add(input_fees))
            .ok_or(Error::Amount(crate::amount::Error::AmountOverflow))?;

        let overpaid = inputs_amount.checked_sub(spent).unwrap_or_default();

        if overpaid == Amount::ZERO || outputs.is_empty() {
            return Ok(None);
        }

        let mut amounts = overpaid.split();

        if outputs.len() < amounts.len() {
            tracing::debug!(
                "Change requires {} outputs but only {} were provided",
                amounts.len(),
                outputs.len()
            );

            // Return the most change the provided outputs can carry; the
            // remainder is burnt
            amounts.sort_by(|a, b| b.cmp(a));
            amounts.truncate(outputs.len());
            amounts.reverse();
        }

        let active_keyset_id = self
            .active_keyset_id(&quote.unit)
            .await
            .ok_or(Error::KeysetInactive)?;

        let change_outputs: Vec<BlindedMessage> = amounts
            .iter()
            .zip(outputs.iter())
            .map(|(amount, output)| BlindedMessage {
                amount: *amount,
                keyset_id: active_keyset_id,
                blinded_secret: output.blinded_secret,
                witness: output.witness.clone(),
            })
            .collect();

        let (signatures, records) = self.sign_outputs(&change_outputs).await?;
        self.localstore.add_blind_signatures(records).await?;

        Ok(Some(signatures))
    }

    /// Release a failed melt: unlock inputs, quote back to `UNPAID`
    pub(crate) async fn process_unpaid_melt(
        &self,
        quote_id: &str,
        input_ys: &[PublicKey],
    ) -> Result<(), Error> {
        self.localstore.remove_pending_proofs(input_ys).await?;
        self.reset_melt_quote_unpaid(quote_id).await;

        Ok(())
    }

    async fn reset_melt_quote_unpaid(&self, quote_id: &str) {
        if let Err(err) = self
            .localstore
            .update_melt_quote_state(quote_id, MeltQuoteState::Pending, MeltQuoteState::Unpaid)
            .await
        {
            tracing::error!("Could not reset melt quote {quote_id} state: {err}");
        }
    }
}

fn melt_quote_response(
    quote: &MeltQuote,
    change: Option<Vec<BlindSignature>>,
) -> MeltQuoteBolt11Response {
    MeltQuoteBolt11Response {
        quote: quote.id.clone(),
        amount: quote.amount,
        fee_reserve: quote.fee_reserve,
        state: quote.state,
        expiry: quote.expiry,
        payment_preimage: quote.payment_preimage.clone(),
        change,
    }
}
