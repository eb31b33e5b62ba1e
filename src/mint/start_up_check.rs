//! Crash recovery and sweepers
//!
//! A melt can die between taking its locks and settling the payment. On
//! restart every stale `PENDING` melt quote is reconciled against the
//! backend with the same dispatch the live path uses.

use tracing::instrument;

use super::Mint;
use crate::lightning::PaymentStatus;
use crate::nuts::{MeltQuoteState, MintQuoteState, PublicKey};
use crate::util::unix_time;
use crate::Error;

impl Mint {
    /// Reconcile melt quotes left `PENDING` past their lock lifetime
    #[instrument(skip_all)]
    pub async fn check_pending_melt_quotes(&self) -> Result<(), Error> {
        let pending_quotes: Vec<_> = self
            .localstore
            .get_melt_quotes()
            .await?
            .into_iter()
            .filter(|quote| quote.state == MeltQuoteState::Pending)
            .collect();

        if pending_quotes.is_empty() {
            return Ok(());
        }

        tracing::info!("Checking {} pending melt quotes", pending_quotes.len());
        let now = unix_time();

        for quote in pending_quotes {
            let locks = self
                .localstore
                .get_pending_proofs_by_quote(&quote.id)
                .await?;

            // A live lock means the payment leg may still be running in
            // this or another process; leave it alone
            if locks.iter().any(|lock| lock.expires_at >= now) {
                continue;
            }

            let input_ys: Vec<PublicKey> = locks.iter().map(|lock| lock.y).collect();

            let status = match self.ln.get_payment_status(&quote.payment_hash).await {
                Ok(status) => status,
                Err(err) => {
                    tracing::error!(
                        "Could not check payment status for stale quote {}: {err}",
                        quote.id
                    );
                    continue;
                }
            };

            match status.status {
                PaymentStatus::Succeeded => {
                    tracing::info!("Stale melt quote {} settled as paid", quote.id);

                    // Blank outputs are gone with the original request, so
                    // no change can be returned here
                    self.localstore
                        .promote_pending_to_spent(&input_ys, unix_time())
                        .await?;
                    self.localstore
                        .mark_melt_quote_paid(
                            &quote.id,
                            status.payment_preimage,
                            status.fee_paid,
                        )
                        .await?;
                }
                PaymentStatus::Failed => {
                    tracing::info!("Stale melt quote {} settled as failed", quote.id);
                    self.process_unpaid_melt(&quote.id, &input_ys).await?;
                }
                PaymentStatus::Pending => {
                    tracing::warn!("Melt quote {} still pending on the backend", quote.id);
                }
            }
        }

        Ok(())
    }

    /// Delete expired unpaid quotes
    ///
    /// Scheduling the interval is the host's concern.
    #[instrument(skip_all)]
    pub async fn sweep_expired_quotes(&self) -> Result<u64, Error> {
        let now = unix_time();
        let mut removed = 0;

        for quote in self.localstore.get_mint_quotes().await? {
            if quote.state == MintQuoteState::Unpaid && quote.expiry < now {
                self.localstore.remove_mint_quote(&quote.id).await?;
                removed += 1;
            }
        }

        for quote in self.localstore.get_melt_quotes().await? {
            if quote.state == MeltQuoteState::Unpaid && quote.expiry < now {
                self.localstore.remove_melt_quote(&quote.id).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!("Swept {removed} expired quotes");
        }

        Ok(removed)
    }

    /// Delete lapsed pending proof locks
    #[instrument(skip_all)]
    pub async fn sweep_expired_pending_proofs(&self) -> Result<u64, Error> {
        Ok(self.localstore.sweep_expired_pending(unix_time()).await?)
    }
}
