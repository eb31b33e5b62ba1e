//! Shared test fixtures
//!
//! A Lightning backend with scriptable outcomes and the wallet-side
//! blinding helpers the scenarios need.

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::rand::{self, RngCore};
use bitcoin::secp256k1::Secp256k1;
use cashu_mint::database::MintMemoryDatabase;
use cashu_mint::dhke::{blind_message, unblind_message};
use cashu_mint::lightning::{
    CreateInvoiceResponse, Error as LightningError, InvoiceStatus, MintLightning,
    PayInvoiceResponse, PaymentStatus, Settings,
};
use cashu_mint::mint::{Mint, MintConfig};
use cashu_mint::nuts::{
    BlindedMessage, CurrencyUnit, Id, Keys, MintInfo, Proof, Proofs, SecretKey,
};
use cashu_mint::secret::Secret;
use cashu_mint::util::hex;
use cashu_mint::{Amount, Bolt11Invoice};
use lightning_invoice::{Currency, InvoiceBuilder, PaymentSecret};

/// Outcome the fake backend reports for pay attempts
#[derive(Debug, Clone, Copy)]
pub enum PayOutcome {
    /// Settle immediately, charging this routing fee in sat
    Succeed { fee: u64 },
    /// Fail definitively
    Fail,
    /// Stay in flight
    Pending,
}

/// Scriptable Lightning backend
pub struct FakeLightning {
    mpp: bool,
    invoices: Mutex<HashMap<String, InvoiceStatus>>,
    payments: Mutex<HashMap<String, PayInvoiceResponse>>,
    pay_outcome: Mutex<PayOutcome>,
}

impl FakeLightning {
    pub fn new() -> Self {
        Self {
            mpp: true,
            invoices: Mutex::new(HashMap::new()),
            payments: Mutex::new(HashMap::new()),
            pay_outcome: Mutex::new(PayOutcome::Succeed { fee: 0 }),
        }
    }

    /// Script the outcome of the next pay attempts
    pub fn set_pay_outcome(&self, outcome: PayOutcome) {
        *self.pay_outcome.lock().unwrap() = outcome;
    }

    /// Mark an invoice this backend issued as paid
    pub fn mark_invoice_paid(&self, payment_hash: &str) {
        self.invoices
            .lock()
            .unwrap()
            .insert(payment_hash.to_string(), InvoiceStatus::Paid);
    }

    /// Settle an in-flight outgoing payment after the fact
    pub fn settle_payment(&self, payment_hash: &str, fee: u64) {
        self.payments.lock().unwrap().insert(
            payment_hash.to_string(),
            PayInvoiceResponse {
                status: PaymentStatus::Succeeded,
                payment_preimage: Some("00".repeat(32)),
                fee_paid: Some(Amount::from(fee)),
                error: None,
            },
        );
    }

    /// Fail an in-flight outgoing payment after the fact
    pub fn fail_payment(&self, payment_hash: &str) {
        self.payments.lock().unwrap().insert(
            payment_hash.to_string(),
            PayInvoiceResponse {
                status: PaymentStatus::Failed,
                payment_preimage: None,
                fee_paid: None,
                error: Some("no route".to_string()),
            },
        );
    }
}

#[async_trait]
impl MintLightning for FakeLightning {
    fn get_settings(&self) -> Settings {
        Settings {
            unit: CurrencyUnit::Sat,
            mpp: self.mpp,
            invoice_description: true,
        }
    }

    async fn is_ready(&self) -> Result<bool, LightningError> {
        Ok(true)
    }

    async fn get_node_pubkey(&self) -> Result<String, LightningError> {
        Ok(node_key().public_key(&Secp256k1::new()).to_string())
    }

    async fn get_balance(&self) -> Result<Amount, LightningError> {
        Ok(Amount::from(21_000_000))
    }

    async fn create_invoice(
        &self,
        amount: Amount,
        description: String,
        unix_expiry: u64,
    ) -> Result<CreateInvoiceResponse, LightningError> {
        let invoice = build_invoice(u64::from(amount) * 1000, description);
        let payment_hash = invoice.payment_hash().to_string();

        self.invoices
            .lock()
            .unwrap()
            .insert(payment_hash.clone(), InvoiceStatus::Pending);

        Ok(CreateInvoiceResponse {
            request: invoice.to_string(),
            payment_hash,
            expiry: Some(unix_expiry),
        })
    }

    async fn get_invoice_status(
        &self,
        payment_hash: &str,
    ) -> Result<InvoiceStatus, LightningError> {
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .get(payment_hash)
            .copied()
            .unwrap_or(InvoiceStatus::Cancelled))
    }

    async fn pay_invoice(
        &self,
        bolt11: String,
        _partial_amount_msat: Option<u64>,
        _max_fee: Option<Amount>,
        _timeout_secs: u64,
    ) -> Result<PayInvoiceResponse, LightningError> {
        let invoice = Bolt11Invoice::from_str(&bolt11)
            .map_err(|err| LightningError::Lightning(Box::new(err)))?;
        let payment_hash = invoice.payment_hash().to_string();

        let response = match *self.pay_outcome.lock().unwrap() {
            PayOutcome::Succeed { fee } => PayInvoiceResponse {
                status: PaymentStatus::Succeeded,
                payment_preimage: Some("00".repeat(32)),
                fee_paid: Some(Amount::from(fee)),
                error: None,
            },
            PayOutcome::Fail => PayInvoiceResponse {
                status: PaymentStatus::Failed,
                payment_preimage: None,
                fee_paid: None,
                error: Some("no route".to_string()),
            },
            PayOutcome::Pending => PayInvoiceResponse {
                status: PaymentStatus::Pending,
                payment_preimage: None,
                fee_paid: None,
                error: None,
            },
        };

        self.payments
            .lock()
            .unwrap()
            .insert(payment_hash, response.clone());

        Ok(response)
    }

    async fn get_payment_status(
        &self,
        payment_hash: &str,
    ) -> Result<PayInvoiceResponse, LightningError> {
        Ok(self
            .payments
            .lock()
            .unwrap()
            .get(payment_hash)
            .cloned()
            .unwrap_or(PayInvoiceResponse {
                status: PaymentStatus::Pending,
                payment_preimage: None,
                fee_paid: None,
                error: None,
            }))
    }
}

fn node_key() -> bitcoin::secp256k1::SecretKey {
    bitcoin::secp256k1::SecretKey::from_slice(&[0x42; 32]).expect("static test key")
}

/// Build a signed bolt11 invoice with a random payment hash
pub fn build_invoice(amount_msat: u64, description: String) -> Bolt11Invoice {
    let mut preimage = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut preimage);
    let payment_hash = sha256::Hash::hash(&preimage);

    InvoiceBuilder::new(Currency::Bitcoin)
        .description(description)
        .payment_hash(payment_hash)
        .payment_secret(PaymentSecret([42u8; 32]))
        .amount_milli_satoshis(amount_msat)
        .current_timestamp()
        .min_final_cltv_expiry_delta(144)
        .expiry_time(Duration::from_secs(3600))
        .build_signed(|hash| Secp256k1::new().sign_ecdsa_recoverable(hash, &node_key()))
        .expect("valid invoice")
}

/// Wallet-side state of one requested output
pub struct PreMint {
    pub secret: Secret,
    pub r: SecretKey,
    pub blinded_message: BlindedMessage,
}

/// Blind a fresh random secret for `amount`
pub fn premint(amount: u64, keyset_id: Id) -> PreMint {
    let secret = Secret::generate();
    let (blinded, r) = blind_message(secret.as_bytes(), None).expect("blinding");

    PreMint {
        secret,
        r,
        blinded_message: BlindedMessage::new(Amount::from(amount), keyset_id, blinded),
    }
}

/// Blind each amount into an output
pub fn premints(amounts: &[u64], keyset_id: Id) -> Vec<PreMint> {
    amounts.iter().map(|a| premint(*a, keyset_id)).collect()
}

pub fn blinded_messages(premints: &[PreMint]) -> Vec<BlindedMessage> {
    premints.iter().map(|p| p.blinded_message.clone()).collect()
}

/// Unblind returned signatures into spendable proofs
pub fn construct_proofs(
    signatures: &[cashu_mint::nuts::BlindSignature],
    premints: &[PreMint],
    keys: &Keys,
) -> Proofs {
    signatures
        .iter()
        .zip(premints.iter())
        .map(|(signature, premint)| {
            let mint_key = keys
                .amount_key(signature.amount)
                .expect("mint has key for amount");
            let c = unblind_message(&signature.c, &premint.r, &mint_key).expect("unblind");

            Proof::new(
                signature.amount,
                signature.keyset_id,
                premint.secret.clone(),
                c,
            )
        })
        .collect()
}

/// A mint over fresh in-memory storage and a scriptable backend
pub async fn new_mint(input_fee_ppk: u64, config: MintConfig) -> (Mint, Arc<FakeLightning>, Id) {
    let ln = Arc::new(FakeLightning::new());

    let mint = Mint::new(
        MintInfo::default(),
        Arc::new(MintMemoryDatabase::new()),
        ln.clone(),
        config,
    )
    .await
    .expect("mint");

    let keyset = mint
        .ensure_active_keyset(CurrencyUnit::Sat, input_fee_ppk)
        .await
        .expect("keyset");

    (mint, ln, keyset.id)
}

/// Public keys of a keyset
pub async fn keyset_keys(mint: &Mint, keyset_id: &Id) -> Keys {
    mint.keyset_pubkeys(keyset_id)
        .await
        .expect("keyset exists")
        .keysets
        .remove(0)
        .keys
}

/// Fabricate wallet proofs by signing blinded messages directly
pub async fn fund_proofs(mint: &Mint, amounts: &[u64], keyset_id: Id) -> Proofs {
    let keys = keyset_keys(mint, &keyset_id).await;
    let pre = premints(amounts, keyset_id);

    let mut signatures = Vec::with_capacity(pre.len());
    for premint in &pre {
        signatures.push(
            mint.blind_sign(&premint.blinded_message)
                .await
                .expect("signing"),
        );
    }

    construct_proofs(&signatures, &pre, &keys)
}

/// Build a signed bolt11 invoice without an amount
pub fn build_amountless_invoice(description: String) -> Bolt11Invoice {
    let mut preimage = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut preimage);
    let payment_hash = sha256::Hash::hash(&preimage);

    InvoiceBuilder::new(Currency::Bitcoin)
        .description(description)
        .payment_hash(payment_hash)
        .payment_secret(PaymentSecret([42u8; 32]))
        .current_timestamp()
        .min_final_cltv_expiry_delta(144)
        .expiry_time(Duration::from_secs(3600))
        .build_signed(|hash| Secp256k1::new().sign_ecdsa_recoverable(hash, &node_key()))
        .expect("valid invoice")
}

/// Payment hash of a bolt11 request string
pub fn build_invoice_payment_hash(request: &str) -> String {
    Bolt11Invoice::from_str(request)
        .expect("valid bolt11")
        .payment_hash()
        .to_string()
}

/// Hex decode helper kept for parity with wire fixtures
pub fn decode_hex(s: &str) -> Vec<u8> {
    hex::decode(s).expect("valid hex")
}
