//! NUT-12: Offline ecash signature validation
//!
//! <https://github.com/cashubtc/nuts/blob/main/12.md>

use bitcoin::secp256k1::{self, Scalar};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::nut01::{PublicKey, SecretKey};
use crate::dhke::hash_e;
use crate::SECP256K1;

/// NUT12 Error
#[derive(Debug, Error)]
pub enum Error {
    /// Missing DLEQ Proof
    #[error("No DLEQ proof provided")]
    MissingDleqProof,
    /// Invalid DLEQ Proof
    #[error("Invalid DLEQ proof")]
    InvalidDleqProof,
    /// NUT01 Error
    #[error(transparent)]
    NUT01(#[from] super::nut01::Error),
    /// SECP256k1 Error
    #[error(transparent)]
    Secp256k1(#[from] secp256k1::Error),
}

/// DLEQ proof attached to a blind signature
///
/// Proves that `C_` was created with the same key `a` as the mint public
/// key `A` for the denomination, without revealing `a`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignatureDleq {
    /// e
    pub e: SecretKey,
    /// s
    pub s: SecretKey,
}

/// Generate a DLEQ proof for a blind signature
///
/// With random nonce `r`: `R1 = r*G`, `R2 = r*B_`,
/// `e = hash(R1, R2, A, C_)`, `s = r + e*a`.
pub fn calculate_dleq(
    blinded_signature: PublicKey, // C_
    blinded_message: &PublicKey,  // B_
    mint_secret_key: &SecretKey,  // a
) -> Result<BlindSignatureDleq, Error> {
    // Random nonce
    let r: SecretKey = SecretKey::generate();

    // R1 = r*G
    let r1 = r.public_key();

    // R2 = r*B_
    let r_scal: Scalar = r.as_scalar();
    let r2: PublicKey = blinded_message.mul_tweak(&SECP256K1, &r_scal)?.into();

    // e = hash(R1,R2,A,C_)
    let e: [u8; 32] = hash_e([r1, r2, mint_secret_key.public_key(), blinded_signature]);
    let e_sk: SecretKey = SecretKey::from_slice(&e)?;

    // s1 = e*a
    let s1: SecretKey = e_sk.mul_tweak(&mint_secret_key.as_scalar())?.into();

    // s = r + s1
    let s: SecretKey = r.add_tweak(&s1.to_scalar())?.into();

    Ok(BlindSignatureDleq { e: e_sk, s })
}

/// Verify a DLEQ proof against mint public key `A`
pub fn verify_dleq(
    blinded_message: PublicKey,   // B_
    blinded_signature: PublicKey, // C_
    e: &SecretKey,
    s: &SecretKey,
    mint_pubkey: PublicKey, // A
) -> Result<(), Error> {
    let e_bytes: [u8; 32] = e.to_secret_bytes();
    let e: Scalar = e.as_scalar();

    // a = e*A
    let a: PublicKey = mint_pubkey.mul_tweak(&SECP256K1, &e)?.into();

    // R1 = s*G - a
    let a: PublicKey = a.negate(&SECP256K1).into();
    let r1: PublicKey = s.public_key().combine(&a)?.into();

    // b = s*B_
    let s: Scalar = s.as_scalar();
    let b: PublicKey = blinded_message.mul_tweak(&SECP256K1, &s)?.into();

    // c = e*C_
    let c: PublicKey = blinded_signature.mul_tweak(&SECP256K1, &e)?.into();

    // R2 = b - c
    let c: PublicKey = c.negate(&SECP256K1).into();
    let r2: PublicKey = b.combine(&c)?.into();

    let hash_e: [u8; 32] = hash_e([r1, r2, mint_pubkey, blinded_signature]);

    if e_bytes != hash_e {
        tracing::warn!("DLEQ on signature failed");
        return Err(Error::InvalidDleqProof);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dhke::{blind_message, sign_message};
    use crate::secret::Secret;

    #[test]
    fn test_dleq_round_trip() {
        let mint_key = SecretKey::generate();

        let secret = Secret::generate();
        let (blinded, _r) = blind_message(secret.as_bytes(), None).unwrap();

        let signed = sign_message(&mint_key, &blinded).unwrap();

        let dleq = calculate_dleq(signed, &blinded, &mint_key).unwrap();

        assert!(
            verify_dleq(blinded, signed, &dleq.e, &dleq.s, mint_key.public_key()).is_ok()
        );

        // A proof for a different mint key must not verify
        let other_key = SecretKey::generate();
        assert!(
            verify_dleq(blinded, signed, &dleq.e, &dleq.s, other_key.public_key()).is_err()
        );
    }
}
