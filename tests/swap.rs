//! Swap scenarios: balance, double-spend defense, spending conditions

use cashu_mint::mint::MintConfig;
use cashu_mint::nuts::nut07::State;
use cashu_mint::nuts::{
    CheckStateRequest, Conditions, Kind, Nut10Secret, P2PKWitness, Proof, ProofsMethods,
    SecretKey, SigFlag, SwapRequest, Witness,
};
use cashu_mint::secret::Secret;
use cashu_mint::{Amount, Error, ErrorResponse};

mod common;

use common::{blinded_messages, fund_proofs, new_mint, premints};

#[tokio::test]
async fn test_successful_swap() {
    let (mint, _ln, keyset_id) = new_mint(0, MintConfig::default()).await;

    let inputs = fund_proofs(&mint, &[4, 8], keyset_id).await;
    let input_ys = inputs.ys().unwrap();

    let outputs = premints(&[4, 8], keyset_id);

    let response = mint
        .process_swap_request(SwapRequest::new(inputs, blinded_messages(&outputs)))
        .await
        .unwrap();

    assert_eq!(response.signatures.len(), 2);
    assert_eq!(response.signatures[0].amount, Amount::from(4));
    assert_eq!(response.signatures[1].amount, Amount::from(8));
    for signature in &response.signatures {
        assert_eq!(signature.keyset_id, keyset_id);
        assert!(signature.dleq.is_some());
    }

    // Unblinding the returned C_ yields proofs the mint accepts
    let keys = common::keyset_keys(&mint, &keyset_id).await;
    let new_proofs = common::construct_proofs(&response.signatures, &outputs, &keys);
    for proof in &new_proofs {
        mint.verify_proof(proof).await.unwrap();
    }

    // Inputs are now terminal
    let states = mint
        .check_state(&CheckStateRequest { ys: input_ys })
        .await
        .unwrap();
    assert!(states.states.iter().all(|s| s.state == State::Spent));
}

#[tokio::test]
async fn test_double_spend_rejected() {
    let (mint, _ln, keyset_id) = new_mint(0, MintConfig::default()).await;

    let inputs = fund_proofs(&mint, &[4, 8], keyset_id).await;

    let outputs = premints(&[4, 8], keyset_id);
    mint.process_swap_request(SwapRequest::new(inputs.clone(), blinded_messages(&outputs)))
        .await
        .unwrap();

    // Replaying one spent proof in a fresh swap fails with 11001 and signs
    // nothing
    let retry_outputs = premints(&[4], keyset_id);
    let err = mint
        .process_swap_request(SwapRequest::new(
            vec![inputs[0].clone()],
            blinded_messages(&retry_outputs),
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TokenAlreadySpent));
    assert_eq!(ErrorResponse::from(err).code.to_code(), 11001);
}

#[tokio::test]
async fn test_unbalanced_swap_rejected() {
    let (mint, _ln, keyset_id) = new_mint(0, MintConfig::default()).await;

    let inputs = fund_proofs(&mint, &[4, 8], keyset_id).await;
    let input_ys = inputs.ys().unwrap();

    let outputs = premints(&[4, 4], keyset_id);
    let err = mint
        .process_swap_request(SwapRequest::new(inputs, blinded_messages(&outputs)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransactionUnbalanced(12, 8, 0)));

    // Nothing was marked spent
    let states = mint
        .check_state(&CheckStateRequest { ys: input_ys })
        .await
        .unwrap();
    assert!(states.states.iter().all(|s| s.state == State::Unspent));
}

#[tokio::test]
async fn test_swap_with_input_fee() {
    let (mint, _ln, keyset_id) = new_mint(100, MintConfig::default()).await;

    // Three inputs at 100ppk cost 1; outputs must sum to inputs - 1
    let inputs = fund_proofs(&mint, &[2, 4, 8], keyset_id).await;

    let exact = premints(&[1, 4, 8], keyset_id);
    let response = mint
        .process_swap_request(SwapRequest::new(inputs.clone(), blinded_messages(&exact)))
        .await;
    assert!(response.is_ok());

    // Paying no fee is unbalanced
    let inputs = fund_proofs(&mint, &[2, 4, 8], keyset_id).await;
    let unbalanced = premints(&[2, 4, 8], keyset_id);
    assert!(matches!(
        mint.process_swap_request(SwapRequest::new(inputs, blinded_messages(&unbalanced)))
            .await
            .unwrap_err(),
        Error::TransactionUnbalanced(14, 14, 1)
    ));
}

#[tokio::test]
async fn test_duplicate_inputs_and_outputs_rejected() {
    let (mint, _ln, keyset_id) = new_mint(0, MintConfig::default()).await;

    let inputs = fund_proofs(&mint, &[4], keyset_id).await;

    let outputs = premints(&[4, 4], keyset_id);
    let err = mint
        .process_swap_request(SwapRequest::new(
            vec![inputs[0].clone(), inputs[0].clone()],
            blinded_messages(&outputs),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateInputs));

    let output = premints(&[4], keyset_id);
    let duplicated = vec![
        output[0].blinded_message.clone(),
        output[0].blinded_message.clone(),
    ];
    let err = mint
        .process_swap_request(SwapRequest::new(
            fund_proofs(&mint, &[4, 4], keyset_id).await,
            duplicated,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateOutputs));
}

#[tokio::test]
async fn test_swap_to_inactive_keyset_rejected() {
    let (mint, _ln, keyset_id) = new_mint(0, MintConfig::default()).await;

    let inputs = fund_proofs(&mint, &[4], keyset_id).await;

    let outputs = premints(&[4], keyset_id);

    mint.deactivate_keyset(&keyset_id).await.unwrap();

    // Old proofs still validate, but outputs must be on an active keyset
    let err = mint
        .process_swap_request(SwapRequest::new(inputs, blinded_messages(&outputs)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::KeysetInactive));
    assert_eq!(ErrorResponse::from(err).code.to_code(), 12002);
}

#[tokio::test]
async fn test_p2pk_swap_requires_signature() {
    let (mint, _ln, keyset_id) = new_mint(0, MintConfig::default()).await;

    let owner = SecretKey::generate();

    // Fund a proof locked to the owner's key
    let keys = common::keyset_keys(&mint, &keyset_id).await;
    let locked_secret: Secret = Nut10Secret::new(
        Kind::P2PK,
        owner.public_key().to_hex(),
        Some(Conditions::default()),
    )
    .try_into()
    .unwrap();

    let (blinded, r) =
        cashu_mint::dhke::blind_message(locked_secret.as_bytes(), None).unwrap();
    let message = cashu_mint::nuts::BlindedMessage::new(Amount::from(4), keyset_id, blinded);
    let signature = mint.blind_sign(&message).await.unwrap();

    let mint_key = keys.amount_key(Amount::from(4)).unwrap();
    let c = cashu_mint::dhke::unblind_message(&signature.c, &r, &mint_key).unwrap();
    let mut locked_proof = Proof::new(Amount::from(4), keyset_id, locked_secret, c);

    // Without a witness the swap is rejected
    let outputs = premints(&[4], keyset_id);
    let err = mint
        .process_swap_request(SwapRequest::new(
            vec![locked_proof.clone()],
            blinded_messages(&outputs),
        ))
        .await
        .unwrap_err();
    assert_eq!(ErrorResponse::from(err).code.to_code(), 10003);

    // With the owner's signature it spends
    locked_proof.sign_p2pk(&owner).unwrap();
    let response = mint
        .process_swap_request(SwapRequest::new(
            vec![locked_proof],
            blinded_messages(&outputs),
        ))
        .await;
    assert!(response.is_ok());
}

#[tokio::test]
async fn test_sig_all_swap() {
    let (mint, _ln, keyset_id) = new_mint(0, MintConfig::default()).await;

    let owner = SecretKey::generate();
    let keys = common::keyset_keys(&mint, &keyset_id).await;

    let conditions = Conditions::new(None, None, None, None, Some(SigFlag::SigAll));

    let mut proofs = Vec::new();
    for amount in [2u64, 2] {
        let secret: Secret =
            Nut10Secret::new(Kind::P2PK, owner.public_key().to_hex(), Some(conditions.clone()))
                .try_into()
                .unwrap();

        let (blinded, r) = cashu_mint::dhke::blind_message(secret.as_bytes(), None).unwrap();
        let message =
            cashu_mint::nuts::BlindedMessage::new(Amount::from(amount), keyset_id, blinded);
        let signature = mint.blind_sign(&message).await.unwrap();

        let mint_key = keys.amount_key(Amount::from(amount)).unwrap();
        let c = cashu_mint::dhke::unblind_message(&signature.c, &r, &mint_key).unwrap();
        proofs.push(Proof::new(Amount::from(amount), keyset_id, secret, c));
    }

    let outputs = premints(&[4], keyset_id);
    let output_messages = blinded_messages(&outputs);

    // The aggregate commits to every input secret and every output B_
    let mut message = String::new();
    for proof in &proofs {
        message.push_str(&proof.secret.to_string());
    }
    for output in &output_messages {
        message.push_str(&output.blinded_secret.to_hex());
    }

    let aggregate_signature = owner.sign(message.as_bytes()).unwrap();
    proofs[0].witness = Some(Witness::P2PKWitness(P2PKWitness {
        signatures: vec![aggregate_signature.to_string()],
    }));

    let response = mint
        .process_swap_request(SwapRequest::new(proofs, output_messages))
        .await;

    assert!(response.is_ok());
}

#[tokio::test]
async fn test_check_state_unknown_y_is_unspent() {
    let (mint, _ln, _keyset_id) = new_mint(0, MintConfig::default()).await;

    let y = cashu_mint::dhke::hash_to_curve(b"never seen").unwrap();

    let response = mint
        .check_state(&CheckStateRequest { ys: vec![y] })
        .await
        .unwrap();

    assert_eq!(response.states.len(), 1);
    assert_eq!(response.states[0].state, State::Unspent);
    assert!(response.states[0].witness.is_none());
}
