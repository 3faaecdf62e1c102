use crate::{
    constants::{cose_alg, tpm_alg},
    crypto::{EccCurve, PrivateKey},
    test_support::{p256_key, valid_kat, valid_pat, TEST_NONCE, TEST_PCR_DIGEST, TEST_UEID},
    tpm::PcrSelection,
    Algorithm, Evidence, EvidenceError, Kat, Pat, TokenError, TokenKind, VerifyOptions,
};

const P521_SCALAR: &str = "0000f3b1a94e2c87d05b6e1a3c9d42f70b8e65c1d97a204f38b6e9d15c72a08e43f1b62d9c057ea38f4d16b2c9e70a53d84f1e6b27c9a05d3e81f46b7c20d95ae13b";

/// Builds evidence the way an attester would: certify a key, quote PCRs,
/// and sign both structures with the attesting key.
fn attest(attesting: &PrivateKey, alg: i64, certified_alg: Algorithm) -> Evidence {
    let mut evidence = Evidence::new();
    let certified = p256_key();

    let mut kat = Kat::new();
    kat.set_tpm_ver("TPM 2.0").unwrap();
    kat.set_key_id(&TEST_UEID).unwrap();
    kat.encode_pub_area(certified_alg, &certified.public_key()).unwrap();
    kat.encode_cert_info(&TEST_NONCE).unwrap();
    let sig = evidence.sign(kat.cert_info(), alg, attesting).unwrap();
    kat.set_sig(&sig).unwrap();

    let mut pat = Pat::new();
    pat.set_tpm_ver("TPM 2.0").unwrap();
    pat.set_key_id(&TEST_UEID).unwrap();
    pat.encode_attest_info(
        &TEST_NONCE,
        &[
            PcrSelection::new(tpm_alg::SHA256, &[0, 1, 2, 3, 7]).unwrap(),
            PcrSelection::new(tpm_alg::SHA384, &[]).unwrap(),
        ],
        &TEST_PCR_DIGEST,
    )
    .unwrap();
    let sig = evidence.sign(pat.attest_info(), alg, attesting).unwrap();
    pat.set_sig(&sig).unwrap();

    evidence.set_tokens(kat, pat).unwrap();
    evidence
}

fn strict() -> VerifyOptions {
    VerifyOptions {
        require_key_binding: Some(true),
        expected_nonce: Some(TEST_NONCE.to_vec()),
    }
}

#[test]
fn test_json_pipeline() {
    let attesting = p256_key();
    let wire = attest(&attesting, cose_alg::ES256, Algorithm::Es256)
        .to_json()
        .unwrap();

    let mut received = Evidence::new();
    received.from_json(&wire).unwrap();
    received
        .verify_with_options(&attesting.public_key(), strict())
        .unwrap();

    let pat = received.pat().unwrap().decode_attest_info().unwrap();
    assert_eq!(pat.pcr_selections[0].pcrs(), vec![0, 1, 2, 3, 7]);
    assert!(pat.pcr_selections[1].pcrs().is_empty());
    assert_eq!(pat.pcr_digest, TEST_PCR_DIGEST.to_vec());
}

#[test]
fn test_cbor_pipeline_p384() {
    let attesting: PrivateKey = p384::ecdsa::SigningKey::random(&mut rand::rngs::OsRng).into();
    let wire = attest(&attesting, cose_alg::ES384, Algorithm::Es256)
        .to_cbor()
        .unwrap();

    let mut received = Evidence::new();
    received.from_cbor(&wire).unwrap();
    received
        .verify_with_options(&attesting.public_key(), strict())
        .unwrap();
}

#[test]
fn test_cbor_pipeline_p521() {
    let scalar = hex::decode(P521_SCALAR).unwrap();
    let attesting = PrivateKey::from_slice(EccCurve::NistP521, &scalar).unwrap();
    let evidence = attest(&attesting, cose_alg::ES512, Algorithm::Es256);

    let kat_sig = crate::tpm::decode_signature(evidence.kat().unwrap().sig().unwrap()).unwrap();
    assert_eq!(kat_sig.algorithm, Algorithm::Es512);
    assert_eq!(kat_sig.signature.r.len(), 66);

    let mut received = Evidence::new();
    received.from_cbor(&evidence.to_cbor().unwrap()).unwrap();
    received.verify(&attesting.public_key()).unwrap();
}

#[test]
fn test_json_and_cbor_carry_the_same_evidence() {
    let evidence = attest(&p256_key(), cose_alg::ES256, Algorithm::Es256);
    let mut from_json = Evidence::new();
    from_json.from_json(&evidence.to_json().unwrap()).unwrap();
    let mut from_cbor = Evidence::new();
    from_cbor.from_cbor(&evidence.to_cbor().unwrap()).unwrap();
    assert_eq!(from_json, from_cbor);
}

#[test]
fn test_verifier_with_wrong_curve_key() {
    let attesting = p256_key();
    let evidence = attest(&attesting, cose_alg::ES256, Algorithm::Es256);
    let other: PrivateKey = p384::ecdsa::SigningKey::random(&mut rand::rngs::OsRng).into();
    assert!(matches!(
        evidence.verify(&other.public_key()),
        Err(EvidenceError::VerificationFailed {
            kind: TokenKind::Kat,
            source: TokenError::SignatureAlgorithmMismatch { .. }
        })
    ));
}

#[test]
fn test_replayed_evidence_fails_nonce_check() {
    let attesting = p256_key();
    let mut evidence = Evidence::new();
    evidence
        .set_tokens(valid_kat(&attesting), valid_pat(&attesting))
        .unwrap();
    let err = evidence
        .verify_with_options(
            &attesting.public_key(),
            VerifyOptions {
                require_key_binding: None,
                expected_nonce: Some(vec![0u8; 32]),
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EvidenceError::VerificationFailed {
            source: TokenError::NonceMismatch { .. },
            ..
        }
    ));
}

#[test]
fn test_tampered_wire_signature_is_rejected() {
    let attesting = p256_key();
    let evidence = attest(&attesting, cose_alg::ES256, Algorithm::Es256);
    let mut value: serde_json::Value =
        serde_json::from_slice(&evidence.to_json().unwrap()).unwrap();
    // Swap the two signatures: each is well formed but covers the other structure.
    let kat_sig = value["kat"]["sig"].take();
    value["kat"]["sig"] = value["pat"]["sig"].take();
    value["pat"]["sig"] = kat_sig;

    let mut received = Evidence::new();
    received
        .from_json(&serde_json::to_vec(&value).unwrap())
        .unwrap();
    assert!(matches!(
        received.verify(&attesting.public_key()),
        Err(EvidenceError::VerificationFailed {
            kind: TokenKind::Kat,
            source: TokenError::SignatureMismatch
        })
    ));
}
