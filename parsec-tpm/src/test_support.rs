#![allow(dead_code)]

use rand::rngs::OsRng;

use crate::{
    constants::tpm_alg,
    crypto::{self, Algorithm, EccCurve, PrivateKey},
    kat::Kat,
    pat::Pat,
    tpm::{self, PcrSelection},
};

pub const TEST_TPM_VER: &str = "TPM 2.0";

/// RAND UEID with a 32 byte body.
pub const TEST_UEID: [u8; 33] = [
    0x01, 0xce, 0xbd, 0x3a, 0x9c, 0x5e, 0x34, 0x09, 0x8d, 0x6c, 0x2f, 0x51, 0x7a, 0xd4, 0x87,
    0x1b, 0xe0, 0x43, 0x6f, 0x92, 0x15, 0xa8, 0xc7, 0x3e, 0x70, 0x2b, 0xd9, 0x64, 0x0f, 0x88,
    0xb1, 0x5a, 0x26,
];

pub const TEST_NONCE: [u8; 32] = [0xab; 32];

pub const TEST_PCR_DIGEST: [u8; 32] = [0x11; 32];

pub fn p256_key() -> PrivateKey {
    p256::ecdsa::SigningKey::random(&mut OsRng).into()
}

pub fn p384_key() -> PrivateKey {
    p384::ecdsa::SigningKey::random(&mut OsRng).into()
}

/// The algorithm a test key signs with.
pub fn alg_for(key: &PrivateKey) -> Algorithm {
    match key.curve() {
        EccCurve::NistP256 => Algorithm::Es256,
        EccCurve::NistP384 => Algorithm::Es384,
        EccCurve::NistP521 => Algorithm::Es512,
    }
}

/// Marshalled `TPMT_SIGNATURE` by `key` over `data`.
pub fn tpm_sign(key: &PrivateKey, data: &[u8]) -> Vec<u8> {
    let alg = alg_for(key);
    let sig = crypto::sign(alg, key, data).unwrap();
    tpm::encode_signature(alg, &sig).unwrap()
}

/// A KAT for a fresh P-256 key, certified and signed by `attesting`.
pub fn valid_kat(attesting: &PrivateKey) -> Kat {
    let mut kat = Kat::new();
    kat.set_tpm_ver(TEST_TPM_VER).unwrap();
    kat.set_key_id(&TEST_UEID).unwrap();
    kat.encode_pub_area(Algorithm::Es256, &p256_key().public_key()).unwrap();
    kat.encode_cert_info(&TEST_NONCE).unwrap();
    let sig = tpm_sign(attesting, kat.cert_info());
    kat.set_sig(&sig).unwrap();
    kat
}

/// A PAT quoting PCRs 0, 1, 2 and 7, signed by `attesting`.
pub fn valid_pat(attesting: &PrivateKey) -> Pat {
    let mut pat = Pat::new();
    pat.set_tpm_ver(TEST_TPM_VER).unwrap();
    pat.set_key_id(&TEST_UEID).unwrap();
    pat.encode_attest_info(
        &TEST_NONCE,
        &[PcrSelection::new(tpm_alg::SHA256, &[0, 1, 2, 7]).unwrap()],
        &TEST_PCR_DIGEST,
    )
    .unwrap();
    let sig = tpm_sign(attesting, pat.attest_info());
    pat.set_sig(&sig).unwrap();
    pat
}
