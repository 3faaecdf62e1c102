//! The Parsec TPM evidence aggregate and its JSON/CBOR envelopes.

use std::io::{self, Cursor};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::{
    crypto::{self, Algorithm, PrivateKey, PublicKey},
    errors::{EvidenceError, Result, TokenError, TokenKind},
    kat::Kat,
    pat::Pat,
    tpm,
    utils::get_require_key_binding,
};

/// Options for [`Evidence::verify_with_options`].
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Optional flag to check that the KAT certify info names the key in its
    /// public area. If `None`, uses the `PARSEC_TPM_REQUIRE_KEY_BINDING`
    /// environment default
    pub require_key_binding: Option<bool>,
    /// Optional nonce both tokens must carry in their `extraData`
    pub expected_nonce: Option<Vec<u8>>,
}

/// Parsec TPM evidence: a key attestation token and a platform attestation
/// token, both signed by the same attesting key.
///
/// Every operation that produces or accepts a complete value validates both
/// tokens first, and leaves `self` untouched when validation fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    kat: Option<Kat>,
    pat: Option<Pat>,
}

fn validate_kat_pat(kat: Option<&Kat>, pat: Option<&Pat>) -> Result<()> {
    let kat = kat.ok_or(EvidenceError::IncompleteEvidence(TokenKind::Kat))?;
    let pat = pat.ok_or(EvidenceError::IncompleteEvidence(TokenKind::Pat))?;
    kat.validate().map_err(|source| EvidenceError::InvalidToken {
        kind: TokenKind::Kat,
        source,
    })?;
    pat.validate().map_err(|source| EvidenceError::InvalidToken {
        kind: TokenKind::Pat,
        source,
    })?;
    Ok(())
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kat(&self) -> Option<&Kat> {
        self.kat.as_ref()
    }

    pub fn pat(&self) -> Option<&Pat> {
        self.pat.as_ref()
    }

    /// Installs both tokens after validating them.
    ///
    /// # Errors
    ///
    /// * `EvidenceError::InvalidToken` - If either token fails
    ///   [`Kat::validate`] or [`Pat::validate`]; the evidence is unchanged
    pub fn set_tokens(&mut self, kat: Kat, pat: Pat) -> Result<()> {
        validate_kat_pat(Some(&kat), Some(&pat))?;
        self.kat = Some(kat);
        self.pat = Some(pat);
        Ok(())
    }

    /// Checks that both tokens are present and valid.
    pub fn validate(&self) -> Result<()> {
        validate_kat_pat(self.kat.as_ref(), self.pat.as_ref())
    }

    /// Serializes the evidence as a JSON object with `kat` and `pat`
    /// members, byte fields in standard base64.
    #[instrument(level = "debug", skip_all)]
    pub fn to_json(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let bytes = serde_json::to_vec(self).map_err(EvidenceError::JsonEncode)?;
        debug!(len = bytes.len(), "encoded evidence as JSON");
        Ok(bytes)
    }

    /// Replaces `self` with the evidence decoded from `data`.
    ///
    /// # Errors
    ///
    /// * `EvidenceError::JsonDecode` - If `data` is not a JSON evidence object
    /// * `EvidenceError::IncompleteEvidence` - If a token is absent
    /// * `EvidenceError::InvalidToken` - If a token fails validation
    #[instrument(level = "debug", skip_all, fields(len = data.len()))]
    pub fn from_json(&mut self, data: &[u8]) -> Result<()> {
        let decoded: Evidence = serde_json::from_slice(data).map_err(|e| {
            error!(level = "evidence::from_json", "Failed to decode JSON evidence: {e}");
            EvidenceError::JsonDecode(e)
        })?;
        decoded.commit(self)
    }

    /// Serializes the evidence as a CBOR map with `kat` and `pat` keys, byte
    /// fields as byte strings.
    #[instrument(level = "debug", skip_all)]
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)?;
        debug!(len = bytes.len(), "encoded evidence as CBOR");
        Ok(bytes)
    }

    /// Replaces `self` with the evidence decoded from `data`.
    ///
    /// Bytes after the top-level CBOR item are rejected.
    #[instrument(level = "debug", skip_all, fields(len = data.len()))]
    pub fn from_cbor(&mut self, data: &[u8]) -> Result<()> {
        let mut cursor = Cursor::new(data);
        let decoded: Evidence = ciborium::de::from_reader(&mut cursor).map_err(|e| {
            error!(level = "evidence::from_cbor", "Failed to decode CBOR evidence: {e}");
            EvidenceError::from(e)
        })?;
        if cursor.position() as usize != data.len() {
            error!(
                level = "evidence::from_cbor",
                trailing = data.len() - cursor.position() as usize,
                "Trailing bytes after CBOR evidence"
            );
            return Err(EvidenceError::CborDecode(ciborium::de::Error::Io(
                io::Error::new(io::ErrorKind::InvalidData, "trailing bytes after CBOR item"),
            )));
        }
        decoded.commit(self)
    }

    fn tokens(&self) -> Result<(&Kat, &Pat)> {
        let kat = self
            .kat
            .as_ref()
            .ok_or(EvidenceError::MissingToken(TokenKind::Kat))?;
        let pat = self
            .pat
            .as_ref()
            .ok_or(EvidenceError::MissingToken(TokenKind::Pat))?;
        Ok((kat, pat))
    }

    fn commit(self, target: &mut Evidence) -> Result<()> {
        if let Err(e) = self.validate() {
            error!(level = "evidence::decode", "Rejected decoded evidence: {e}");
            return Err(e);
        }
        *target = self;
        Ok(())
    }

    /// Verifies the signatures of both tokens with the attesting `key`.
    ///
    /// # Errors
    ///
    /// * `EvidenceError::MissingToken` - If the KAT or the PAT is absent
    /// * `EvidenceError::VerificationFailed` - If a signature does not verify,
    ///   wrapping the token-level cause
    #[instrument(level = "info", name = "evidence_verify", skip_all, fields(curve = %key.curve()))]
    pub fn verify(&self, key: &PublicKey) -> Result<()> {
        let (kat, pat) = self.tokens()?;
        kat.verify(key)
            .map_err(|source| verification_failed(TokenKind::Kat, source))?;
        pat.verify(key)
            .map_err(|source| verification_failed(TokenKind::Pat, source))?;
        debug!("evidence signatures verified");
        Ok(())
    }

    /// [`Evidence::verify`] plus the checks selected by `options`.
    #[instrument(level = "info", name = "evidence_verify_with_options", skip_all)]
    pub fn verify_with_options(&self, key: &PublicKey, options: VerifyOptions) -> Result<()> {
        let VerifyOptions {
            require_key_binding,
            expected_nonce,
        } = options;
        let (kat, pat) = self.tokens()?;
        kat.verify(key)
            .map_err(|source| verification_failed(TokenKind::Kat, source))?;
        pat.verify(key)
            .map_err(|source| verification_failed(TokenKind::Pat, source))?;
        if require_key_binding.unwrap_or_else(get_require_key_binding) {
            kat.check_key_binding()
                .map_err(|source| verification_failed(TokenKind::Kat, source))?;
        }
        if let Some(expected) = expected_nonce {
            let kat_nonce = kat
                .decode_cert_info()
                .map_err(|source| verification_failed(TokenKind::Kat, source))?;
            check_nonce(TokenKind::Kat, &expected, kat_nonce.nonce())?;
            let pat_nonce = pat
                .decode_attest_info()
                .map_err(|source| verification_failed(TokenKind::Pat, source))?;
            check_nonce(TokenKind::Pat, &expected, pat_nonce.nonce())?;
        }
        Ok(())
    }

    /// Signs `data` with `key` using the COSE algorithm `alg` and returns the
    /// marshalled `TPMT_SIGNATURE`, ready for [`Kat::set_sig`] or
    /// [`Pat::set_sig`].
    ///
    /// # Errors
    ///
    /// * `EvidenceError::UnsupportedAlgorithm` - If `alg` is not ES256,
    ///   ES384 or ES512
    /// * `EvidenceError::SigningFailed` - If `key` does not match `alg` or the
    ///   signer fails
    #[instrument(level = "debug", skip(self, data, key), fields(len = data.len()))]
    pub fn sign(&self, data: &[u8], alg: i64, key: &PrivateKey) -> Result<Vec<u8>> {
        let alg =
            Algorithm::try_from(alg).map_err(|_| EvidenceError::UnsupportedAlgorithm(alg))?;
        let signature = crypto::sign(alg, key, data).map_err(EvidenceError::SigningFailed)?;
        tpm::encode_signature(alg, &signature).map_err(EvidenceError::SignatureEncoding)
    }
}

fn verification_failed(kind: TokenKind, source: TokenError) -> EvidenceError {
    error!(level = "evidence::verify", "Verification of {kind} failed: {source}");
    EvidenceError::VerificationFailed { kind, source }
}

fn check_nonce(kind: TokenKind, expected: &[u8], actual: &[u8]) -> Result<()> {
    if expected != actual {
        return Err(verification_failed(
            kind,
            TokenError::NonceMismatch {
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            },
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{cose_alg, KAT_KEY, PAT_KEY},
        errors::CryptoError,
        test_support::{
            p256_key, p384_key, valid_kat, valid_pat, TEST_NONCE, TEST_UEID,
        },
    };

    fn valid_evidence(attesting: &PrivateKey) -> Evidence {
        let mut e = Evidence::new();
        e.set_tokens(valid_kat(attesting), valid_pat(attesting)).unwrap();
        e
    }

    #[test]
    fn test_set_tokens_is_atomic() {
        let attesting = p256_key();
        let mut e = valid_evidence(&attesting);
        let before = e.clone();

        let mut bad_pat = valid_pat(&attesting);
        bad_pat.sig = None;
        let err = e.set_tokens(valid_kat(&attesting), bad_pat).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation failed: invalid platform attestation token: signature not set"
        );
        assert_eq!(e, before);

        let mut empty = Evidence::new();
        let mut bad_pat = valid_pat(&attesting);
        bad_pat.kid = None;
        assert!(empty.set_tokens(valid_kat(&attesting), bad_pat).is_err());
        assert_eq!(empty, Evidence::new());

        let mut bad_kat = valid_kat(&attesting);
        bad_kat.tpm_ver = None;
        let err = e.set_tokens(bad_kat, valid_pat(&attesting)).unwrap_err();
        assert!(matches!(
            err,
            EvidenceError::InvalidToken {
                kind: TokenKind::Kat,
                source: TokenError::MissingTpmVersion
            }
        ));
        assert_eq!(e, before);
    }

    #[test]
    fn test_envelopes_require_both_tokens() {
        let e = Evidence::new();
        assert!(matches!(
            e.to_json(),
            Err(EvidenceError::IncompleteEvidence(TokenKind::Kat))
        ));
        let e = Evidence {
            kat: Some(valid_kat(&p256_key())),
            pat: None,
        };
        assert!(matches!(
            e.to_cbor(),
            Err(EvidenceError::IncompleteEvidence(TokenKind::Pat))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let e = valid_evidence(&p256_key());
        let json = e.to_json().unwrap();

        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value[KAT_KEY]["tpmVer"], "TPM 2.0");
        assert!(value[KAT_KEY]["certInfo"].is_string());
        assert!(value[PAT_KEY]["attestInfo"].is_string());

        let mut decoded = Evidence::new();
        decoded.from_json(&json).unwrap();
        assert_eq!(decoded, e);
    }

    #[test]
    fn test_cbor_round_trip() {
        let e = valid_evidence(&p384_key());
        let cbor = e.to_cbor().unwrap();
        let mut decoded = Evidence::new();
        decoded.from_cbor(&cbor).unwrap();
        assert_eq!(decoded, e);
    }

    #[test]
    fn test_from_json_rejects_invalid_tokens() {
        let mut e = Evidence::new();
        let err = e
            .from_json(br#"{"kat":{"tpmVer":"TPM 2.0","kid":"QQ==","sig":"AQ=="},"pat":{}}"#)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation failed: invalid key attestation token: invalid KID: failed to validate UEID: invalid UEID type 65"
        );
        assert_eq!(e, Evidence::new());

        assert!(matches!(
            e.from_json(b"{\"kat\":"),
            Err(EvidenceError::JsonDecode(_))
        ));
        assert!(matches!(
            e.from_json(br#"{"pat":{}}"#),
            Err(EvidenceError::IncompleteEvidence(TokenKind::Kat))
        ));
    }

    #[test]
    fn test_from_cbor_failure_keeps_previous_value() {
        let attesting = p256_key();
        let mut e = valid_evidence(&attesting);
        let before = e.clone();

        let mut cbor = e.to_cbor().unwrap();
        cbor.push(0x00);
        assert!(matches!(
            e.from_cbor(&cbor),
            Err(EvidenceError::CborDecode(_))
        ));
        assert!(matches!(
            e.from_cbor(&[0xff]),
            Err(EvidenceError::CborDecode(_))
        ));
        // empty map
        assert!(matches!(
            e.from_cbor(&[0xa0]),
            Err(EvidenceError::IncompleteEvidence(TokenKind::Kat))
        ));
        assert_eq!(e, before);
    }

    #[test]
    fn test_verify() {
        let attesting = p256_key();
        let e = valid_evidence(&attesting);
        e.verify(&attesting.public_key()).unwrap();

        let err = e.verify(&p256_key().public_key()).unwrap_err();
        assert!(matches!(
            err,
            EvidenceError::VerificationFailed {
                kind: TokenKind::Kat,
                source: TokenError::SignatureMismatch
            }
        ));
        assert!(err
            .to_string()
            .starts_with("failed to verify signature on key attestation token"));
    }

    #[test]
    fn test_verify_missing_tokens() {
        let key = p256_key().public_key();
        assert_eq!(
            Evidence::new().verify(&key).unwrap_err().to_string(),
            "missing Parsec TPM key attestation token"
        );
        let e = Evidence {
            kat: Some(valid_kat(&p256_key())),
            pat: None,
        };
        assert!(matches!(
            e.verify(&key),
            Err(EvidenceError::MissingToken(TokenKind::Pat))
        ));
        assert!(matches!(
            e.verify_with_options(&key, VerifyOptions::default()),
            Err(EvidenceError::MissingToken(TokenKind::Pat))
        ));
        let e = Evidence {
            kat: None,
            pat: Some(valid_pat(&p256_key())),
        };
        assert!(matches!(
            e.verify_with_options(&key, VerifyOptions::default()),
            Err(EvidenceError::MissingToken(TokenKind::Kat))
        ));
    }

    #[test]
    fn test_verify_detects_tampered_pat() {
        let attesting = p256_key();
        let mut e = valid_evidence(&attesting);
        if let Some(pat) = e.pat.as_mut() {
            let last = pat.attest_info.len() - 1;
            pat.attest_info[last] ^= 0x01;
        }
        assert!(matches!(
            e.verify(&attesting.public_key()),
            Err(EvidenceError::VerificationFailed {
                kind: TokenKind::Pat,
                source: TokenError::SignatureMismatch
            })
        ));
    }

    #[test]
    fn test_verify_with_options() {
        let attesting = p256_key();
        let e = valid_evidence(&attesting);
        let key = attesting.public_key();

        e.verify_with_options(
            &key,
            VerifyOptions {
                require_key_binding: Some(true),
                expected_nonce: Some(TEST_NONCE.to_vec()),
            },
        )
        .unwrap();

        let err = e
            .verify_with_options(
                &key,
                VerifyOptions {
                    require_key_binding: Some(false),
                    expected_nonce: Some(vec![0x01, 0x02]),
                },
            )
            .unwrap_err();
        assert!(matches!(
            &err,
            EvidenceError::VerificationFailed {
                kind: TokenKind::Kat,
                source: TokenError::NonceMismatch { expected, .. }
            } if expected == "0102"
        ));
    }

    #[test]
    fn test_verify_with_options_key_binding() {
        let attesting = p256_key();
        let mut kat = valid_kat(&attesting);
        // Swap in a different key after certification; certInfo and its
        // signature stay valid.
        kat.encode_pub_area(Algorithm::Es256, &p256_key().public_key()).unwrap();

        let mut e = Evidence::new();
        e.set_tokens(kat, valid_pat(&attesting)).unwrap();
        let key = attesting.public_key();
        e.verify(&key).unwrap();
        assert!(matches!(
            e.verify_with_options(
                &key,
                VerifyOptions {
                    require_key_binding: Some(true),
                    expected_nonce: None,
                }
            ),
            Err(EvidenceError::VerificationFailed {
                kind: TokenKind::Kat,
                source: TokenError::KeyBindingMismatch
            })
        ));
    }

    #[test]
    fn test_sign_produces_verifiable_signature() {
        let attesting = p384_key();
        let e = Evidence::new();
        let mut pat = valid_pat(&p384_key());
        let sig = e
            .sign(pat.attest_info(), cose_alg::ES384, &attesting)
            .unwrap();
        pat.set_sig(&sig).unwrap();
        pat.verify(&attesting.public_key()).unwrap();
    }

    #[test]
    fn test_sign_unsupported_algorithm() {
        let e = Evidence::new();
        let err = e.sign(b"data", 0, &p256_key()).unwrap_err();
        assert!(matches!(
            err,
            EvidenceError::UnsupportedAlgorithm(0)
        ));
        assert_eq!(err.to_string(), "unsupported algorithm for signing: 0");
        // PS256
        assert!(matches!(
            e.sign(b"data", -37, &p256_key()),
            Err(EvidenceError::UnsupportedAlgorithm(-37))
        ));
    }

    #[test]
    fn test_sign_key_mismatch() {
        let e = Evidence::new();
        assert!(matches!(
            e.sign(b"data", cose_alg::ES256, &p384_key()),
            Err(EvidenceError::SigningFailed(CryptoError::KeyMismatch { .. }))
        ));
    }

    #[test]
    fn test_kid_is_shared_between_tokens() {
        let e = valid_evidence(&p256_key());
        assert_eq!(e.kat().and_then(Kat::key_id), Some(TEST_UEID.as_slice()));
        assert_eq!(e.pat().and_then(Pat::key_id), Some(TEST_UEID.as_slice()));
    }
}
