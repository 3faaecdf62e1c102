//! Field rules shared by the key and platform attestation tokens.

use tracing::debug;

use crate::{
    crypto::{self, PublicKey},
    errors::TokenError,
    tpm, ueid,
};

pub(crate) fn check_tpm_ver(tpm_ver: &str) -> Result<(), TokenError> {
    if tpm_ver.is_empty() {
        return Err(TokenError::EmptyTpmVersion);
    }
    Ok(())
}

pub(crate) fn check_key_id(kid: &[u8]) -> Result<(), TokenError> {
    ueid::validate(kid).map_err(TokenError::InvalidKeyId)
}

pub(crate) fn check_sig(sig: &[u8]) -> Result<(), TokenError> {
    if sig.is_empty() {
        return Err(TokenError::ZeroLengthSignature);
    }
    Ok(())
}

/// Checks the common fields in a fixed order so the first failing
/// invariant is the one reported.
pub(crate) fn validate_fields(
    tpm_ver: Option<&str>,
    kid: Option<&[u8]>,
    sig: Option<&[u8]>,
) -> Result<(), TokenError> {
    check_tpm_ver(tpm_ver.ok_or(TokenError::MissingTpmVersion)?)?;
    check_key_id(kid.ok_or(TokenError::MissingKeyId)?)?;
    check_sig(sig.ok_or(TokenError::MissingSignature)?)?;
    Ok(())
}

/// Verifies a `TPMT_SIGNATURE` over the raw `TPMS_ATTEST` bytes.
pub(crate) fn verify_attestation(
    sig: Option<&[u8]>,
    attestation: &[u8],
    structure: &'static str,
    key: &PublicKey,
) -> Result<(), TokenError> {
    let sig = sig.ok_or(TokenError::MissingSignature)?;
    check_sig(sig)?;
    if attestation.is_empty() {
        return Err(TokenError::MissingStructure(structure));
    }
    let decoded = tpm::decode_signature(sig).map_err(|source| TokenError::Decode {
        structure: "signature",
        source,
    })?;
    if decoded.algorithm.curve() != key.curve() {
        return Err(TokenError::SignatureAlgorithmMismatch {
            signature: decoded.algorithm.hash().tpm_id(),
            key: key.curve().name(),
        });
    }
    if !crypto::verify(decoded.algorithm, key, attestation, &decoded.signature)? {
        return Err(TokenError::SignatureMismatch);
    }
    debug!(structure, algorithm = %decoded.algorithm, "signature verified");
    Ok(())
}
