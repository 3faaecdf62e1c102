use crate::{
    constants::tpm_alg,
    crypto::{Algorithm, EcdsaSignature},
    errors::TpmError,
};

use super::buffer::{left_pad, Reader, Writer};

const STRUCTURE: &str = "TPMT_SIGNATURE";

/// sigAlg, hash and two empty `TPM2B_ECC_PARAMETER` sizes.
const MIN_SIGNATURE_SIZE: usize = 8;

/// Decoded view of an ECDSA `TPMT_SIGNATURE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmSignature {
    pub algorithm: Algorithm,
    /// Scalars left-padded to the curve's field size.
    pub signature: EcdsaSignature,
}

/// Marshals an ECDSA `TPMT_SIGNATURE`.
pub fn encode_signature(alg: Algorithm, signature: &EcdsaSignature) -> Result<Vec<u8>, TpmError> {
    let mut w = Writer::with_capacity(MIN_SIGNATURE_SIZE + signature.r.len() + signature.s.len());
    w.u16(tpm_alg::ECDSA)
        .u16(alg.hash().tpm_id())
        .tpm2b("signatureR", &signature.r)?
        .tpm2b("signatureS", &signature.s)?;
    Ok(w.into_inner())
}

/// Unmarshals an ECDSA `TPMT_SIGNATURE`.
///
/// # Errors
///
/// * `TpmError::Truncated` - If `bytes` is shorter than the structure
/// * `TpmError::UnknownAlgorithm` - If the scheme is not ECDSA or the hash
///   is not SHA-256/384/512
/// * `TpmError::InvalidScalar` - If a scalar is longer than the field size
/// * `TpmError::TrailingBytes` - If bytes remain after the structure
pub fn decode_signature(bytes: &[u8]) -> Result<TpmSignature, TpmError> {
    let mut r = Reader::new(STRUCTURE, bytes);
    r.require_min(MIN_SIGNATURE_SIZE)?;
    let sig_alg = r.u16()?;
    if sig_alg != tpm_alg::ECDSA {
        return Err(TpmError::UnknownAlgorithm {
            field: "sigAlg",
            value: sig_alg,
        });
    }
    let hash = r.u16()?;
    let algorithm = Algorithm::from_tpm_hash_alg(hash).ok_or(TpmError::UnknownAlgorithm {
        field: "hash",
        value: hash,
    })?;
    let sig_r = r.tpm2b()?;
    let sig_s = r.tpm2b()?;
    r.finish()?;

    let size = algorithm.curve().coordinate_size();
    let invalid = || TpmError::InvalidScalar {
        expected: size,
        r_len: sig_r.len(),
        s_len: sig_s.len(),
    };
    let signature = EcdsaSignature {
        r: left_pad(sig_r, size).ok_or_else(invalid)?,
        s: left_pad(sig_s, size).ok_or_else(invalid)?,
    };
    Ok(TpmSignature {
        algorithm,
        signature,
    })
}
