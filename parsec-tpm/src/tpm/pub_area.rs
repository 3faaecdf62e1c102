use crate::{
    constants::{tpm_alg, MIN_PUB_AREA_SIZE, SIGNING_KEY_ATTRIBUTES},
    crypto::{Algorithm, EccCurve, HashAlg, PublicKey},
    errors::{CryptoError, TpmError},
};

use super::buffer::{Reader, Writer};

const STRUCTURE: &str = "TPMT_PUBLIC";

/// Decoded view of an ECC signing key's `TPMT_PUBLIC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubArea {
    /// Signing algorithm, from the ECDSA scheme's hash.
    pub algorithm: Algorithm,
    pub curve: EccCurve,
    /// Hash used to compute the object name.
    pub name_alg: HashAlg,
    pub object_attributes: u32,
    pub auth_policy: Vec<u8>,
    /// Uncompressed SEC1 point, `0x04 || X || Y`.
    pub public_key: Vec<u8>,
}

impl PubArea {
    /// Parses the public point into a verification key.
    pub fn verifying_key(&self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_sec1_bytes(self.curve, &self.public_key)
    }
}

/// Marshals a `TPMT_PUBLIC` describing `key` as an ECDSA signing key for
/// `alg`.
///
/// # Errors
///
/// * `TpmError::KeyAlgorithmMismatch` - If `key` is not on the curve `alg` uses
pub fn encode_pub_area(alg: Algorithm, key: &PublicKey) -> Result<Vec<u8>, TpmError> {
    let curve = key.curve();
    if alg.curve() != curve {
        return Err(TpmError::KeyAlgorithmMismatch {
            algorithm: alg.name(),
            curve: curve.name(),
        });
    }
    let (x, y) = key.coordinates();
    let hash = alg.hash().tpm_id();

    let mut w = Writer::with_capacity(MIN_PUB_AREA_SIZE + x.len() + y.len());
    w.u16(tpm_alg::ECC)
        .u16(hash)
        .u32(SIGNING_KEY_ATTRIBUTES)
        .tpm2b("authPolicy", &[])?;
    // TPMS_ECC_PARMS
    w.u16(tpm_alg::NULL)
        .u16(tpm_alg::ECDSA)
        .u16(hash)
        .u16(curve.tpm_id())
        .u16(tpm_alg::NULL);
    // TPMS_ECC_POINT
    w.tpm2b("x", &x)?.tpm2b("y", &y)?;
    Ok(w.into_inner())
}

/// Unmarshals a `TPMT_PUBLIC` for an ECDSA signing key.
///
/// # Errors
///
/// * `TpmError::Truncated` - If `bytes` is shorter than the structure
/// * `TpmError::UnknownAlgorithm` - If the type is not ECC, the scheme not
///   ECDSA, or a hash not SHA-256/384/512
/// * `TpmError::UnknownCurve` - If the curve is not NIST P-256/384/521
/// * `TpmError::KeyAlgorithmMismatch` - If the scheme hash does not belong
///   to the curve
/// * `TpmError::InvalidPoint` - If the coordinates do not fit the curve
/// * `TpmError::TrailingBytes` - If bytes remain after the structure
pub fn decode_pub_area(bytes: &[u8]) -> Result<PubArea, TpmError> {
    let mut r = Reader::new(STRUCTURE, bytes);
    r.require_min(MIN_PUB_AREA_SIZE)?;

    expect_alg(&mut r, "type", tpm_alg::ECC)?;
    let name_alg = r.u16()?;
    let name_alg = HashAlg::from_tpm_id(name_alg).ok_or(TpmError::UnknownAlgorithm {
        field: "nameAlg",
        value: name_alg,
    })?;
    let object_attributes = r.u32()?;
    let auth_policy = r.tpm2b()?.to_vec();

    expect_alg(&mut r, "symmetric", tpm_alg::NULL)?;
    expect_alg(&mut r, "scheme", tpm_alg::ECDSA)?;
    let scheme_hash = r.u16()?;
    let algorithm = Algorithm::from_tpm_hash_alg(scheme_hash).ok_or(TpmError::UnknownAlgorithm {
        field: "scheme hash",
        value: scheme_hash,
    })?;
    let curve_id = r.u16()?;
    let curve = EccCurve::from_tpm_id(curve_id).ok_or(TpmError::UnknownCurve(curve_id))?;
    if algorithm.curve() != curve {
        return Err(TpmError::KeyAlgorithmMismatch {
            algorithm: algorithm.name(),
            curve: curve.name(),
        });
    }
    expect_alg(&mut r, "kdf", tpm_alg::NULL)?;

    let x = r.tpm2b()?;
    let y = r.tpm2b()?;
    r.finish()?;

    let size = curve.coordinate_size();
    if x.len() != size || y.len() != size {
        return Err(TpmError::InvalidPoint {
            expected: size,
            x_len: x.len(),
            y_len: y.len(),
        });
    }
    let mut public_key = Vec::with_capacity(1 + 2 * size);
    public_key.push(0x04);
    public_key.extend_from_slice(x);
    public_key.extend_from_slice(y);

    Ok(PubArea {
        algorithm,
        curve,
        name_alg,
        object_attributes,
        auth_policy,
        public_key,
    })
}

/// Computes the TPM object name of a marshalled public area:
/// `nameAlg || H_nameAlg(TPMT_PUBLIC)`.
pub fn object_name(pub_area: &[u8]) -> Result<Vec<u8>, TpmError> {
    let name_alg = decode_pub_area(pub_area)?.name_alg;
    let digest = name_alg.digest(pub_area);
    let mut name = Vec::with_capacity(2 + digest.len());
    name.extend_from_slice(&name_alg.tpm_id().to_be_bytes());
    name.extend_from_slice(&digest);
    Ok(name)
}

fn expect_alg(r: &mut Reader<'_>, field: &'static str, expected: u16) -> Result<(), TpmError> {
    let value = r.u16()?;
    if value != expected {
        return Err(TpmError::UnknownAlgorithm { field, value });
    }
    Ok(())
}
