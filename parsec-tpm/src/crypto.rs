//! Signature dispatch over the closed set of supported ECDSA algorithms.
//!
//! Each [`Algorithm`] pins a curve and a digest: ES256 is P-256 with SHA-256,
//! ES384 is P-384 with SHA-384 and ES512 is P-521 with SHA-512. Adding an
//! algorithm means adding a variant here and handling it in every match.

use std::{fmt, str::FromStr};

use p256::ecdsa::signature::{Signer, Verifier};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::{
    constants::{cose_alg, tpm_alg, tpm_ecc_curve},
    errors::CryptoError,
};

/// Supported ECDSA signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Es256,
    Es384,
    Es512,
}

impl Algorithm {
    pub const ALL: [Self; 3] = [Self::Es256, Self::Es384, Self::Es512];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
        }
    }

    /// The COSE algorithm identifier.
    pub const fn cose_id(self) -> i64 {
        match self {
            Self::Es256 => cose_alg::ES256,
            Self::Es384 => cose_alg::ES384,
            Self::Es512 => cose_alg::ES512,
        }
    }

    /// The digest signed by this algorithm.
    pub const fn hash(self) -> HashAlg {
        match self {
            Self::Es256 => HashAlg::Sha256,
            Self::Es384 => HashAlg::Sha384,
            Self::Es512 => HashAlg::Sha512,
        }
    }

    /// Maps a TPM signing scheme hash back to the algorithm using it.
    pub fn from_tpm_hash_alg(hash_alg: u16) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.hash().tpm_id() == hash_alg)
    }

    pub const fn curve(self) -> EccCurve {
        match self {
            Self::Es256 => EccCurve::NistP256,
            Self::Es384 => EccCurve::NistP384,
            Self::Es512 => EccCurve::NistP521,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for Algorithm {
    type Error = CryptoError;

    fn try_from(cose_id: i64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.cose_id() == cose_id)
            .ok_or(CryptoError::UnsupportedAlgorithm(cose_id))
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CryptoError::UnsupportedAlgorithmName(s.to_string()))
    }
}

/// TPM hash algorithms (`TPM_ALG_SHA*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlg {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlg {
    pub const fn tpm_id(self) -> u16 {
        match self {
            Self::Sha256 => tpm_alg::SHA256,
            Self::Sha384 => tpm_alg::SHA384,
            Self::Sha512 => tpm_alg::SHA512,
        }
    }

    pub fn from_tpm_id(id: u16) -> Option<Self> {
        [Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|hash| hash.tpm_id() == id)
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// NIST curves a TPM public area may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EccCurve {
    NistP256,
    NistP384,
    NistP521,
}

impl EccCurve {
    pub const fn name(self) -> &'static str {
        match self {
            Self::NistP256 => "P-256",
            Self::NistP384 => "P-384",
            Self::NistP521 => "P-521",
        }
    }

    pub const fn tpm_id(self) -> u16 {
        match self {
            Self::NistP256 => tpm_ecc_curve::NIST_P256,
            Self::NistP384 => tpm_ecc_curve::NIST_P384,
            Self::NistP521 => tpm_ecc_curve::NIST_P521,
        }
    }

    pub fn from_tpm_id(id: u16) -> Option<Self> {
        [Self::NistP256, Self::NistP384, Self::NistP521]
            .into_iter()
            .find(|curve| curve.tpm_id() == id)
    }

    /// Size in bytes of a field element, and so of each point coordinate
    /// and each ECDSA signature scalar.
    pub const fn coordinate_size(self) -> usize {
        match self {
            Self::NistP256 => 32,
            Self::NistP384 => 48,
            Self::NistP521 => 66,
        }
    }
}

impl fmt::Display for EccCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ECDSA verification key on one of the supported curves.
#[derive(Clone)]
pub enum PublicKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(p521::ecdsa::VerifyingKey),
}

impl PublicKey {
    pub fn curve(&self) -> EccCurve {
        match self {
            Self::P256(_) => EccCurve::NistP256,
            Self::P384(_) => EccCurve::NistP384,
            Self::P521(_) => EccCurve::NistP521,
        }
    }

    /// Parses a SEC1-encoded point on `curve`.
    pub fn from_sec1_bytes(curve: EccCurve, bytes: &[u8]) -> Result<Self, CryptoError> {
        let invalid = |source| CryptoError::InvalidKey {
            curve: curve.name(),
            source,
        };
        Ok(match curve {
            EccCurve::NistP256 => {
                Self::P256(p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes).map_err(invalid)?)
            }
            EccCurve::NistP384 => {
                Self::P384(p384::ecdsa::VerifyingKey::from_sec1_bytes(bytes).map_err(invalid)?)
            }
            EccCurve::NistP521 => {
                Self::P521(p521::ecdsa::VerifyingKey::from_sec1_bytes(bytes).map_err(invalid)?)
            }
        })
    }

    /// The uncompressed SEC1 encoding, `0x04 || X || Y`.
    pub fn to_sec1_uncompressed(&self) -> Vec<u8> {
        match self {
            Self::P256(key) => key.to_encoded_point(false).as_bytes().to_vec(),
            Self::P384(key) => key.to_encoded_point(false).as_bytes().to_vec(),
            Self::P521(key) => key.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// Splits the public point into its big-endian `(X, Y)` coordinates.
    pub fn coordinates(&self) -> (Vec<u8>, Vec<u8>) {
        let size = self.curve().coordinate_size();
        let sec1 = self.to_sec1_uncompressed();
        // Uncompressed SEC1 is always 1 + 2 * size bytes.
        let (x, y) = sec1[1..].split_at(size);
        (x.to_vec(), y.to_vec())
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.curve() == other.curve() && self.to_sec1_uncompressed() == other.to_sec1_uncompressed()
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("curve", &self.curve())
            .field("sec1", &hex::encode(self.to_sec1_uncompressed()))
            .finish()
    }
}

/// An ECDSA signing key on one of the supported curves.
pub enum PrivateKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    P521(p521::ecdsa::SigningKey),
}

impl PrivateKey {
    pub fn curve(&self) -> EccCurve {
        match self {
            Self::P256(_) => EccCurve::NistP256,
            Self::P384(_) => EccCurve::NistP384,
            Self::P521(_) => EccCurve::NistP521,
        }
    }

    /// Loads a private scalar given as big-endian bytes.
    pub fn from_slice(curve: EccCurve, scalar: &[u8]) -> Result<Self, CryptoError> {
        let invalid = |source| CryptoError::InvalidKey {
            curve: curve.name(),
            source,
        };
        Ok(match curve {
            EccCurve::NistP256 => {
                Self::P256(p256::ecdsa::SigningKey::from_slice(scalar).map_err(invalid)?)
            }
            EccCurve::NistP384 => {
                Self::P384(p384::ecdsa::SigningKey::from_slice(scalar).map_err(invalid)?)
            }
            EccCurve::NistP521 => {
                Self::P521(p521::ecdsa::SigningKey::from_slice(scalar).map_err(invalid)?)
            }
        })
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::P256(key) => PublicKey::P256(p256::ecdsa::VerifyingKey::from(key)),
            Self::P384(key) => PublicKey::P384(p384::ecdsa::VerifyingKey::from(key)),
            Self::P521(key) => PublicKey::P521(p521::ecdsa::VerifyingKey::from(key)),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("curve", &self.curve())
            .finish_non_exhaustive()
    }
}

impl From<p256::ecdsa::SigningKey> for PrivateKey {
    fn from(key: p256::ecdsa::SigningKey) -> Self {
        Self::P256(key)
    }
}

impl From<p384::ecdsa::SigningKey> for PrivateKey {
    fn from(key: p384::ecdsa::SigningKey) -> Self {
        Self::P384(key)
    }
}

impl From<p521::ecdsa::SigningKey> for PrivateKey {
    fn from(key: p521::ecdsa::SigningKey) -> Self {
        Self::P521(key)
    }
}

/// Raw ECDSA signature scalars, each `coordinate_size` bytes, big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

fn ensure_curve(alg: Algorithm, curve: EccCurve) -> Result<(), CryptoError> {
    if alg.curve() != curve {
        return Err(CryptoError::KeyMismatch {
            algorithm: alg.name(),
            curve: curve.name(),
        });
    }
    Ok(())
}

fn split_scalars(bytes: &[u8]) -> EcdsaSignature {
    let (r, s) = bytes.split_at(bytes.len() / 2);
    EcdsaSignature {
        r: r.to_vec(),
        s: s.to_vec(),
    }
}

/// Signs `data` with `key`, hashing it with the digest `alg` pins.
///
/// # Errors
///
/// * `CryptoError::KeyMismatch` - If `key` is not on the curve of `alg`
/// * `CryptoError::Backend` - If the ECDSA implementation fails
#[tracing::instrument(level = "debug", skip(alg, key, data), fields(alg = %alg, len = data.len()))]
pub fn sign(alg: Algorithm, key: &PrivateKey, data: &[u8]) -> Result<EcdsaSignature, CryptoError> {
    ensure_curve(alg, key.curve())?;
    let signature = match key {
        PrivateKey::P256(key) => {
            let sig: p256::ecdsa::Signature = key.try_sign(data)?;
            split_scalars(&sig.to_bytes())
        }
        PrivateKey::P384(key) => {
            let sig: p384::ecdsa::Signature = key.try_sign(data)?;
            split_scalars(&sig.to_bytes())
        }
        PrivateKey::P521(key) => {
            let sig: p521::ecdsa::Signature = key.try_sign(data)?;
            split_scalars(&sig.to_bytes())
        }
    };
    Ok(signature)
}

/// Checks `signature` over `data` against `key`.
///
/// Returns `Ok(false)` when the signature is well formed but does not verify.
///
/// # Errors
///
/// * `CryptoError::KeyMismatch` - If `key` is not on the curve of `alg`
/// * `CryptoError::Backend` - If the scalars are not a valid signature encoding
#[tracing::instrument(level = "debug", skip(alg, key, data, signature), fields(alg = %alg, len = data.len()))]
pub fn verify(
    alg: Algorithm,
    key: &PublicKey,
    data: &[u8],
    signature: &EcdsaSignature,
) -> Result<bool, CryptoError> {
    ensure_curve(alg, key.curve())?;
    let mut scalars = Vec::with_capacity(signature.r.len() + signature.s.len());
    scalars.extend_from_slice(&signature.r);
    scalars.extend_from_slice(&signature.s);
    let verified = match key {
        PublicKey::P256(key) => {
            let sig = p256::ecdsa::Signature::from_slice(&scalars)?;
            key.verify(data, &sig).is_ok()
        }
        PublicKey::P384(key) => {
            let sig = p384::ecdsa::Signature::from_slice(&scalars)?;
            key.verify(data, &sig).is_ok()
        }
        PublicKey::P521(key) => {
            let sig = p521::ecdsa::Signature::from_slice(&scalars)?;
            key.verify(data, &sig).is_ok()
        }
    };
    Ok(verified)
}
