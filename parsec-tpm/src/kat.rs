use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    crypto::{Algorithm, PublicKey},
    errors::TokenError,
    token,
    tpm::{self, CertInfo, PubArea},
};

const PUB_AREA: &str = "public area";
const CERT_INFO: &str = "certify info";

/// Key Attestation Token.
///
/// Evidence that a key lives in TPM-protected storage: the key's
/// `TPMT_PUBLIC`, a `TPM2_Certify` result over it (`certInfo`) and the
/// attesting key's signature over that result.
///
/// Every setter validates its argument and leaves the token untouched on
/// failure. Tokens decoded from the wire bypass the setters, so callers must
/// run [`Kat::validate`] before trusting them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) tpm_ver: Option<String>,
    #[serde(
        default,
        with = "crate::encoding::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) kid: Option<Vec<u8>>,
    #[serde(
        default,
        with = "crate::encoding::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) sig: Option<Vec<u8>>,
    #[serde(default, with = "crate::encoding", skip_serializing_if = "Vec::is_empty")]
    pub(crate) pub_area: Vec<u8>,
    #[serde(default, with = "crate::encoding", skip_serializing_if = "Vec::is_empty")]
    pub(crate) cert_info: Vec<u8>,
}

impl Kat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> KatBuilder {
        KatBuilder::default()
    }

    pub fn tpm_ver(&self) -> Option<&str> {
        self.tpm_ver.as_deref()
    }

    pub fn key_id(&self) -> Option<&[u8]> {
        self.kid.as_deref()
    }

    pub fn sig(&self) -> Option<&[u8]> {
        self.sig.as_deref()
    }

    /// The marshalled `TPMT_PUBLIC` of the attested key.
    pub fn pub_area(&self) -> &[u8] {
        &self.pub_area
    }

    /// The marshalled certify `TPMS_ATTEST`, which is what `sig` signs.
    pub fn cert_info(&self) -> &[u8] {
        &self.cert_info
    }

    pub fn set_tpm_ver(&mut self, tpm_ver: impl Into<String>) -> Result<(), TokenError> {
        let tpm_ver = tpm_ver.into();
        token::check_tpm_ver(&tpm_ver)?;
        self.tpm_ver = Some(tpm_ver);
        Ok(())
    }

    pub fn set_key_id(&mut self, kid: &[u8]) -> Result<(), TokenError> {
        token::check_key_id(kid)?;
        self.kid = Some(kid.to_vec());
        Ok(())
    }

    pub fn set_sig(&mut self, sig: &[u8]) -> Result<(), TokenError> {
        token::check_sig(sig)?;
        self.sig = Some(sig.to_vec());
        Ok(())
    }

    /// Stores the `TPMT_PUBLIC` describing `key` as an `alg` signing key.
    pub fn encode_pub_area(&mut self, alg: Algorithm, key: &PublicKey) -> Result<(), TokenError> {
        self.pub_area = tpm::encode_pub_area(alg, key).map_err(|source| TokenError::Encode {
            structure: PUB_AREA,
            source,
        })?;
        Ok(())
    }

    /// Stores a certify `TPMS_ATTEST` carrying `nonce`.
    ///
    /// When a public area is already set, the certify info names that
    /// object, so [`Kat::check_key_binding`] holds for the result.
    pub fn encode_cert_info(&mut self, nonce: &[u8]) -> Result<(), TokenError> {
        let name = if self.pub_area.is_empty() {
            Vec::new()
        } else {
            tpm::object_name(&self.pub_area).map_err(|source| TokenError::Decode {
                structure: PUB_AREA,
                source,
            })?
        };
        self.cert_info = tpm::encode_cert_info(nonce, &name).map_err(|source| {
            TokenError::Encode {
                structure: CERT_INFO,
                source,
            }
        })?;
        Ok(())
    }

    pub fn decode_pub_area(&self) -> Result<PubArea, TokenError> {
        tpm::decode_pub_area(&self.pub_area).map_err(|source| TokenError::Decode {
            structure: PUB_AREA,
            source,
        })
    }

    pub fn decode_cert_info(&self) -> Result<CertInfo, TokenError> {
        tpm::decode_cert_info(&self.cert_info).map_err(|source| TokenError::Decode {
            structure: CERT_INFO,
            source,
        })
    }

    /// Checks that the certify info names the object in the public area,
    /// i.e. that the signature really covers the key this token carries.
    pub fn check_key_binding(&self) -> Result<(), TokenError> {
        let name = tpm::object_name(&self.pub_area).map_err(|source| TokenError::Decode {
            structure: PUB_AREA,
            source,
        })?;
        if self.decode_cert_info()?.name != name {
            return Err(TokenError::KeyBindingMismatch);
        }
        Ok(())
    }

    /// Checks the token's invariants, reporting the first that fails:
    /// version set, version non-empty, KID set and a valid UEID, signature
    /// set and non-empty.
    pub fn validate(&self) -> Result<(), TokenError> {
        token::validate_fields(self.tpm_ver(), self.key_id(), self.sig())
    }

    /// Verifies `sig` over the raw `certInfo` bytes with `key`.
    #[instrument(level = "debug", name = "kat_verify", skip_all, fields(curve = %key.curve()))]
    pub fn verify(&self, key: &PublicKey) -> Result<(), TokenError> {
        token::verify_attestation(self.sig(), &self.cert_info, CERT_INFO, key)?;
        debug!("key attestation token signature verified");
        Ok(())
    }
}

/// Collects KAT fields and checks them all at once in [`KatBuilder::build`].
#[derive(Debug, Default)]
pub struct KatBuilder {
    kat: Kat,
}

impl KatBuilder {
    pub fn tpm_ver(mut self, tpm_ver: impl Into<String>) -> Self {
        self.kat.tpm_ver = Some(tpm_ver.into());
        self
    }

    pub fn key_id(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kat.kid = Some(kid.into());
        self
    }

    pub fn sig(mut self, sig: impl Into<Vec<u8>>) -> Self {
        self.kat.sig = Some(sig.into());
        self
    }

    pub fn pub_area(mut self, pub_area: impl Into<Vec<u8>>) -> Self {
        self.kat.pub_area = pub_area.into();
        self
    }

    pub fn cert_info(mut self, cert_info: impl Into<Vec<u8>>) -> Self {
        self.kat.cert_info = cert_info.into();
        self
    }

    pub fn build(self) -> Result<Kat, TokenError> {
        self.kat.validate()?;
        Ok(self.kat)
    }
}
