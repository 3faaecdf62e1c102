use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    crypto::PublicKey,
    errors::TokenError,
    token,
    tpm::{self, AttestInfo, PcrSelection},
};

const ATTEST_INFO: &str = "attestation info";

/// Platform Attestation Token.
///
/// Evidence about platform state: a `TPM2_Quote` result over a PCR
/// selection (`attestInfo`) and the attesting key's signature over it.
/// Follows the same setter and validation rules as [`crate::Kat`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pat {
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
    pub(crate) attest_info: Vec<u8>,
}

impl Pat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> PatBuilder {
        PatBuilder::default()
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

    /// The marshalled quote `TPMS_ATTEST`, which is what `sig` signs.
    pub fn attest_info(&self) -> &[u8] {
        &self.attest_info
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

    /// Stores a quote `TPMS_ATTEST` over `pcr_selections` carrying `nonce`.
    pub fn encode_attest_info(
        &mut self,
        nonce: &[u8],
        pcr_selections: &[PcrSelection],
        pcr_digest: &[u8],
    ) -> Result<(), TokenError> {
        self.attest_info = tpm::encode_attest_info(nonce, pcr_selections, pcr_digest).map_err(
            |source| TokenError::Encode {
                structure: ATTEST_INFO,
                source,
            },
        )?;
        Ok(())
    }

    pub fn decode_attest_info(&self) -> Result<AttestInfo, TokenError> {
        tpm::decode_attest_info(&self.attest_info).map_err(|source| TokenError::Decode {
            structure: ATTEST_INFO,
            source,
        })
    }

    /// Same invariants, in the same order, as [`crate::Kat::validate`].
    pub fn validate(&self) -> Result<(), TokenError> {
        token::validate_fields(self.tpm_ver(), self.key_id(), self.sig())
    }

    /// Verifies `sig` over the raw `attestInfo` bytes with `key`.
    #[instrument(level = "debug", name = "pat_verify", skip_all, fields(curve = %key.curve()))]
    pub fn verify(&self, key: &PublicKey) -> Result<(), TokenError> {
        token::verify_attestation(self.sig(), &self.attest_info, ATTEST_INFO, key)?;
        debug!("platform attestation token signature verified");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PatBuilder {
    pat: Pat,
}

impl PatBuilder {
    pub fn tpm_ver(mut self, tpm_ver: impl Into<String>) -> Self {
        self.pat.tpm_ver = Some(tpm_ver.into());
        self
    }

    pub fn key_id(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.pat.kid = Some(kid.into());
        self
    }

    pub fn sig(mut self, sig: impl Into<Vec<u8>>) -> Self {
        self.pat.sig = Some(sig.into());
        self
    }

    pub fn attest_info(mut self, attest_info: impl Into<Vec<u8>>) -> Self {
        self.pat.attest_info = attest_info.into();
        self
    }

    pub fn build(self) -> Result<Pat, TokenError> {
        self.pat.validate()?;
        Ok(self.pat)
    }
}
