//! `TPMS_ATTEST` in its certify (KAT `certInfo`) and quote (PAT
//! `attestInfo`) forms.
//!
//! Both share the same header: magic, type, qualified signer, extra data
//! (the caller's nonce), clock info and firmware version. Only the
//! attested union differs.

use crate::{
    constants::{
        MAX_NONCE_SIZE, MIN_ATTEST_SIZE, TPM_GENERATED_VALUE, TPM_ST_ATTEST_CERTIFY,
        TPM_ST_ATTEST_QUOTE,
    },
    errors::TpmError,
};

use super::buffer::{Reader, Writer};

const STRUCTURE: &str = "TPMS_ATTEST";

/// Number of PCR select bytes we emit, covering PCRs 0 to 23.
const PCR_SELECT_SIZE: usize = 3;

/// `TPMS_CLOCK_INFO`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockInfo {
    pub clock: u64,
    pub reset_count: u32,
    pub restart_count: u32,
    pub safe: bool,
}

/// Decoded view of a certify `TPMS_ATTEST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    pub magic: u32,
    pub attest_type: u16,
    pub qualified_signer: Vec<u8>,
    pub extra_data: Vec<u8>,
    pub clock_info: ClockInfo,
    pub firmware_version: u64,
    /// Name of the certified object.
    pub name: Vec<u8>,
    pub qualified_name: Vec<u8>,
}

impl CertInfo {
    /// The nonce carried in `extraData`.
    pub fn nonce(&self) -> &[u8] {
        &self.extra_data
    }
}

/// One `TPMS_PCR_SELECTION`: a PCR bank and a bitmap of selected PCRs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcrSelection {
    pub hash_alg: u16,
    pub pcr_select: Vec<u8>,
}

impl PcrSelection {
    /// Selects `pcrs` in the bank using `hash_alg`.
    ///
    /// # Errors
    ///
    /// * `TpmError::InvalidPcr` - If an index is outside 0 to 23
    pub fn new(hash_alg: u16, pcrs: &[u8]) -> Result<Self, TpmError> {
        let mut pcr_select = vec![0u8; PCR_SELECT_SIZE];
        for &pcr in pcrs {
            let byte = pcr_select
                .get_mut(usize::from(pcr / 8))
                .ok_or(TpmError::InvalidPcr(pcr))?;
            *byte |= 1 << (pcr % 8);
        }
        Ok(Self {
            hash_alg,
            pcr_select,
        })
    }

    /// Indices of the selected PCRs, ascending.
    pub fn pcrs(&self) -> Vec<u32> {
        self.pcr_select
            .iter()
            .enumerate()
            .flat_map(|(i, byte)| {
                (0..8u32)
                    .filter(move |bit| byte & (1 << bit) != 0)
                    .map(move |bit| i as u32 * 8 + bit)
            })
            .collect()
    }
}

/// Decoded view of a quote `TPMS_ATTEST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestInfo {
    pub magic: u32,
    pub attest_type: u16,
    pub qualified_signer: Vec<u8>,
    pub extra_data: Vec<u8>,
    pub clock_info: ClockInfo,
    pub firmware_version: u64,
    pub pcr_selections: Vec<PcrSelection>,
    pub pcr_digest: Vec<u8>,
}

impl AttestInfo {
    /// The nonce carried in `extraData`.
    pub fn nonce(&self) -> &[u8] {
        &self.extra_data
    }
}

struct Header {
    magic: u32,
    attest_type: u16,
    qualified_signer: Vec<u8>,
    extra_data: Vec<u8>,
    clock_info: ClockInfo,
    firmware_version: u64,
}

fn check_nonce(nonce: &[u8]) -> Result<(), TpmError> {
    if nonce.is_empty() {
        return Err(TpmError::EmptyNonce);
    }
    if nonce.len() > MAX_NONCE_SIZE {
        return Err(TpmError::NonceTooLarge {
            size: nonce.len(),
            max: MAX_NONCE_SIZE,
        });
    }
    Ok(())
}

fn encode_header(w: &mut Writer, attest_type: u16, nonce: &[u8]) -> Result<(), TpmError> {
    check_nonce(nonce)?;
    let clock = ClockInfo::default();
    w.u32(TPM_GENERATED_VALUE)
        .u16(attest_type)
        .tpm2b("qualifiedSigner", &[])?
        .tpm2b("extraData", nonce)?
        .u64(clock.clock)
        .u32(clock.reset_count)
        .u32(clock.restart_count)
        .u8(u8::from(clock.safe))
        .u64(0);
    Ok(())
}

fn decode_header(r: &mut Reader<'_>, expected_type: u16) -> Result<Header, TpmError> {
    r.require_min(MIN_ATTEST_SIZE)?;
    let magic = r.u32()?;
    if magic != TPM_GENERATED_VALUE {
        return Err(TpmError::BadMagic {
            expected: TPM_GENERATED_VALUE,
            actual: magic,
        });
    }
    let attest_type = r.u16()?;
    if attest_type != expected_type {
        return Err(TpmError::UnexpectedAttestType {
            expected: expected_type,
            actual: attest_type,
        });
    }
    let qualified_signer = r.tpm2b()?.to_vec();
    let extra_data = r.tpm2b()?.to_vec();
    let clock_info = ClockInfo {
        clock: r.u64()?,
        reset_count: r.u32()?,
        restart_count: r.u32()?,
        safe: r.u8()? != 0,
    };
    let firmware_version = r.u64()?;
    Ok(Header {
        magic,
        attest_type,
        qualified_signer,
        extra_data,
        clock_info,
        firmware_version,
    })
}

/// Marshals a certify `TPMS_ATTEST` carrying `nonce` as extra data and
/// `name` as both the name and qualified name of the certified object.
///
/// # Errors
///
/// * `TpmError::EmptyNonce` - If `nonce` is empty
/// * `TpmError::NonceTooLarge` - If `nonce` exceeds `MAX_NONCE_SIZE`
pub fn encode_cert_info(nonce: &[u8], name: &[u8]) -> Result<Vec<u8>, TpmError> {
    let mut w = Writer::with_capacity(MIN_ATTEST_SIZE + nonce.len() + 4 + 2 * name.len());
    encode_header(&mut w, TPM_ST_ATTEST_CERTIFY, nonce)?;
    // TPMS_CERTIFY_INFO
    w.tpm2b("name", name)?.tpm2b("qualifiedName", name)?;
    Ok(w.into_inner())
}

/// Unmarshals a certify `TPMS_ATTEST`.
///
/// # Errors
///
/// * `TpmError::Truncated` - If `bytes` is shorter than the structure
/// * `TpmError::BadMagic` - If the magic is not `TPM_GENERATED_VALUE`
/// * `TpmError::UnexpectedAttestType` - If it is not a certify attestation
/// * `TpmError::TrailingBytes` - If bytes remain after the structure
pub fn decode_cert_info(bytes: &[u8]) -> Result<CertInfo, TpmError> {
    let mut r = Reader::new(STRUCTURE, bytes);
    let header = decode_header(&mut r, TPM_ST_ATTEST_CERTIFY)?;
    let name = r.tpm2b()?.to_vec();
    let qualified_name = r.tpm2b()?.to_vec();
    r.finish()?;
    Ok(CertInfo {
        magic: header.magic,
        attest_type: header.attest_type,
        qualified_signer: header.qualified_signer,
        extra_data: header.extra_data,
        clock_info: header.clock_info,
        firmware_version: header.firmware_version,
        name,
        qualified_name,
    })
}

/// Marshals a quote `TPMS_ATTEST` over `pcr_selections` with the combined
/// `pcr_digest`, carrying `nonce` as extra data.
///
/// # Errors
///
/// * `TpmError::EmptyNonce` - If `nonce` is empty
/// * `TpmError::NonceTooLarge` - If `nonce` exceeds `MAX_NONCE_SIZE`
/// * `TpmError::FieldTooLarge` - If a selection bitmap exceeds 255 bytes
pub fn encode_attest_info(
    nonce: &[u8],
    pcr_selections: &[PcrSelection],
    pcr_digest: &[u8],
) -> Result<Vec<u8>, TpmError> {
    let mut w = Writer::with_capacity(MIN_ATTEST_SIZE + nonce.len() + 64 + pcr_digest.len());
    encode_header(&mut w, TPM_ST_ATTEST_QUOTE, nonce)?;
    // TPML_PCR_SELECTION
    w.u32(pcr_selections.len() as u32);
    for selection in pcr_selections {
        let size = u8::try_from(selection.pcr_select.len()).map_err(|_| {
            TpmError::FieldTooLarge {
                field: "pcrSelect",
                size: selection.pcr_select.len(),
            }
        })?;
        w.u16(selection.hash_alg).u8(size).bytes(&selection.pcr_select);
    }
    w.tpm2b("pcrDigest", pcr_digest)?;
    Ok(w.into_inner())
}

/// Unmarshals a quote `TPMS_ATTEST`.
///
/// # Errors
///
/// Same as [`decode_cert_info`], with the quote attestation type expected.
pub fn decode_attest_info(bytes: &[u8]) -> Result<AttestInfo, TpmError> {
    let mut r = Reader::new(STRUCTURE, bytes);
    let header = decode_header(&mut r, TPM_ST_ATTEST_QUOTE)?;
    let count = r.u32()? as usize;
    // Each selection is at least 3 bytes; never trust `count` for allocation.
    let mut pcr_selections = Vec::with_capacity(count.min(r.remaining() / 3));
    for _ in 0..count {
        let hash_alg = r.u16()?;
        let size = r.u8()? as usize;
        let pcr_select = r.take(size)?.to_vec();
        pcr_selections.push(PcrSelection {
            hash_alg,
            pcr_select,
        });
    }
    let pcr_digest = r.tpm2b()?.to_vec();
    r.finish()?;
    Ok(AttestInfo {
        magic: header.magic,
        attest_type: header.attest_type,
        qualified_signer: header.qualified_signer,
        extra_data: header.extra_data,
        clock_info: header.clock_info,
        firmware_version: header.firmware_version,
        pcr_selections,
        pcr_digest,
    })
}
