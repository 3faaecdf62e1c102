/// Environment variable key controlling the KAT key-binding check.
///
/// When set to `"true"`, evidence verification also checks that the KAT
/// certify info names the object described by its public area, unless the
/// caller overrides it through `VerifyOptions`.
pub const PARSEC_TPM_REQUIRE_KEY_BINDING_KEY: &str = "PARSEC_TPM_REQUIRE_KEY_BINDING";

/// Magic value opening every `TPMS_ATTEST` structure (`TPM_GENERATED_VALUE`).
pub const TPM_GENERATED_VALUE: u32 = 0xff54_4347;

/// `TPM_ST_ATTEST_CERTIFY`, the attestation type of a `TPM2_Certify` result.
pub const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

/// `TPM_ST_ATTEST_QUOTE`, the attestation type of a `TPM2_Quote` result.
pub const TPM_ST_ATTEST_QUOTE: u16 = 0x8018;

/// TPM algorithm identifiers used by the structures we encode.
pub mod tpm_alg {
    pub const SHA256: u16 = 0x000b;
    pub const SHA384: u16 = 0x000c;
    pub const SHA512: u16 = 0x000d;
    pub const NULL: u16 = 0x0010;
    pub const ECDSA: u16 = 0x0018;
    pub const ECC: u16 = 0x0023;
}

/// TPM elliptic curve identifiers (`TPM_ECC_CURVE`).
pub mod tpm_ecc_curve {
    pub const NIST_P256: u16 = 0x0003;
    pub const NIST_P384: u16 = 0x0004;
    pub const NIST_P521: u16 = 0x0005;
}

/// Object attributes for an attested signing key:
/// `fixedTPM | fixedParent | sensitiveDataOrigin | userWithAuth | sign`.
pub const SIGNING_KEY_ATTRIBUTES: u32 = 0x0004_0072;

/// COSE algorithm identifiers for the supported ECDSA variants.
pub mod cose_alg {
    pub const ES256: i64 = -7;
    pub const ES384: i64 = -35;
    pub const ES512: i64 = -36;
}

/// Largest nonce a `TPM2B_DATA` can carry (`sizeof(TPMT_HA)` for SHA-512).
pub const MAX_NONCE_SIZE: usize = 64;

/// Smallest possible `TPMT_PUBLIC` for an ECC key: every fixed field
/// present, empty auth policy and empty point coordinates.
pub const MIN_PUB_AREA_SIZE: usize = 24;

/// Smallest possible `TPMS_ATTEST`: magic, type, two empty `TPM2B`s,
/// clock info and firmware version, without the attested union.
pub const MIN_ATTEST_SIZE: usize = 4 + 2 + 2 + 2 + 17 + 8;

/// UEID type tags.
pub mod ueid_type {
    /// Random number, 16, 24 or 32 bytes.
    pub const RAND: u8 = 0x01;
    /// IEEE EUI (MAC address), 6 bytes.
    pub const EUI: u8 = 0x02;
    /// IMEI, 14 bytes.
    pub const IMEI: u8 = 0x03;
}

/// JSON/CBOR member name of the key attestation token.
pub const KAT_KEY: &str = "kat";

/// JSON/CBOR member name of the platform attestation token.
pub const PAT_KEY: &str = "pat";
