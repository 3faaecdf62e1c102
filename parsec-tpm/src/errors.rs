use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvidenceError>;

/// Which of the two tokens an evidence-level failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Kat,
    Pat,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kat => write!(f, "key attestation token"),
            Self::Pat => write!(f, "platform attestation token"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UeidError {
    #[error("empty UEID")]
    Empty,
    #[error("invalid UEID type {0}")]
    InvalidType(u8),
    #[error("invalid length for UEID type {ueid_type}: expected {expected:?} bytes, got {actual} bytes")]
    InvalidLength {
        ueid_type: u8,
        expected: &'static [usize],
        actual: usize,
    },
}

/// Failures of the TPM structure codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TpmError {
    #[error("truncated {structure}: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        structure: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("{count} trailing bytes after {structure}")]
    TrailingBytes {
        structure: &'static str,
        count: usize,
    },
    #[error("unknown TPM algorithm {field}: {value:#06x}")]
    UnknownAlgorithm { field: &'static str, value: u16 },
    #[error("unknown TPM ECC curve: {0:#06x}")]
    UnknownCurve(u16),
    #[error("invalid ECC point: expected {expected}-byte coordinates, got {x_len} and {y_len}")]
    InvalidPoint {
        expected: usize,
        x_len: usize,
        y_len: usize,
    },
    #[error("invalid ECDSA signature: expected scalars of at most {expected} bytes, got {r_len} and {s_len}")]
    InvalidScalar {
        expected: usize,
        r_len: usize,
        s_len: usize,
    },
    #[error("algorithm {algorithm} cannot describe a key on curve {curve}")]
    KeyAlgorithmMismatch {
        algorithm: &'static str,
        curve: &'static str,
    },
    #[error("bad TPMS_ATTEST magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic { expected: u32, actual: u32 },
    #[error("unexpected attestation type: expected {expected:#06x}, got {actual:#06x}")]
    UnexpectedAttestType { expected: u16, actual: u16 },
    #[error("empty nonce supplied")]
    EmptyNonce,
    #[error("nonce too large: {size} bytes, at most {max} allowed")]
    NonceTooLarge { size: usize, max: usize },
    #[error("PCR index {0} outside the selectable range 0 to 23")]
    InvalidPcr(u8),
    #[error("{field} too large for a TPM2B: {size} bytes")]
    FieldTooLarge { field: &'static str, size: usize },
}

/// Failures of the signature dispatcher and the ECDSA backend.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("unsupported algorithm for signing: {0}")]
    UnsupportedAlgorithm(i64),
    #[error("unsupported algorithm name: {0}")]
    UnsupportedAlgorithmName(String),
    #[error("{algorithm} does not match a {curve} key")]
    KeyMismatch {
        algorithm: &'static str,
        curve: &'static str,
    },
    // `ecdsa::Error` is shared by the p256, p384 and p521 crates.
    #[error("invalid {curve} key encoding")]
    InvalidKey {
        curve: &'static str,
        #[source]
        source: p256::ecdsa::Error,
    },
    #[error("ECDSA backend failure")]
    Backend(#[from] p256::ecdsa::Error),
}

/// Failures of token-level operations (KAT and PAT).
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("TPM Version not set")]
    MissingTpmVersion,
    #[error("Empty TPM Version")]
    EmptyTpmVersion,
    #[error("KID not set")]
    MissingKeyId,
    #[error("invalid KID: failed to validate UEID: {0}")]
    InvalidKeyId(#[source] UeidError),
    #[error("signature not set")]
    MissingSignature,
    #[error("zero len signature bytes")]
    ZeroLengthSignature,
    #[error("{0} not set")]
    MissingStructure(&'static str),
    #[error("failed to encode {structure}: {source}")]
    Encode {
        structure: &'static str,
        #[source]
        source: TpmError,
    },
    #[error("failed to decode {structure}: {source}")]
    Decode {
        structure: &'static str,
        #[source]
        source: TpmError,
    },
    #[error("certify info does not name the attested public area")]
    KeyBindingMismatch,
    #[error("nonce mismatch: expected {expected}, got {actual}")]
    NonceMismatch { expected: String, actual: String },
    #[error("signature hash algorithm {signature:#06x} does not match key algorithm {key}")]
    SignatureAlgorithmMismatch { signature: u16, key: &'static str },
    #[error("signature verification failed")]
    SignatureMismatch,
    #[error("cryptographic failure: {0}")]
    Crypto(#[from] CryptoError),
}

/// Top-level failures of the evidence aggregate.
#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("incomplete evidence: missing {0}")]
    IncompleteEvidence(TokenKind),
    #[error("validation failed: invalid {kind}: {source}")]
    InvalidToken {
        kind: TokenKind,
        #[source]
        source: TokenError,
    },
    #[error("missing Parsec TPM {0}")]
    MissingToken(TokenKind),
    #[error("failed to verify signature on {kind}: {source}")]
    VerificationFailed {
        kind: TokenKind,
        #[source]
        source: TokenError,
    },
    #[error("JSON decoding of Parsec TPM evidence failed: {0}")]
    JsonDecode(#[source] serde_json::Error),
    #[error("JSON encoding of Parsec TPM evidence failed: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error("CBOR decoding of Parsec TPM evidence failed: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),
    #[error("CBOR encoding of Parsec TPM evidence failed: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),
    #[error("unsupported algorithm for signing: {0}")]
    UnsupportedAlgorithm(i64),
    #[error("Sign failed: {0}")]
    SigningFailed(#[source] CryptoError),
    #[error("failed to encode TPMT_SIGNATURE: {0}")]
    SignatureEncoding(#[source] TpmError),
}
