//! Parsec TPM attestation evidence
//!
//! This crate models the evidence a Parsec service produces with a TPM 2.0:
//! a key attestation token (KAT) certifying a key, and a platform
//! attestation token (PAT) quoting platform state. It validates the tokens,
//! carries them in JSON or CBOR envelopes, marshals the TPM structures they
//! embed, and signs and verifies them with ECDSA (ES256, ES384, ES512).

pub mod constants;
pub mod crypto;
mod encoding;
pub mod errors;
pub mod evidence;
pub mod kat;
pub mod pat;
#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;
mod token;
pub mod tpm;
pub mod ueid;
pub mod utils;

pub use crypto::{Algorithm, PrivateKey, PublicKey};
pub use errors::{CryptoError, EvidenceError, Result, TokenError, TokenKind, TpmError, UeidError};
pub use evidence::{Evidence, VerifyOptions};
pub use kat::{Kat, KatBuilder};
pub use pat::{Pat, PatBuilder};
