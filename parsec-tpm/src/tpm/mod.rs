//! Marshalling of the TPM 2.0 structures carried by Parsec TPM tokens.
//!
//! Everything here is a free function over byte buffers so the layouts can
//! be exercised without building a token.

mod attest;
mod buffer;
mod pub_area;
mod signature;

pub use attest::{
    decode_attest_info, decode_cert_info, encode_attest_info, encode_cert_info, AttestInfo,
    CertInfo, ClockInfo, PcrSelection,
};
pub use pub_area::{decode_pub_area, encode_pub_area, object_name, PubArea};
pub use signature::{decode_signature, encode_signature, TpmSignature};
