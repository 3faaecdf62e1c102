//! UEID (Universal Entity ID) validation for token key identifiers.
//!
//! A UEID is a tagged byte string: the first byte selects the identifier
//! type and the type fixes the total length.

use crate::{constants::ueid_type, errors::UeidError};

const RAND_LENGTHS: &[usize] = &[17, 25, 33];
const EUI_LENGTHS: &[usize] = &[7];
const IMEI_LENGTHS: &[usize] = &[15];

/// Returns the accepted total lengths (tag byte included) for a UEID type,
/// or `None` if the type is not one we accept.
pub fn allowed_lengths(tag: u8) -> Option<&'static [usize]> {
    match tag {
        ueid_type::RAND => Some(RAND_LENGTHS),
        ueid_type::EUI => Some(EUI_LENGTHS),
        ueid_type::IMEI => Some(IMEI_LENGTHS),
        _ => None,
    }
}

/// Validates a UEID.
///
/// # Errors
///
/// * `UeidError::Empty` - If `ueid` has no bytes
/// * `UeidError::InvalidType` - If the type tag is not RAND, EUI or IMEI; the
///   offending tag is reported as-is
/// * `UeidError::InvalidLength` - If the length does not fit the type
pub fn validate(ueid: &[u8]) -> Result<(), UeidError> {
    let Some(&tag) = ueid.first() else {
        return Err(UeidError::Empty);
    };
    let expected = allowed_lengths(tag).ok_or(UeidError::InvalidType(tag))?;
    if !expected.contains(&ueid.len()) {
        return Err(UeidError::InvalidLength {
            ueid_type: tag,
            expected,
            actual: ueid.len(),
        });
    }
    Ok(())
}
