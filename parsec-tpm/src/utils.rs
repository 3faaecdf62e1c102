use once_cell::sync::Lazy;

use crate::constants::PARSEC_TPM_REQUIRE_KEY_BINDING_KEY;

/// Process-wide default for the KAT key-binding check, read once from the
/// environment.
static REQUIRE_KEY_BINDING: Lazy<bool> = Lazy::new(|| {
    std::env::var(PARSEC_TPM_REQUIRE_KEY_BINDING_KEY).unwrap_or_default() == "true"
});

/// Determines whether evidence verification should also check the KAT key
/// binding when the caller did not say.
///
/// # Returns
///
/// * `true` if the `PARSEC_TPM_REQUIRE_KEY_BINDING` environment variable is
///   `"true"` at first use
/// * `false` otherwise
pub fn get_require_key_binding() -> bool {
    *REQUIRE_KEY_BINDING
}
