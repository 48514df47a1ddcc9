//! Ciphertext envelope wire format.
//!
//! Engine-produced ciphertext is a tagged string `vault:v{version}:{payload}`.
//! Detection is purely a marker-prefix check: anything not starting with
//! `vault:v` is plaintext, which is what lets old plaintext rows coexist with
//! encrypted rows during a migration window. A value that carries the marker
//! but is otherwise malformed is still treated as opaque ciphertext and handed
//! to the engine unparsed; it is never a client-side validation error.

/// Marker prefix identifying engine-produced ciphertext.
pub const CIPHERTEXT_MARKER: &str = "vault:v";

/// A parsed ciphertext envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<'a> {
    /// Key version the payload was encrypted under
    pub version: u64,
    /// Opaque base64 payload
    pub payload: &'a str,
}

/// Check whether a value carries the ciphertext marker.
///
/// This is the only distinction the client ever draws between plaintext and
/// ciphertext.
#[must_use]
pub fn is_ciphertext(value: &str) -> bool {
    value.starts_with(CIPHERTEXT_MARKER)
}

/// Parse a well-formed envelope into its version and payload.
///
/// Returns `None` for plaintext and for marker-prefixed values whose version
/// tag does not parse; callers needing the lenient marker check use
/// [`is_ciphertext`] instead.
#[must_use]
pub fn parse(value: &str) -> Option<Envelope<'_>> {
    let rest = value.strip_prefix(CIPHERTEXT_MARKER)?;
    let (version, payload) = rest.split_once(':')?;
    let version: u64 = version.parse().ok()?;
    Some(Envelope { version, payload })
}

/// Extract the key version tag from an envelope, if well formed.
#[must_use]
pub fn key_version(value: &str) -> Option<u64> {
    parse(value).map(|e| e.version)
}
