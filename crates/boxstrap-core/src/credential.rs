use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use std::fmt;

/// Bytes of entropy behind every generated credential.
pub const CREDENTIAL_BYTES: usize = 16;

/// Random secret for the inbound's single user.
///
/// `Debug` is redacted so the value cannot leak through `tracing` fields or
/// error chains. The plaintext is only reachable through [`Credential::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn generate() -> Self {
        let mut bytes = [0u8; CREDENTIAL_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
