//! Secret values and secret-key generation
//!
//! Database passwords and the authentication keys/salts are wrapped in
//! [`Secret`] so they never show up in `Debug` output or log lines.

use rand::rngs::OsRng;
use rand::Rng;
use std::fmt;

/// Characters WordPress draws from when generating keys and salts
pub const SECRET_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-_ []{}<>~`+=,.;:/?|";

/// Length of generated keys and salts
pub const DEFAULT_SECRET_LENGTH: usize = 64;

const REDACTED: &str = "[REDACTED]";

/// A string value that must not be printed
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw value. Only call this at the point of hand-off.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Generate a random secret of `len` characters from [`SECRET_ALPHABET`]
///
/// Uses the operating system RNG.
pub fn generate_secret(len: usize) -> Secret {
    let mut rng = OsRng;
    let value: String = (0..len)
        .map(|_| SECRET_ALPHABET[rng.gen_range(0..SECRET_ALPHABET.len())] as char)
        .collect();
    Secret(value)
}
