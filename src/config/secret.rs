//! Credential wrappers
//!
//! The source password and the sink access token are held in [`SecretString`]:
//! a `secrecy::Secret` that zeroes its memory on drop, never prints through
//! `Debug`, and must be opened explicitly with `expose_secret()`.
//!
//! ```rust
//! use cartograph::config::{secret_string, mask};
//! use secrecy::ExposeSecret;
//!
//! let token = secret_string("ya29.a0AfH6SMB".to_string());
//! assert_eq!(token.expose_secret().as_ref(), "ya29.a0AfH6SMB");
//! assert_eq!(mask(&token), "ya29…(14 chars)");
//! ```

use secrecy::{CloneableSecret, DebugSecret, ExposeSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// String payload that can live inside a `Secret`
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A zeroize-on-drop, debug-redacted string
pub type SecretString = Secret<SecretValue>;

/// Wraps a plain string as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// Wraps an optional plain string
#[inline]
pub fn secret_string_opt(value: Option<String>) -> Option<SecretString> {
    value.map(secret_string)
}

/// Printable hint of a secret: its first four characters and its length
pub fn mask(secret: &SecretString) -> String {
    let raw = secret.expose_secret().as_ref();
    let len = raw.chars().count();
    if len <= 8 {
        return format!("***({len} chars)");
    }
    let prefix: String = raw.chars().take(4).collect();
    format!("{prefix}…({len} chars)")
}
