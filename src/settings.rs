use base64::{Engine as _, engine::general_purpose::STANDARD};
use secrecy::{ExposeSecret as _, SecretString};
use std::env::{self, VarError};

use super::{Algorithm, KeyMaterial};

/// Environment variable [`EnvSettings`] reads the key from, by default.
pub const KEY_VAR: &str = "ENCRYPTED_FIELD_KEY";

/// Environment variable [`EnvSettings`] reads the default algorithm identifier from, by
/// default.
pub const ALGORITHM_VAR: &str = "ENCRYPTED_FIELD_ALGORITHM";

/// Where the key and the default algorithm come from.
///
/// Both are looked up afresh on every encrypt and decrypt, so a changed setting takes effect
/// on the very next operation, and nothing in this crate keeps a copy of the key around.
pub trait Settings {
	/// The key to encrypt and decrypt with, if one is configured.
	fn key(&self) -> Option<KeyMaterial>;

	/// The identifier of the algorithm to use when a field doesn't specify one, and to
	/// decrypt envelopes that don't name their algorithm.
	fn default_algorithm(&self) -> Option<String>;
}

impl<S: Settings + ?Sized> Settings for &S {
	fn key(&self) -> Option<KeyMaterial> {
		(**self).key()
	}

	fn default_algorithm(&self) -> Option<String> {
		(**self).default_algorithm()
	}
}

/// [`Settings`] read from the process environment.
///
/// Environment variables are always text, so a key has to say how its bytes are encoded:
/// `base64:<standard base64>` or `hex:<hex digits>`.  Anything else (including a prefixed
/// value that doesn't decode) is handed over as a text key, which will be refused with
/// [`Error::InvalidKeyFormat`](crate::Error::InvalidKeyFormat) when it's used.  An empty
/// variable counts as unset.
#[derive(Clone, Debug)]
pub struct EnvSettings {
	key_var: String,
	algorithm_var: String,
}

impl EnvSettings {
	/// Read the key from `ENCRYPTED_FIELD_KEY` and the default algorithm from
	/// `ENCRYPTED_FIELD_ALGORITHM`.
	pub fn new() -> Self {
		Self::with_vars(KEY_VAR, ALGORITHM_VAR)
	}

	/// Read the key and default algorithm from differently-named variables.
	pub fn with_vars(key_var: impl Into<String>, algorithm_var: impl Into<String>) -> Self {
		Self {
			key_var: key_var.into(),
			algorithm_var: algorithm_var.into(),
		}
	}
}

impl Default for EnvSettings {
	fn default() -> Self {
		Self::new()
	}
}

impl Settings for EnvSettings {
	#[tracing::instrument(level = "trace")]
	fn key(&self) -> Option<KeyMaterial> {
		let value: SecretString = match env::var(&self.key_var) {
			Ok(v) if v.is_empty() => return None,
			Ok(v) => v.into(),
			Err(VarError::NotPresent) => {
				tracing::debug!(var = %self.key_var, "Key variable not set");
				return None;
			}
			Err(VarError::NotUnicode(v)) => v.to_string_lossy().into_owned().into(),
		};

		Some(decode_key(value))
	}

	#[tracing::instrument(level = "trace")]
	fn default_algorithm(&self) -> Option<String> {
		env::var(&self.algorithm_var).ok().filter(|v| !v.is_empty())
	}
}

fn decode_key(value: SecretString) -> KeyMaterial {
	let text = value.expose_secret();

	let bytes = if let Some(encoded) = text.strip_prefix("base64:") {
		STANDARD.decode(encoded).ok()
	} else if let Some(encoded) = text.strip_prefix("hex:") {
		hex::decode(encoded).ok()
	} else {
		None
	};

	match bytes {
		Some(bytes) => bytes.into(),
		None => {
			tracing::debug!("Key is not in an encoding we know how to decode");
			KeyMaterial::Text(value)
		}
	}
}

/// [`Settings`] fixed at construction time, for applications that load their configuration
/// themselves (and for tests).
#[derive(Clone, Debug, Default)]
pub struct StaticSettings {
	key: Option<KeyMaterial>,
	default_algorithm: Option<String>,
}

impl StaticSettings {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_key(mut self, key: impl Into<KeyMaterial>) -> Self {
		self.key = Some(key.into());
		self
	}

	pub fn with_default_algorithm(mut self, algorithm: Algorithm) -> Self {
		self.default_algorithm = Some(algorithm.identifier().to_string());
		self
	}
}

impl Settings for StaticSettings {
	fn key(&self) -> Option<KeyMaterial> {
		self.key.clone()
	}

	fn default_algorithm(&self) -> Option<String> {
		self.default_algorithm.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn key_bytes(key: Option<KeyMaterial>) -> Vec<u8> {
		match key {
			Some(KeyMaterial::Bytes(b)) => b.expose_secret().to_vec(),
			other => panic!("expected a byte key, got {other:?}"),
		}
	}

	// Each test uses its own variables, as tests run concurrently
	fn settings(name: &str) -> EnvSettings {
		EnvSettings::with_vars(
			format!("ENCRYPTED_FIELD_TEST_{name}_KEY"),
			format!("ENCRYPTED_FIELD_TEST_{name}_ALGORITHM"),
		)
	}

	fn set(var: &str, value: &str) {
		// SAFETY: every test touches only variables named after itself
		unsafe { env::set_var(var, value) }
	}

	#[test]
	fn unset() {
		let s = settings("UNSET");
		assert!(s.key().is_none());
		assert!(s.default_algorithm().is_none());
	}

	#[test]
	fn empty_is_unset() {
		let s = settings("EMPTY");
		set("ENCRYPTED_FIELD_TEST_EMPTY_KEY", "");
		set("ENCRYPTED_FIELD_TEST_EMPTY_ALGORITHM", "");

		assert!(s.key().is_none());
		assert!(s.default_algorithm().is_none());
	}

	#[test]
	fn base64_key() {
		let s = settings("BASE64");
		set("ENCRYPTED_FIELD_TEST_BASE64_KEY", "base64:AAECAw==");

		assert_eq!(vec![0, 1, 2, 3], key_bytes(s.key()));
	}

	#[test]
	fn hex_key() {
		let s = settings("HEX");
		set("ENCRYPTED_FIELD_TEST_HEX_KEY", "hex:00010203ff");

		assert_eq!(vec![0, 1, 2, 3, 255], key_bytes(s.key()));
	}

	#[test]
	fn text_key() {
		let s = settings("TEXT");
		set("ENCRYPTED_FIELD_TEST_TEXT_KEY", "correct horse battery staple");
		assert!(matches!(s.key(), Some(KeyMaterial::Text(_))));

		set("ENCRYPTED_FIELD_TEST_TEXT_KEY", "hex:not hex at all");
		assert!(matches!(s.key(), Some(KeyMaterial::Text(_))));
	}

	#[test]
	fn read_fresh_every_time() {
		let s = settings("FRESH");

		set("ENCRYPTED_FIELD_TEST_FRESH_ALGORITHM", "AGCM");
		assert_eq!(Some("AGCM".to_string()), s.default_algorithm());

		set("ENCRYPTED_FIELD_TEST_FRESH_ALGORITHM", "CC20P");
		assert_eq!(Some("CC20P".to_string()), s.default_algorithm());
	}

	#[test]
	fn static_settings() {
		let s = StaticSettings::new()
			.with_key([9u8; 16])
			.with_default_algorithm(Algorithm::AesEax);

		assert_eq!(vec![9u8; 16], key_bytes(s.key()));
		assert_eq!(Some("AEAX".to_string()), s.default_algorithm());
		assert!(StaticSettings::new().key().is_none());
	}
}
