use secrecy::{ExposeSecret as _, SecretSlice, SecretString};

use super::{Algorithm, AlgorithmSpec, Error};

/// Key material as handed over by whatever holds the keys.
///
/// Only [`KeyMaterial::Bytes`] can ever be used to encrypt or decrypt; a key that arrives as
/// text is rejected rather than guessed at (is it hex? base64? a passphrase?).
#[derive(Debug)]
pub enum KeyMaterial {
	Bytes(SecretSlice<u8>),
	Text(SecretString),
}

impl Clone for KeyMaterial {
	fn clone(&self) -> Self {
		match self {
			KeyMaterial::Bytes(b) => KeyMaterial::Bytes(b.expose_secret().to_vec().into()),
			KeyMaterial::Text(s) => KeyMaterial::Text(s.expose_secret().into()),
		}
	}
}

impl From<Vec<u8>> for KeyMaterial {
	fn from(k: Vec<u8>) -> Self {
		KeyMaterial::Bytes(k.into())
	}
}

impl From<&[u8]> for KeyMaterial {
	fn from(k: &[u8]) -> Self {
		KeyMaterial::Bytes(k.to_vec().into())
	}
}

impl<const N: usize> From<[u8; N]> for KeyMaterial {
	fn from(k: [u8; N]) -> Self {
		KeyMaterial::Bytes(k.to_vec().into())
	}
}

impl From<String> for KeyMaterial {
	fn from(k: String) -> Self {
		KeyMaterial::Text(k.into())
	}
}

impl From<&str> for KeyMaterial {
	fn from(k: &str) -> Self {
		KeyMaterial::Text(k.into())
	}
}

/// Check that `key` can be used with the algorithm described by `spec`, and hand back the
/// raw key bytes if so.
///
/// This is run before every single encryption or decryption; nothing remembers that a key
/// was valid last time.
///
/// # Errors
///
/// * [`Error::MissingKey`] if there is no key at all.
/// * [`Error::InvalidKeyFormat`] if the key is text rather than bytes.
/// * [`Error::InvalidKeyLength`] if the key is not one of the lengths the algorithm accepts.
#[tracing::instrument(level = "trace", skip(key), fields(algorithm = spec.identifier()))]
pub fn validate<'k>(key: Option<&'k KeyMaterial>, spec: &AlgorithmSpec) -> Result<&'k [u8], Error> {
	let Some(key) = key else {
		tracing::debug!("No key supplied");
		return Err(Error::MissingKey);
	};

	let KeyMaterial::Bytes(bytes) = key else {
		tracing::debug!("Key supplied as text");
		return Err(Error::InvalidKeyFormat);
	};

	let bytes = bytes.expose_secret();

	if !spec.key_lengths().contains(&bytes.len()) {
		tracing::debug!(
			length = bytes.len(),
			allowed = ?spec.key_lengths(),
			"Key length not allowed"
		);
		return Err(Error::invalid_key_length(spec.identifier(), bytes.len()));
	}

	Ok(bytes)
}

/// Create a random key suitable for `algorithm`, using the longest key length it supports.
///
/// Keys usually live somewhere out of the way and are handed in for each operation, so this
/// is mostly handy for tests and for minting a key to put into configuration.
#[tracing::instrument(level = "debug")]
pub fn generate_key(algorithm: Algorithm) -> KeyMaterial {
	use rand::{RngCore, rng};

	let len = algorithm
		.spec()
		.key_lengths()
		.iter()
		.copied()
		.max()
		.unwrap_or(32);

	let mut k = vec![0u8; len];

	rng().fill_bytes(&mut k);

	k.into()
}
