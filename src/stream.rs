use chacha20::{ChaCha20, XChaCha20};
use hmac::{Hmac, Mac};
use salsa20::{
	Salsa20,
	cipher::{KeyIvInit, StreamCipher},
};
use secrecy::{ExposeSecret as _, SecretSlice};
use sha2::Sha256;

use super::{Algorithm, AlgorithmSpec, Error, kdf};

type HmacSha256 = Hmac<Sha256>;

pub(crate) const TAG_LEN: usize = 32;

/// Encrypt-then-MAC for the stream ciphers that don't authenticate on their own.
///
/// The caller's key is never used directly: separate cipher and MAC keys are derived from it,
/// so the keystream and the tag can't interfere with each other.
struct SubKeys {
	cipher: SecretSlice<u8>,
	mac: SecretSlice<u8>,
}

impl SubKeys {
	fn derive(spec: &AlgorithmSpec, key: &[u8]) -> Result<Self, Error> {
		let id = spec.identifier();

		Ok(Self {
			cipher: kdf::derive_key(key, format!("encrypted-field::{id}::cipher").as_bytes(), 32)?,
			mac: kdf::derive_key(key, format!("encrypted-field::{id}::mac").as_bytes(), 32)?,
		})
	}

	fn mac(&self, aad: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<HmacSha256, Error> {
		let mut mac = <HmacSha256 as Mac>::new_from_slice(self.mac.expose_secret())
			.map_err(|_| Error::insanity("HMAC refused its key"))?;

		// Length-prefixed, so bytes can't slide between the AAD and the nonce
		mac.update(&(aad.len() as u64).to_be_bytes());
		mac.update(aad);
		mac.update(&(nonce.len() as u64).to_be_bytes());
		mac.update(nonce);
		mac.update(ciphertext);

		Ok(mac)
	}
}

pub(crate) fn seal(
	spec: &AlgorithmSpec,
	key: &[u8],
	nonce: &[u8],
	plaintext: &[u8],
	aad: &[u8],
) -> Result<Vec<u8>, Error> {
	let keys = SubKeys::derive(spec, key)?;

	let mut sealed = plaintext.to_vec();
	apply_keystream(spec, keys.cipher.expose_secret(), nonce, &mut sealed)?;

	let tag = keys.mac(aad, nonce, &sealed)?.finalize().into_bytes();
	sealed.extend_from_slice(&tag);

	Ok(sealed)
}

pub(crate) fn open(
	spec: &AlgorithmSpec,
	key: &[u8],
	nonce: &[u8],
	sealed: &[u8],
	aad: &[u8],
) -> Result<Vec<u8>, Error> {
	if sealed.len() < TAG_LEN {
		tracing::debug!(len = sealed.len(), "Sealed data shorter than a tag");
		return Err(Error::AuthenticationFailure);
	}

	let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);
	let keys = SubKeys::derive(spec, key)?;

	// Nothing gets decrypted until the tag checks out
	keys.mac(aad, nonce, ciphertext)?
		.verify_slice(tag)
		.map_err(|_| {
			tracing::debug!("MAC mismatch");
			Error::AuthenticationFailure
		})?;

	let mut plaintext = ciphertext.to_vec();
	apply_keystream(spec, keys.cipher.expose_secret(), nonce, &mut plaintext)?;

	Ok(plaintext)
}

fn apply_keystream(
	spec: &AlgorithmSpec,
	key: &[u8],
	nonce: &[u8],
	buf: &mut [u8],
) -> Result<(), Error> {
	match (spec.algorithm(), nonce.len()) {
		(Algorithm::ChaCha20, 12) => xor::<ChaCha20>(key, nonce, buf),
		(Algorithm::ChaCha20, 24) => xor::<XChaCha20>(key, nonce, buf),
		(Algorithm::Salsa20, 8) => xor::<Salsa20>(key, nonce, buf),
		(algorithm, len) => Err(Error::insanity(format!(
			"no stream cipher for {algorithm} with a {len} byte nonce"
		))),
	}
}

fn xor<C: KeyIvInit + StreamCipher>(key: &[u8], nonce: &[u8], buf: &mut [u8]) -> Result<(), Error> {
	let mut cipher = C::new_from_slices(key, nonce)
		.map_err(|_| Error::insanity("stream cipher refused its key or nonce"))?;

	cipher.try_apply_keystream(buf).map_err(|_| {
		tracing::debug!(len = buf.len(), "Keystream exhausted");
		Error::Encryption
	})
}
