//! The cryptographic primitives behind each [`Algorithm`].
//!
//! Everything here works on raw key bytes that the caller has already validated (see
//! [`validate`](crate::validate)); nothing holds on to a key past the end of the call.

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::AesGcm;
use aes_siv::siv::Siv;
use ccm::Ccm;
use chacha20poly1305::{
	ChaCha20Poly1305,
	aead::{Aead, KeyInit, Nonce, Payload},
};
use cmac::Cmac;
use eax::Eax;
use ocb3::Ocb3;
use rand::{RngCore as _, rng};
use secrecy::ExposeSecret as _;
use typenum::{U11, U12, U13, U15, U16, Unsigned};

use super::{Algorithm, AlgorithmSpec, Error, Family, algorithm::AesMode, kdf, stream};

/// Create a fresh random nonce of the length `spec` calls for.
///
/// Drawn from the thread-local CSPRNG, so concurrent callers never share generator state.
pub fn generate_nonce(spec: &AlgorithmSpec) -> Vec<u8> {
	let mut nonce = vec![0u8; spec.nonce_length()];

	rng().fill_bytes(&mut nonce);

	nonce
}

/// Encrypt and authenticate `plaintext`, returning the ciphertext with its tag appended.
///
/// The key length is checked against `spec` again here, even though callers normally come
/// through [`validate`](crate::validate) first; a mismatched key must never reach a primitive.
///
/// # Errors
///
/// * [`Error::InvalidKeyLength`] if `key` isn't a length `spec` accepts.
/// * [`Error::Encryption`] if the nonce is the wrong length, or the primitive refuses the
///   plaintext (CCM, for instance, limits the message length by nonce size).
/// * [`Error::AesInvalidAlgorithm`] if an AES entry in the registry doesn't map to a mode.
#[tracing::instrument(level = "debug", skip_all, fields(algorithm = spec.identifier()))]
pub fn encrypt(
	spec: &AlgorithmSpec,
	key: &[u8],
	nonce: &[u8],
	plaintext: &[u8],
	aad: &[u8],
) -> Result<Vec<u8>, Error> {
	check_key_length(spec, key)?;

	if !spec.accepts_nonce_length(nonce.len()) {
		tracing::debug!(len = nonce.len(), "Nonce length not accepted");
		return Err(Error::Encryption);
	}

	match spec.family() {
		Family::StreamWithMac => stream::seal(spec, key, nonce, plaintext, aad),
		Family::Aead | Family::AeadSiv => aead(spec, key, nonce, Direction::Encrypt(plaintext), aad),
	}
}

/// Verify and decrypt `sealed` (ciphertext with its tag appended).
///
/// No plaintext is ever returned unless the tag verifies.
///
/// # Errors
///
/// * [`Error::AuthenticationFailure`] if the tag doesn't verify, which happens when the key
///   or algorithm is wrong, or the nonce or sealed data has been altered.  A nonce of a
///   length the algorithm never uses is reported the same way.
/// * [`Error::InvalidKeyLength`] if `key` isn't a length `spec` accepts.
/// * [`Error::AesInvalidAlgorithm`] if an AES entry in the registry doesn't map to a mode.
#[tracing::instrument(level = "debug", skip_all, fields(algorithm = spec.identifier()))]
pub fn decrypt(
	spec: &AlgorithmSpec,
	key: &[u8],
	nonce: &[u8],
	sealed: &[u8],
	aad: &[u8],
) -> Result<Vec<u8>, Error> {
	check_key_length(spec, key)?;

	if !spec.accepts_nonce_length(nonce.len()) {
		tracing::debug!(len = nonce.len(), "Nonce length not accepted");
		return Err(Error::AuthenticationFailure);
	}

	match spec.family() {
		Family::StreamWithMac => stream::open(spec, key, nonce, sealed, aad),
		Family::Aead | Family::AeadSiv => aead(spec, key, nonce, Direction::Decrypt(sealed), aad),
	}
}

fn check_key_length(spec: &AlgorithmSpec, key: &[u8]) -> Result<(), Error> {
	if spec.key_lengths().contains(&key.len()) {
		Ok(())
	} else {
		Err(Error::invalid_key_length(spec.identifier(), key.len()))
	}
}

#[derive(Clone, Copy)]
enum Direction<'a> {
	Encrypt(&'a [u8]),
	Decrypt(&'a [u8]),
}

fn aead(
	spec: &AlgorithmSpec,
	key: &[u8],
	nonce: &[u8],
	direction: Direction<'_>,
	aad: &[u8],
) -> Result<Vec<u8>, Error> {
	if spec.algorithm() == Algorithm::ChaCha20Poly1305 {
		return run::<ChaCha20Poly1305>(key, nonce, direction, aad);
	}

	aes(AesMode::select(spec)?, key, nonce, direction, aad)
}

// The AEAD wrapper in aes-siv only comes in 128 and 256 bit flavours
type Aes192Siv = Siv<Aes192, Cmac<Aes192>>;

fn aes(
	mode: AesMode,
	key: &[u8],
	nonce: &[u8],
	direction: Direction<'_>,
	aad: &[u8],
) -> Result<Vec<u8>, Error> {
	if mode == AesMode::Siv {
		// SIV keys are two AES keys glued together
		let siv_key = kdf::derive_key(key, b"encrypted-field::ASIV", key.len() * 2)?;
		let siv_key = siv_key.expose_secret();

		return match key.len() {
			16 => run::<aes_siv::Aes128SivAead>(siv_key, nonce, direction, aad),
			24 => siv192(siv_key, nonce, direction, aad),
			_ => run::<aes_siv::Aes256SivAead>(siv_key, nonce, direction, aad),
		};
	}

	match (mode, key.len(), nonce.len()) {
		(AesMode::Gcm, 16, _) => run::<AesGcm<Aes128, U12>>(key, nonce, direction, aad),
		(AesMode::Gcm, 24, _) => run::<AesGcm<Aes192, U12>>(key, nonce, direction, aad),
		(AesMode::Gcm, _, _) => run::<AesGcm<Aes256, U12>>(key, nonce, direction, aad),

		(AesMode::Eax, 16, _) => run::<Eax<Aes128>>(key, nonce, direction, aad),
		(AesMode::Eax, 24, _) => run::<Eax<Aes192>>(key, nonce, direction, aad),
		(AesMode::Eax, _, _) => run::<Eax<Aes256>>(key, nonce, direction, aad),

		(AesMode::Ccm, 16, 12) => run::<Ccm<Aes128, U16, U12>>(key, nonce, direction, aad),
		(AesMode::Ccm, 16, 13) => run::<Ccm<Aes128, U16, U13>>(key, nonce, direction, aad),
		(AesMode::Ccm, 16, _) => run::<Ccm<Aes128, U16, U11>>(key, nonce, direction, aad),
		(AesMode::Ccm, 24, 12) => run::<Ccm<Aes192, U16, U12>>(key, nonce, direction, aad),
		(AesMode::Ccm, 24, 13) => run::<Ccm<Aes192, U16, U13>>(key, nonce, direction, aad),
		(AesMode::Ccm, 24, _) => run::<Ccm<Aes192, U16, U11>>(key, nonce, direction, aad),
		(AesMode::Ccm, _, 12) => run::<Ccm<Aes256, U16, U12>>(key, nonce, direction, aad),
		(AesMode::Ccm, _, 13) => run::<Ccm<Aes256, U16, U13>>(key, nonce, direction, aad),
		(AesMode::Ccm, _, _) => run::<Ccm<Aes256, U16, U11>>(key, nonce, direction, aad),

		(AesMode::Ocb, 16, _) => run::<Ocb3<Aes128, U15>>(key, nonce, direction, aad),
		(AesMode::Ocb, 24, _) => run::<Ocb3<Aes192, U15>>(key, nonce, direction, aad),
		(AesMode::Ocb, _, _) => run::<Ocb3<Aes256, U15>>(key, nonce, direction, aad),

		(AesMode::Siv, _, _) => Err(Error::insanity("SIV fell through to the nonce-based modes")),
	}
}

fn run<C: Aead + KeyInit>(
	key: &[u8],
	nonce: &[u8],
	direction: Direction<'_>,
	aad: &[u8],
) -> Result<Vec<u8>, Error> {
	let cipher = C::new_from_slice(key)
		.map_err(|_| Error::insanity(format!("cipher refused a {} byte key", key.len())))?;

	let expected = <C::NonceSize as Unsigned>::USIZE;
	if nonce.len() != expected {
		return Err(wrong_nonce(direction, nonce.len(), expected));
	}

	let nonce = Nonce::<C>::from_slice(nonce);

	match direction {
		Direction::Encrypt(msg) => cipher
			.encrypt(nonce, Payload { msg, aad })
			.map_err(|_| Error::Encryption),
		Direction::Decrypt(msg) => cipher.decrypt(nonce, Payload { msg, aad }).map_err(|_| {
			tracing::debug!("Tag mismatch");
			Error::AuthenticationFailure
		}),
	}
}

// Same header layout as `SivAead`: associated data first, then the nonce.
fn siv192(
	key: &[u8],
	nonce: &[u8],
	direction: Direction<'_>,
	aad: &[u8],
) -> Result<Vec<u8>, Error> {
	let mut siv = Aes192Siv::new_from_slice(key)
		.map_err(|_| Error::insanity(format!("SIV refused a {} byte key", key.len())))?;

	if nonce.len() != U16::USIZE {
		return Err(wrong_nonce(direction, nonce.len(), U16::USIZE));
	}

	match direction {
		Direction::Encrypt(msg) => siv.encrypt([aad, nonce], msg).map_err(|_| Error::Encryption),
		Direction::Decrypt(msg) => siv.decrypt([aad, nonce], msg).map_err(|_| {
			tracing::debug!("Tag mismatch");
			Error::AuthenticationFailure
		}),
	}
}

fn wrong_nonce(direction: Direction<'_>, len: usize, expected: usize) -> Error {
	tracing::debug!(len, expected, "Wrong nonce length");

	match direction {
		Direction::Encrypt(_) => Error::Encryption,
		Direction::Decrypt(_) => Error::AuthenticationFailure,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;

	fn key(len: usize) -> Vec<u8> {
		(0..len).map(|i| i as u8).collect()
	}

	#[test]
	fn every_algorithm_and_key_length() {
		crate::test_tracing::init();

		for algorithm in Algorithm::ALL {
			let spec = algorithm.spec();

			for &len in spec.key_lengths() {
				let key = key(len);
				let nonce = generate_nonce(spec);

				for plaintext in [&b""[..], &b"x"[..], &b"hello, world!"[..], &[0xa5u8; 1000][..]] {
					let sealed = encrypt(spec, &key, &nonce, plaintext, b"").unwrap();
					assert_ne!(plaintext, &sealed[..], "{algorithm} didn't do anything");
					assert_eq!(
						plaintext.to_vec(),
						decrypt(spec, &key, &nonce, &sealed, b"").unwrap(),
						"{algorithm} with a {len} byte key"
					);
				}
			}
		}
	}

	#[test]
	fn nonce_lengths() {
		for algorithm in Algorithm::ALL {
			let spec = algorithm.spec();
			assert_eq!(spec.nonce_length(), generate_nonce(spec).len());
		}
	}

	#[test]
	fn nonces_differ() {
		let spec = Algorithm::AesGcm.spec();
		let nonces: HashSet<_> = (0..1000).map(|_| generate_nonce(spec)).collect();
		assert_eq!(1000, nonces.len());
	}

	#[test]
	fn alternative_ccm_nonces() {
		let spec = Algorithm::AesCcm.spec();
		let key = key(24);

		for len in [11, 12, 13] {
			let nonce = vec![7u8; len];
			let sealed = encrypt(spec, &key, &nonce, b"ccm", b"").unwrap();
			assert_eq!(b"ccm".to_vec(), decrypt(spec, &key, &nonce, &sealed, b"").unwrap());
		}
	}

	#[test]
	fn unacceptable_nonce_length() {
		let spec = Algorithm::AesGcm.spec();
		let key = key(16);

		assert!(matches!(
			encrypt(spec, &key, &[0u8; 16], b"x", b""),
			Err(Error::Encryption)
		));
		assert!(matches!(
			decrypt(spec, &key, &[0u8; 16], &[0u8; 32], b""),
			Err(Error::AuthenticationFailure)
		));
	}

	#[test]
	fn wrong_key() {
		for algorithm in Algorithm::ALL {
			let spec = algorithm.spec();
			let nonce = generate_nonce(spec);
			let sealed = encrypt(spec, &[1u8; 32], &nonce, b"secret", b"").unwrap();

			let result = decrypt(spec, &[2u8; 32], &nonce, &sealed, b"");
			assert!(matches!(result, Err(Error::AuthenticationFailure)), "{algorithm}");
		}
	}

	#[test]
	fn aad_is_bound() {
		for algorithm in Algorithm::ALL {
			let spec = algorithm.spec();
			let nonce = generate_nonce(spec);
			let sealed = encrypt(spec, &[1u8; 32], &nonce, b"secret", b"row 1").unwrap();

			let result = decrypt(spec, &[1u8; 32], &nonce, &sealed, b"row 2");
			assert!(matches!(result, Err(Error::AuthenticationFailure)), "{algorithm}");
		}
	}

	#[test]
	fn bad_key_length() {
		let spec = Algorithm::ChaCha20Poly1305.spec();
		let result = encrypt(spec, &[0u8; 16], &[0u8; 12], b"x", b"");
		assert!(matches!(result, Err(Error::InvalidKeyLength { length: 16, .. })));

		// Checked again on the way out, not only by `validate`
		let spec = Algorithm::AesSiv.spec();
		let result = decrypt(spec, &[0u8; 20], &[0u8; 16], &[0u8; 32], b"");
		assert!(matches!(result, Err(Error::InvalidKeyLength { length: 20, .. })));
	}

	#[test]
	fn siv_with_192_bit_key() {
		let spec = Algorithm::AesSiv.spec();
		let key = key(24);
		let nonce = generate_nonce(spec);

		let sealed = encrypt(spec, &key, &nonce, b"middle child", b"").unwrap();
		assert_eq!(b"middle child".len() + 16, sealed.len());
		assert_eq!(
			b"middle child".to_vec(),
			decrypt(spec, &key, &nonce, &sealed, b"").unwrap()
		);

		let mut other_nonce = nonce.clone();
		other_nonce[0] ^= 1;
		assert!(matches!(
			decrypt(spec, &key, &other_nonce, &sealed, b""),
			Err(Error::AuthenticationFailure)
		));
		assert!(matches!(
			decrypt(spec, &key, &nonce, &sealed, b"aad"),
			Err(Error::AuthenticationFailure)
		));
		assert!(matches!(
			encrypt(spec, &key, &nonce[..12], b"x", b""),
			Err(Error::Encryption)
		));
	}

	#[test]
	fn siv_is_randomised_by_nonce() {
		let spec = Algorithm::AesSiv.spec();
		let key = key(32);

		let a = encrypt(spec, &key, &generate_nonce(spec), b"same", b"").unwrap();
		let b = encrypt(spec, &key, &generate_nonce(spec), b"same", b"").unwrap();
		assert_ne!(a, b);
	}
}
