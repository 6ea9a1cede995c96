use hkdf::Hkdf;
use secrecy::SecretSlice;
use sha2::Sha256;

use super::Error;

/// Expand `key` into `len` bytes of subkey material bound to `context`.
pub(crate) fn derive_key(key: &[u8], context: &[u8], len: usize) -> Result<SecretSlice<u8>, Error> {
	let hk = Hkdf::<Sha256>::new(None, key);

	let mut output = vec![0u8; len];

	hk.expand(context, &mut output)
		.map_err(|_| Error::insanity(format!("cannot derive a {len} byte subkey")))?;

	Ok(output.into())
}

#[cfg(test)]
mod tests {
	use super::*;
	use secrecy::ExposeSecret as _;

	#[test]
	fn context_separates_subkeys() {
		let key = [7u8; 32];

		let a = derive_key(&key, b"a", 32).unwrap();
		let b = derive_key(&key, b"b", 32).unwrap();
		let a_again = derive_key(&key, b"a", 32).unwrap();

		assert_ne!(a.expose_secret(), b.expose_secret());
		assert_eq!(a.expose_secret(), a_again.expose_secret());
	}

	#[test]
	fn requested_length_is_honoured() {
		let key = [1u8; 16];

		assert_eq!(32, derive_key(&key, b"siv", 32).unwrap().expose_secret().len());
		assert_eq!(64, derive_key(&key, b"siv", 64).unwrap().expose_secret().len());
	}
}
