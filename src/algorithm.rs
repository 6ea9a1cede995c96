use std::{fmt, str::FromStr};

use super::Error;

/// The encryption schemes an envelope can be sealed with.
///
/// Each variant is stored in an envelope as its short identifier (see
/// [`Algorithm::identifier`]), so the identifiers are part of the persisted format and must
/// never change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
	/// ChaCha20 with a Poly1305 tag (`CC20P`).
	ChaCha20Poly1305,
	/// ChaCha20 stream cipher, authenticated with HMAC-SHA256 (`CC20`).
	ChaCha20,
	/// Salsa20 stream cipher, authenticated with HMAC-SHA256 (`SS20`).
	Salsa20,
	/// AES in Galois/Counter Mode (`AGCM`).
	AesGcm,
	/// AES in Synthetic IV mode (`ASIV`).
	AesSiv,
	/// AES in EAX mode (`AEAX`).
	AesEax,
	/// AES in Counter with CBC-MAC mode (`ACCM`).
	AesCcm,
	/// AES in Offset Codebook mode, version 3 (`AOCB`).
	AesOcb,
}

impl Algorithm {
	pub const ALL: [Algorithm; 8] = [
		Algorithm::ChaCha20Poly1305,
		Algorithm::ChaCha20,
		Algorithm::Salsa20,
		Algorithm::AesGcm,
		Algorithm::AesSiv,
		Algorithm::AesEax,
		Algorithm::AesCcm,
		Algorithm::AesOcb,
	];

	pub fn spec(self) -> &'static AlgorithmSpec {
		match self {
			Algorithm::ChaCha20Poly1305 => &ALGORITHMS[0],
			Algorithm::ChaCha20 => &ALGORITHMS[1],
			Algorithm::Salsa20 => &ALGORITHMS[2],
			Algorithm::AesGcm => &ALGORITHMS[3],
			Algorithm::AesSiv => &ALGORITHMS[4],
			Algorithm::AesEax => &ALGORITHMS[5],
			Algorithm::AesCcm => &ALGORITHMS[6],
			Algorithm::AesOcb => &ALGORITHMS[7],
		}
	}

	pub fn identifier(self) -> &'static str {
		self.spec().identifier
	}
}

impl fmt::Display for Algorithm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.identifier())
	}
}

impl FromStr for Algorithm {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Error> {
		resolve(s).map(|spec| spec.algorithm)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
	/// Natively authenticated; the tag is appended to the ciphertext by the primitive.
	Aead,
	/// Nonce-misuse resistant AEAD; the synthetic IV doubles as the tag.
	AeadSiv,
	/// Confidentiality only; an HMAC over nonce and ciphertext is appended to the ciphertext.
	StreamWithMac,
}

/// Construction parameters for one [`Algorithm`].
#[derive(Debug, PartialEq, Eq)]
pub struct AlgorithmSpec {
	algorithm: Algorithm,
	identifier: &'static str,
	key_lengths: &'static [usize],
	nonce_length: usize,
	accepted_nonce_lengths: &'static [usize],
	family: Family,
}

impl AlgorithmSpec {
	pub fn algorithm(&self) -> Algorithm {
		self.algorithm
	}

	pub fn identifier(&self) -> &'static str {
		self.identifier
	}

	/// Every key length, in bytes, this algorithm can be keyed with.
	pub fn key_lengths(&self) -> &'static [usize] {
		self.key_lengths
	}

	/// Length of the nonce generated for each new envelope.
	pub fn nonce_length(&self) -> usize {
		self.nonce_length
	}

	/// Whether an envelope carrying a nonce of `len` bytes can be opened with this algorithm.
	pub fn accepts_nonce_length(&self, len: usize) -> bool {
		self.accepted_nonce_lengths.contains(&len)
	}

	pub fn family(&self) -> Family {
		self.family
	}
}

const AES_KEY_LENGTHS: &[usize] = &[16, 24, 32];
const CHACHA_KEY_LENGTHS: &[usize] = &[32];

static ALGORITHMS: [AlgorithmSpec; 8] = [
	AlgorithmSpec {
		algorithm: Algorithm::ChaCha20Poly1305,
		identifier: "CC20P",
		key_lengths: CHACHA_KEY_LENGTHS,
		nonce_length: 12,
		accepted_nonce_lengths: &[12],
		family: Family::Aead,
	},
	// 24 byte nonces are XChaCha20
	AlgorithmSpec {
		algorithm: Algorithm::ChaCha20,
		identifier: "CC20",
		key_lengths: CHACHA_KEY_LENGTHS,
		nonce_length: 12,
		accepted_nonce_lengths: &[12, 24],
		family: Family::StreamWithMac,
	},
	AlgorithmSpec {
		algorithm: Algorithm::Salsa20,
		identifier: "SS20",
		key_lengths: CHACHA_KEY_LENGTHS,
		nonce_length: 8,
		accepted_nonce_lengths: &[8],
		family: Family::StreamWithMac,
	},
	AlgorithmSpec {
		algorithm: Algorithm::AesGcm,
		identifier: "AGCM",
		key_lengths: AES_KEY_LENGTHS,
		nonce_length: 12,
		accepted_nonce_lengths: &[12],
		family: Family::Aead,
	},
	// SIV works without a nonce, but then it's deterministic, and equal plaintexts would
	// produce equal envelopes
	AlgorithmSpec {
		algorithm: Algorithm::AesSiv,
		identifier: "ASIV",
		key_lengths: AES_KEY_LENGTHS,
		nonce_length: 16,
		accepted_nonce_lengths: &[16],
		family: Family::AeadSiv,
	},
	AlgorithmSpec {
		algorithm: Algorithm::AesEax,
		identifier: "AEAX",
		key_lengths: AES_KEY_LENGTHS,
		nonce_length: 16,
		accepted_nonce_lengths: &[16],
		family: Family::Aead,
	},
	AlgorithmSpec {
		algorithm: Algorithm::AesCcm,
		identifier: "ACCM",
		key_lengths: AES_KEY_LENGTHS,
		nonce_length: 11,
		accepted_nonce_lengths: &[11, 12, 13],
		family: Family::Aead,
	},
	AlgorithmSpec {
		algorithm: Algorithm::AesOcb,
		identifier: "AOCB",
		key_lengths: AES_KEY_LENGTHS,
		nonce_length: 15,
		accepted_nonce_lengths: &[15],
		family: Family::Aead,
	},
];

/// Look up the parameters for an algorithm identifier, such as `"AGCM"`.
///
/// # Errors
///
/// Returns [`Error::UnknownAlgorithm`] if nothing in the registry goes by that identifier.
///
/// # Example
///
/// ```rust
/// use encrypted_field::{Algorithm, Error, Family, resolve};
/// # fn main() -> Result<(), Error> {
///
/// let spec = resolve("SS20")?;
/// assert_eq!(Algorithm::Salsa20, spec.algorithm());
/// assert_eq!(Family::StreamWithMac, spec.family());
///
/// assert!(matches!(resolve("ROT13"), Err(Error::UnknownAlgorithm(_))));
/// # Ok(())
/// # }
/// ```
pub fn resolve(identifier: &str) -> Result<&'static AlgorithmSpec, Error> {
	ALGORITHMS
		.iter()
		.find(|spec| spec.identifier == identifier)
		.ok_or_else(|| {
			tracing::debug!(%identifier, "Unknown algorithm");
			Error::unknown_algorithm(identifier)
		})
}

/// The block cipher mode behind each of the AES identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AesMode {
	Gcm,
	Siv,
	Eax,
	Ccm,
	Ocb,
}

impl AesMode {
	/// Map an AES entry of the registry to its mode.
	///
	/// Keyed on the stored identifier rather than the [`Algorithm`] so that a table entry
	/// pointing at the wrong primitive is caught rather than silently sealed with some other
	/// mode.
	pub(crate) fn select(spec: &AlgorithmSpec) -> Result<Self, Error> {
		let mode = match spec.identifier {
			"AGCM" => AesMode::Gcm,
			"ASIV" => AesMode::Siv,
			"AEAX" => AesMode::Eax,
			"ACCM" => AesMode::Ccm,
			"AOCB" => AesMode::Ocb,
			other => {
				tracing::debug!(identifier = %other, "Not an AES algorithm");
				return Err(Error::aes_invalid_algorithm(other));
			}
		};

		let expected = match mode {
			AesMode::Gcm => Algorithm::AesGcm,
			AesMode::Siv => Algorithm::AesSiv,
			AesMode::Eax => Algorithm::AesEax,
			AesMode::Ccm => Algorithm::AesCcm,
			AesMode::Ocb => Algorithm::AesOcb,
		};

		if expected != spec.algorithm {
			return Err(Error::aes_invalid_algorithm(format!(
				"{} is registered as {:?}",
				spec.identifier, spec.algorithm
			)));
		}

		Ok(mode)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;

	#[test]
	fn identifiers_are_unique_and_short() {
		let ids: HashSet<_> = ALGORITHMS.iter().map(|s| s.identifier).collect();
		assert_eq!(ALGORITHMS.len(), ids.len());

		for id in ids {
			assert!(id.len() <= 5, "{id} is too long");
			assert!(id.chars().all(|c| c.is_ascii_graphic()));
		}
	}

	#[test]
	fn table_is_consistent() {
		for algorithm in Algorithm::ALL {
			let spec = algorithm.spec();
			assert_eq!(algorithm, spec.algorithm());
			assert!(!spec.key_lengths().is_empty());
			assert!(spec.accepts_nonce_length(spec.nonce_length()));
			assert_eq!(algorithm, spec.identifier().parse::<Algorithm>().unwrap());
		}
	}

	#[test]
	fn known_parameters() {
		assert_eq!(&[32], resolve("CC20P").unwrap().key_lengths());
		assert_eq!(8, resolve("SS20").unwrap().nonce_length());
		assert_eq!(&[16, 24, 32], resolve("AOCB").unwrap().key_lengths());
		assert_eq!(15, resolve("AOCB").unwrap().nonce_length());
		assert!(resolve("CC20").unwrap().accepts_nonce_length(24));
		assert!(resolve("ACCM").unwrap().accepts_nonce_length(13));
		assert!(!resolve("ACCM").unwrap().accepts_nonce_length(14));
		assert_eq!(Family::StreamWithMac, resolve("CC20").unwrap().family());
	}

	#[test]
	fn unknown_identifier() {
		assert!(matches!(resolve("ROT13"), Err(Error::UnknownAlgorithm(id)) if id == "ROT13"));
		assert!(matches!(resolve("agcm"), Err(Error::UnknownAlgorithm(_))));
		assert!(matches!(resolve(""), Err(Error::UnknownAlgorithm(_))));
	}

	#[test]
	fn aes_modes() {
		assert_eq!(AesMode::Gcm, AesMode::select(Algorithm::AesGcm.spec()).unwrap());
		assert_eq!(AesMode::Siv, AesMode::select(Algorithm::AesSiv.spec()).unwrap());
		assert_eq!(AesMode::Eax, AesMode::select(Algorithm::AesEax.spec()).unwrap());
		assert_eq!(AesMode::Ccm, AesMode::select(Algorithm::AesCcm.spec()).unwrap());
		assert_eq!(AesMode::Ocb, AesMode::select(Algorithm::AesOcb.spec()).unwrap());
	}

	#[test]
	fn aes_mode_rejects_other_families() {
		let result = AesMode::select(Algorithm::ChaCha20Poly1305.spec());
		assert!(matches!(result, Err(Error::AesInvalidAlgorithm(_))));
	}

	#[test]
	fn aes_mode_rejects_mislabelled_entry() {
		let corrupt = AlgorithmSpec {
			algorithm: Algorithm::AesEax,
			identifier: "AGCM",
			key_lengths: AES_KEY_LENGTHS,
			nonce_length: 12,
			accepted_nonce_lengths: &[12],
			family: Family::Aead,
		};

		assert!(matches!(
			AesMode::select(&corrupt),
			Err(Error::AesInvalidAlgorithm(_))
		));
	}
}
