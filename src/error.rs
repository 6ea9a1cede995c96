#[derive(Debug, thiserror::Error, thiserror_ext::Construct)]
#[non_exhaustive]
pub enum Error {
	#[error("no encryption key is configured")]
	MissingKey,

	#[error("encryption key must be raw bytes, not text")]
	InvalidKeyFormat,

	#[error("{algorithm} does not accept a {length} byte key")]
	InvalidKeyLength { algorithm: String, length: usize },

	#[error("unknown encryption algorithm: {0}")]
	UnknownAlgorithm(String),

	#[error("invalid AES algorithm: {0}")]
	AesInvalidAlgorithm(String),

	/// Deliberately says nothing about *why*: wrong key, wrong algorithm and tampering all
	/// look identical from the outside.
	#[error("authentication failed")]
	AuthenticationFailure,

	#[error("malformed envelope: {0}")]
	Codec(String),

	#[error("encrypted fields cannot be used as {0}")]
	UnsupportedColumn(String),

	#[error("failed to encrypt plaintext")]
	Encryption,

	#[error("CAN'T HAPPEN: {0}")]
	Insanity(String),
}
