use super::{AlgorithmSpec, Envelope, Error, KeyMaterial, registry, resolve, validate};

// The header travels next to the ciphertext as plain metadata; it is not bound to the tag, so
// envelopes written by one version can be read by the next.
const ASSOCIATED_DATA: &[u8] = b"";

/// Everything a single encode or decode needs.
///
/// Built at the start of each operation and dropped at its end; the key is only ever borrowed
/// from the caller, never copied into anything that outlives the call.
struct EncryptionContext<'a> {
	spec: &'static AlgorithmSpec,
	key: &'a [u8],
	header: Option<&'a str>,
}

impl<'a> EncryptionContext<'a> {
	fn new(
		spec: &'static AlgorithmSpec,
		key: Option<&'a KeyMaterial>,
		header: Option<&'a str>,
	) -> Result<Self, Error> {
		Ok(Self {
			spec,
			key: validate(key, spec)?,
			header,
		})
	}
}

/// Encrypt `plaintext` into envelope text, ready to be stored in a text column.
///
/// `algorithm` is the identifier of the algorithm to use (see [`Algorithm`](crate::Algorithm));
/// callers with a per-field setting and a configured default should pass whichever applies,
/// as [`EncryptedField`](crate::EncryptedField) does.  There is no built-in fallback.
///
/// With `hide_algorithm` set, the algorithm identifier is left out of the envelope, and the
/// same algorithm has to be supplied to [`decode`] later on.
///
/// # Example
///
/// ```rust
/// use encrypted_field::{Algorithm, Envelope, Error, decode, encode, generate_key};
/// # fn main() -> Result<(), Error> {
///
/// let key = generate_key(Algorithm::AesGcm);
///
/// let text = encode(b"hello", Some(&key), Some("AGCM"), Some("h1"), false)?;
///
/// // The envelope says what it is...
/// let envelope = Envelope::parse(&text)?;
/// assert_eq!(Some("AGCM"), envelope.algorithm());
/// assert_eq!(Some("h1"), envelope.header());
///
/// // ... so decoding only needs the key
/// assert_eq!(b"hello".to_vec(), decode(&text, Some(&key), None)?);
///
/// // Without a key, nothing happens at all
/// let result = encode(b"hello", None, Some("AGCM"), None, false);
/// assert!(matches!(result, Err(Error::MissingKey)));
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// * [`Error::UnknownAlgorithm`] if `algorithm` is `None` or not a known identifier.
/// * [`Error::MissingKey`], [`Error::InvalidKeyFormat`] or [`Error::InvalidKeyLength`] if
///   the key can't be used with the algorithm.
/// * [`Error::Encryption`] in the (extremely unlikely) event the cipher refuses the plaintext.
#[tracing::instrument(level = "debug", skip(plaintext, key))]
pub fn encode(
	plaintext: impl AsRef<[u8]>,
	key: Option<&KeyMaterial>,
	algorithm: Option<&str>,
	header: Option<&str>,
	hide_algorithm: bool,
) -> Result<String, Error> {
	let Some(identifier) = algorithm else {
		tracing::debug!("No algorithm specified or configured");
		return Err(Error::unknown_algorithm("no algorithm specified or configured"));
	};

	let ctx = EncryptionContext::new(resolve(identifier)?, key, header)?;

	let nonce = registry::generate_nonce(ctx.spec);
	let sealed = registry::encrypt(ctx.spec, ctx.key, &nonce, plaintext.as_ref(), ASSOCIATED_DATA)?;

	tracing::debug!(algorithm = ctx.spec.identifier(), "Encrypted");

	let stored_algorithm = if hide_algorithm {
		None
	} else {
		Some(ctx.spec.identifier())
	};

	Envelope::new(stored_algorithm, ctx.header, nonce, sealed).to_text()
}

/// Decrypt envelope text produced by [`encode`].
///
/// The algorithm named in the envelope always wins.  `default_algorithm` is only consulted
/// for envelopes written in hidden-algorithm mode, and it has to be the algorithm that was
/// actually used: a wrong guess can't be told apart from a wrong key, so it surfaces as
/// [`Error::AuthenticationFailure`].
///
/// # Errors
///
/// * [`Error::Codec`] if `text` isn't an envelope.
/// * [`Error::UnknownAlgorithm`] if the envelope names an unknown algorithm, or hides its
///   algorithm and no default was supplied.
/// * [`Error::MissingKey`], [`Error::InvalidKeyFormat`] or [`Error::InvalidKeyLength`] if
///   the key can't be used with the algorithm.
/// * [`Error::AuthenticationFailure`] if the envelope doesn't verify under this key and
///   algorithm.
#[tracing::instrument(level = "debug", skip(text, key))]
pub fn decode(
	text: &str,
	key: Option<&KeyMaterial>,
	default_algorithm: Option<&str>,
) -> Result<Vec<u8>, Error> {
	let envelope = Envelope::parse(text)?;

	let identifier = match (envelope.algorithm(), default_algorithm) {
		(Some(stored), _) => stored,
		(None, Some(default)) => {
			tracing::debug!(algorithm = default, "Envelope hides its algorithm, using default");
			default
		}
		(None, None) => {
			tracing::debug!("Envelope hides its algorithm and no default is configured");
			return Err(Error::unknown_algorithm(
				"envelope does not name its algorithm and no default is configured",
			));
		}
	};

	let ctx = EncryptionContext::new(resolve(identifier)?, key, envelope.header())?;

	let plaintext = registry::decrypt(
		ctx.spec,
		ctx.key,
		envelope.nonce(),
		envelope.sealed(),
		ASSOCIATED_DATA,
	)?;

	tracing::debug!(algorithm = ctx.spec.identifier(), header = ?ctx.header, "Decrypted");

	Ok(plaintext)
}
