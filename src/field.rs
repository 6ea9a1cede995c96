use super::{Algorithm, Error, Settings, decode, encode};

/// How the column backing an [`EncryptedField`] is declared.
///
/// Every encryption of the same value produces different text, so an encrypted column can't
/// usefully be compared, searched, or indexed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColumnOptions {
	pub primary_key: bool,
	pub unique: bool,
	pub indexed: bool,
}

/// The per-field encryption settings for one encrypted column.
///
/// The field itself never holds a key: every [`encrypt`](Self::encrypt) and
/// [`decrypt`](Self::decrypt) asks the supplied [`Settings`] for the key (and the default
/// algorithm) right then, and forgets them again once the operation is done.
///
/// # Example
///
/// ```rust
/// use encrypted_field::{Algorithm, EncryptedField, Error, StaticSettings};
/// # fn main() -> Result<(), Error> {
///
/// let settings = StaticSettings::new()
///     .with_key([0x42u8; 32])
///     .with_default_algorithm(Algorithm::ChaCha20Poly1305);
///
/// // Uses whatever the settings say is the default
/// let notes = EncryptedField::new();
/// // Always AES-EAX, and doesn't say so in the database
/// let seed = EncryptedField::new()
///     .with_algorithm_id("AEAX")?
///     .with_hidden_algorithm(true);
///
/// let stored = notes.to_column(&settings, Some(&b"A very critical secret."[..]))?;
/// assert_eq!(
///     Some(b"A very critical secret.".to_vec()),
///     notes.from_column(&settings, stored.as_deref())?,
/// );
///
/// let stored = seed.encrypt_str(&settings, "A very critical secret.")?;
/// assert!(!stored.contains("AEAX"));
/// assert_eq!("A very critical secret.", seed.decrypt_string(&settings, &stored)?);
///
/// // Empty values are stored as NULL, without any encryption
/// assert_eq!(None, notes.to_column(&settings, Some(&b""[..]))?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncryptedField {
	algorithm: Option<Algorithm>,
	header: Option<String>,
	hide_algorithm: bool,
}

impl EncryptedField {
	/// Database column type the envelope text is stored in.
	pub const COLUMN_TYPE: &'static str = "text";

	/// A field that uses the configured default algorithm, no header, and names its
	/// algorithm in every envelope.
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
		self.algorithm = Some(algorithm);
		self
	}

	/// Like [`with_algorithm`](Self::with_algorithm), from an identifier such as `"AGCM"`.
	///
	/// # Errors
	///
	/// Returns [`Error::UnknownAlgorithm`] straight away, rather than on first use, if the
	/// identifier isn't known.
	pub fn with_algorithm_id(self, identifier: &str) -> Result<Self, Error> {
		Ok(self.with_algorithm(identifier.parse()?))
	}

	/// Metadata stored in the clear alongside every envelope.
	pub fn with_header(mut self, header: impl Into<String>) -> Self {
		self.header = Some(header.into());
		self
	}

	/// Leave the algorithm out of stored envelopes.
	///
	/// Decryption then relies on this field's algorithm, or the configured default, being the
	/// one the value was encrypted with.  If it isn't, decryption fails with
	/// [`Error::AuthenticationFailure`], as there's no way to tell a wrong algorithm from a
	/// wrong key.
	pub fn with_hidden_algorithm(mut self, hide: bool) -> Self {
		self.hide_algorithm = hide;
		self
	}

	pub fn algorithm(&self) -> Option<Algorithm> {
		self.algorithm
	}

	pub fn header(&self) -> Option<&str> {
		self.header.as_deref()
	}

	pub fn hides_algorithm(&self) -> bool {
		self.hide_algorithm
	}

	/// Refuse column declarations an encrypted field can't honour.
	///
	/// # Errors
	///
	/// Returns [`Error::UnsupportedColumn`] if the column is declared as a primary key,
	/// unique, or indexed.
	pub fn check_column(&self, column: ColumnOptions) -> Result<(), Error> {
		let refused = [
			(column.primary_key, "a primary key"),
			(column.unique, "a unique column"),
			(column.indexed, "an indexed column"),
		];

		for (requested, what) in refused {
			if requested {
				tracing::debug!(?column, "Unsupported column declaration");
				return Err(Error::unsupported_column(what));
			}
		}

		Ok(())
	}

	/// Encrypt `plaintext` into envelope text.
	///
	/// # Errors
	///
	/// See [`encode`](crate::encode).
	#[tracing::instrument(level = "debug", skip(settings, plaintext))]
	pub fn encrypt(
		&self,
		settings: &(impl Settings + ?Sized),
		plaintext: impl AsRef<[u8]>,
	) -> Result<String, Error> {
		let key = settings.key();
		let default_algorithm = settings.default_algorithm();

		encode(
			plaintext,
			key.as_ref(),
			self.resolve_algorithm(default_algorithm.as_deref()),
			self.header.as_deref(),
			self.hide_algorithm,
		)
	}

	/// Decrypt envelope text written by [`encrypt`](Self::encrypt).
	///
	/// # Errors
	///
	/// See [`decode`](crate::decode).
	#[tracing::instrument(level = "debug", skip(settings, text))]
	pub fn decrypt(&self, settings: &(impl Settings + ?Sized), text: &str) -> Result<Vec<u8>, Error> {
		let key = settings.key();
		let default_algorithm = settings.default_algorithm();

		decode(
			text,
			key.as_ref(),
			self.resolve_algorithm(default_algorithm.as_deref()),
		)
	}

	/// [`encrypt`](Self::encrypt) for text values.
	///
	/// # Errors
	///
	/// See [`encode`](crate::encode).
	pub fn encrypt_str(
		&self,
		settings: &(impl Settings + ?Sized),
		plaintext: &str,
	) -> Result<String, Error> {
		self.encrypt(settings, plaintext)
	}

	/// [`decrypt`](Self::decrypt) for text values.
	///
	/// # Errors
	///
	/// As for [`decode`](crate::decode), plus [`Error::Codec`] if the decrypted value isn't
	/// UTF-8.
	pub fn decrypt_string(
		&self,
		settings: &(impl Settings + ?Sized),
		text: &str,
	) -> Result<String, Error> {
		String::from_utf8(self.decrypt(settings, text)?)
			.map_err(|_| Error::codec("decrypted value is not UTF-8"))
	}

	/// Turn a value into what gets written to the column.  Missing and empty values are
	/// stored as NULL, and are never encrypted.
	///
	/// # Errors
	///
	/// See [`encode`](crate::encode).
	pub fn to_column(
		&self,
		settings: &(impl Settings + ?Sized),
		value: Option<&[u8]>,
	) -> Result<Option<String>, Error> {
		match value {
			None => Ok(None),
			Some(v) if v.is_empty() => Ok(None),
			Some(v) => self.encrypt(settings, v).map(Some),
		}
	}

	/// Turn what was read from the column back into a value.  NULL and empty column values
	/// come back as `None`.
	///
	/// # Errors
	///
	/// See [`decode`](crate::decode).
	pub fn from_column(
		&self,
		settings: &(impl Settings + ?Sized),
		stored: Option<&str>,
	) -> Result<Option<Vec<u8>>, Error> {
		match stored {
			None => Ok(None),
			Some(s) if s.is_empty() => Ok(None),
			Some(s) => self.decrypt(settings, s).map(Some),
		}
	}

	// The field's own choice wins over the configured default, for both directions, so a
	// hidden-algorithm field decrypts with the algorithm it encrypted with.
	fn resolve_algorithm<'a>(&self, default_algorithm: Option<&'a str>) -> Option<&'a str> {
		self.algorithm
			.map(Algorithm::identifier)
			.or(default_algorithm)
	}
}
