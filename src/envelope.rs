use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use super::Error;

/// One encrypted value, as it is stored in a text column.
///
/// Serialized as a JSON object:
///
/// ```json
/// {"header":"h1","algorithm":"AGCM","nonce":"<base64>","sealed":"<base64>"}
/// ```
///
/// `header` is left out when there is no header, and `algorithm` is left out of envelopes
/// written in hidden-algorithm mode.  Key order carries no meaning, and unknown keys are
/// ignored so that later versions can add to the format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	header: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	algorithm: Option<String>,
	#[serde(with = "base64_bytes")]
	nonce: Vec<u8>,
	#[serde(with = "base64_bytes")]
	sealed: Vec<u8>,
}

impl Envelope {
	/// Build an envelope.  An empty header is the same as no header, since it isn't stored.
	pub fn new(
		algorithm: Option<&str>,
		header: Option<&str>,
		nonce: Vec<u8>,
		sealed: Vec<u8>,
	) -> Self {
		Self {
			header: header.filter(|h| !h.is_empty()).map(str::to_owned),
			algorithm: algorithm.map(str::to_owned),
			nonce,
			sealed,
		}
	}

	/// The algorithm identifier, unless the envelope was written in hidden-algorithm mode.
	pub fn algorithm(&self) -> Option<&str> {
		self.algorithm.as_deref()
	}

	pub fn header(&self) -> Option<&str> {
		self.header.as_deref()
	}

	pub fn nonce(&self) -> &[u8] {
		&self.nonce
	}

	/// Ciphertext with the authentication tag appended.
	pub fn sealed(&self) -> &[u8] {
		&self.sealed
	}

	pub fn is_algorithm_hidden(&self) -> bool {
		self.algorithm.is_none()
	}

	/// Render the envelope as the text that goes into the column.
	///
	/// # Errors
	///
	/// Will return [`Error::Codec`] in the (practically impossible) event that JSON
	/// serialization fails.
	pub fn to_text(&self) -> Result<String, Error> {
		serde_json::to_string(self).map_err(|e| Error::codec(e.to_string()))
	}

	/// Parse column text back into an envelope.
	///
	/// # Errors
	///
	/// Will return [`Error::Codec`] if the text isn't a JSON object, `nonce` or `sealed` is
	/// missing or isn't valid base64, or `header` or `algorithm` isn't a string.
	#[tracing::instrument(level = "debug", skip(text), fields(len = text.len()))]
	pub fn parse(text: &str) -> Result<Self, Error> {
		let envelope: Envelope = serde_json::from_str(text).map_err(|e| {
			tracing::debug!(error = %e, "Envelope did not parse");
			Error::codec(e.to_string())
		})?;

		// Normalise the same way `new` does, so parse(e.to_text()) == e
		Ok(Self::new(
			envelope.algorithm.as_deref(),
			envelope.header.as_deref(),
			envelope.nonce,
			envelope.sealed,
		))
	}
}

mod base64_bytes {
	use super::*;
	use serde::{Deserializer, Serializer, de::Error as _};

	pub(super) fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
		s.serialize_str(&STANDARD.encode(bytes))
	}

	pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
		let encoded = String::deserialize(d)?;

		STANDARD
			.decode(encoded.as_bytes())
			.map_err(|e| D::Error::custom(format!("invalid base64: {e}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn envelope() -> Envelope {
		Envelope::new(Some("AGCM"), Some("h1"), vec![1, 2, 3], vec![4, 5, 6, 7])
	}

	#[test]
	fn round_trip() {
		let e = envelope();
		assert_eq!(e, Envelope::parse(&e.to_text().unwrap()).unwrap());

		let hidden = Envelope::new(None, None, vec![0; 12], Vec::new());
		assert_eq!(hidden, Envelope::parse(&hidden.to_text().unwrap()).unwrap());
	}

	#[test]
	fn wire_format() {
		let text = envelope().to_text().unwrap();
		let json: serde_json::Value = serde_json::from_str(&text).unwrap();

		assert_eq!("h1", json["header"]);
		assert_eq!("AGCM", json["algorithm"]);
		assert_eq!("AQID", json["nonce"]);
		assert_eq!("BAUGBw==", json["sealed"]);
	}

	#[test]
	fn hidden_fields_are_omitted() {
		let text = Envelope::new(None, Some(""), vec![1], vec![2]).to_text().unwrap();

		assert!(!text.contains("algorithm"));
		assert!(!text.contains("header"));
	}

	#[test]
	fn field_order_is_irrelevant() {
		let e = Envelope::parse(r#"{"sealed":"BAUGBw==","nonce":"AQID","algorithm":"AGCM","header":"h1"}"#)
			.unwrap();
		assert_eq!(envelope(), e);
	}

	#[test]
	fn unknown_fields_are_ignored() {
		let e = Envelope::parse(r#"{"v":2,"nonce":"AQID","sealed":"BAUGBw=="}"#).unwrap();
		assert!(e.is_algorithm_hidden());
		assert_eq!(None, e.header());
	}

	#[test]
	fn not_json() {
		assert!(matches!(Envelope::parse("hello"), Err(Error::Codec(_))));
		assert!(matches!(Envelope::parse(""), Err(Error::Codec(_))));
		assert!(matches!(Envelope::parse("[1, 2]"), Err(Error::Codec(_))));
	}

	#[test]
	fn missing_fields() {
		assert!(matches!(
			Envelope::parse(r#"{"algorithm":"AGCM","sealed":"BAUGBw=="}"#),
			Err(Error::Codec(_))
		));
		assert!(matches!(
			Envelope::parse(r#"{"algorithm":"AGCM","nonce":"AQID"}"#),
			Err(Error::Codec(_))
		));
	}

	#[test]
	fn bad_base64() {
		assert!(matches!(
			Envelope::parse(r#"{"nonce":"!!!","sealed":"BAUGBw=="}"#),
			Err(Error::Codec(_))
		));
		assert!(matches!(
			Envelope::parse(r#"{"nonce":"AQID","sealed":42}"#),
			Err(Error::Codec(_))
		));
	}

	#[test]
	fn wrongly_typed_algorithm() {
		assert!(matches!(
			Envelope::parse(r#"{"algorithm":5,"nonce":"AQID","sealed":"BAUGBw=="}"#),
			Err(Error::Codec(_))
		));
	}
}
