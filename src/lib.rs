//! Authenticated encryption of individual values, packed into self-describing text envelopes.
//!
//! Each value you encrypt becomes a small JSON document (an [`Envelope`]) holding a fresh random
//! nonce, the ciphertext with its authentication tag, an optional plaintext header, and the
//! identifier of the algorithm that sealed it.  That text can go straight into a database
//! column, and [`decode`] will work out on its own how to open it again.  Any change to the
//! nonce or the ciphertext, however small, is detected, and is reported as an
//! [`Error::AuthenticationFailure`] rather than as garbled plaintext.
//!
//! Eight algorithms are available; see [`Algorithm`] for the list, and their identifiers.  All of
//! them take raw key bytes of an algorithm-specific length (see [`validate`]), and
//! [`generate_key`] will make you a suitable one.
//!
//! # Hidden Algorithms
//!
//! If you would rather not advertise which algorithm protects your data, an envelope can be
//! written without its algorithm identifier.  It can then only be decrypted by supplying the
//! right algorithm as the default; any other algorithm simply fails to authenticate.
//!
//! # Fields and Settings
//!
//! For the common case of "this column is encrypted", an [`EncryptedField`] bundles up the
//! per-column choices (algorithm, header, hidden or not), and fetches the key and default
//! algorithm from a [`Settings`] implementation every time it's used.  [`EnvSettings`] reads them
//! from the environment; [`StaticSettings`] holds them directly.
mod algorithm;
mod envelope;
mod error;
mod field;
mod kdf;
mod key;
mod registry;
mod service;
mod settings;
mod stream;

pub use algorithm::{Algorithm, AlgorithmSpec, Family, resolve};
pub use envelope::Envelope;
pub use error::Error;
pub use field::{ColumnOptions, EncryptedField};
pub use key::{KeyMaterial, generate_key, validate};
pub use service::{decode, encode};
pub use settings::{ALGORITHM_VAR, EnvSettings, KEY_VAR, Settings, StaticSettings};
