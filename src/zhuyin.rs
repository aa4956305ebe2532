//! Zhuyin Fuhao, or Bopomofo, the phonetic notation for Mandarin.
//!
//! A syllable is made of up to four phonetic symbols: an optional initial,
//! an optional medial glide, an optional rime, and an optional tone mark.
//! Syllables pack into 16-bit integers for compact storage in dictionaries
//! and user phrase stores.

mod bopomofo;
mod syllable;

pub use bopomofo::{Bopomofo, BopomofoKind, ParseBopomofoError};
pub use syllable::{DecodeSyllableError, ParseSyllableError, Syllable, SyllableBuilder};
