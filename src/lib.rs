//! The Liuyin (流音) intelligent Zhuyin phonetic input method engine.
//!
//! Liuyin converts a stream of keyboard events into Traditional Chinese
//! text. Phonetic syllables accumulate into a phoneme sequence; the
//! conversion engine partitions the sequence into phrases from a static
//! dictionary and a persistent user phrase store; the user can override the
//! phrasing through an interactive candidate picker; accepted phrasings
//! feed back into the store so the engine adapts over time.
//!
//! The crate is organized bottom-up:
//!
//! * [`zhuyin`] — phonetic symbols and the packed syllable codec
//! * [`dictionary`] — the read-only system dictionary
//! * [`userphrase`] — the adaptive user phrase store
//! * [`conversion`] — interval discovery, scoring and partitioning
//! * [`editor`] — the session: buffers, candidate picker, key handling
//! * [`path`] — data file discovery
//!
//! A session is single threaded; the embedder serializes all calls on one
//! [`editor::Editor`] handle. The system dictionary is immutable and may be
//! shared between sessions in the same process.

pub mod conversion;
pub mod dictionary;
pub mod editor;
pub mod path;
pub mod userphrase;
pub mod zhuyin;
