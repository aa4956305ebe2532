//! Dictionaries for looking up phrases.
//!
//! The conversion engine never knows where phrases come from. Anything that
//! implements the [`Dictionary`] trait, from the memory mapped system
//! dictionary to a plain [`HashMap`] in tests, can provide candidates.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::{self, Display};

use crate::zhuyin::Syllable;

pub use trie::{BuildDictionaryError, TrieDictionary, TrieDictionaryBuilder, TrieOpenError};

mod trie;

/// A phrase and its base frequency.
///
/// The string length in characters always equals the number of syllables the
/// phrase was keyed under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Phrase {
    phrase: String,
    freq: u32,
}

impl Phrase {
    pub fn new<S: Into<String>>(phrase: S, freq: u32) -> Phrase {
        Phrase {
            phrase: phrase.into(),
            freq,
        }
    }
    pub fn as_str(&self) -> &str {
        self.phrase.as_str()
    }
    pub fn freq(&self) -> u32 {
        self.freq
    }
}

/// Phrases are ordered by their frequency.
impl PartialOrd for Phrase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Phrase {
    fn cmp(&self, other: &Self) -> Ordering {
        self.freq
            .cmp(&other.freq)
            .then_with(|| self.phrase.cmp(&other.phrase))
    }
}

impl<S: Into<String>> From<(S, u32)> for Phrase {
    fn from(tuple: (S, u32)) -> Self {
        Phrase::new(tuple.0, tuple.1)
    }
}

impl From<Phrase> for String {
    fn from(phrase: Phrase) -> Self {
        phrase.phrase
    }
}

impl Display for Phrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generic iterator over the phrases and their frequency in a dictionary.
pub type Phrases<'a> = Box<dyn Iterator<Item = Phrase> + 'a>;

/// A collection of metadata of a dictionary.
///
/// Useful for configuration applications that let users pick dictionaries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DictionaryInfo {
    /// The name of the dictionary.
    pub name: Option<String>,
    /// The copyright information of the dictionary.
    pub copyright: Option<String>,
    /// The license information of the dictionary.
    ///
    /// It's recommended to use the [SPDX license identifier](https://spdx.org/licenses/).
    pub license: Option<String>,
    /// The version of the dictionary.
    pub version: Option<String>,
    /// The name of the software used to generate the dictionary.
    pub software: Option<String>,
}

/// An interface for looking up dictionaries.
///
/// # Examples
///
/// The std [`HashMap`] implements the `Dictionary` trait so it can be used in
/// tests.
///
/// ```
/// use std::collections::HashMap;
///
/// use liuyin::{dictionary::{Dictionary, Phrase}, syl, zhuyin::Bopomofo};
///
/// let dict = HashMap::from([
///     (
///         vec![syl![Bopomofo::C, Bopomofo::E, Bopomofo::TONE4]],
///         vec![Phrase::new("測", 100)],
///     ),
/// ]);
///
/// for phrase in dict.lookup_phrase(
///     &[syl![Bopomofo::C, Bopomofo::E, Bopomofo::TONE4]]
/// ) {
///     assert_eq!("測", phrase.as_str());
///     assert_eq!(100, phrase.freq());
/// }
/// ```
pub trait Dictionary {
    /// Returns an iterator to all single syllable words matched by the
    /// syllable, if any. The result should use a stable order each time for
    /// the same input.
    fn lookup_word(&self, syllable: Syllable) -> Phrases {
        self.lookup_phrase(&[syllable])
    }
    /// Returns an iterator to all phrases matched by the syllables, if any.
    /// The result should use a stable order each time for the same input.
    fn lookup_phrase(&self, syllables: &[Syllable]) -> Phrases;
    /// Returns information about the dictionary instance.
    fn about(&self) -> DictionaryInfo;
}

impl Dictionary for HashMap<Vec<Syllable>, Vec<Phrase>> {
    fn lookup_phrase(&self, syllables: &[Syllable]) -> Phrases {
        self.get(syllables)
            .cloned()
            .map(|mut phrases| {
                phrases.sort_by(|a, b| b.freq.cmp(&a.freq));
                Box::new(phrases.into_iter()) as Phrases
            })
            .unwrap_or_else(|| Box::new(std::iter::empty()))
    }

    fn about(&self) -> DictionaryInfo {
        Default::default()
    }
}

/// A dictionary that always misses. Stands in when the system dictionary
/// file cannot be found so the engine stays operable.
#[derive(Debug, Default)]
pub struct EmptyDictionary;

impl Dictionary for EmptyDictionary {
    fn lookup_phrase(&self, _syllables: &[Syllable]) -> Phrases {
        Box::new(std::iter::empty())
    }

    fn about(&self) -> DictionaryInfo {
        Default::default()
    }
}
