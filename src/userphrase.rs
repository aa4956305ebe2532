//! Persistent user phrase stores.
//!
//! The engine learns new phrases over time. Entries are keyed by the phoneme
//! sequence and the phrase string together, and carry the frequency triple
//! used by the adaptive ranking: the original frequency at insert time, the
//! highest frequency among competing phrases, and the user frequency that
//! drifts between them as the phrase is, or is not, reused.

use indexmap::IndexMap;
use thiserror::Error;

use crate::dictionary::Dictionary;
use crate::zhuyin::Syllable;

pub use sqlite::SqliteUserDictionary;

mod sqlite;

/// Frequency assigned to a brand-new entry with no dictionary backing.
pub const FREQ_INIT_VALUE: u32 = 1;
/// Upper bound for any user frequency.
pub const MAX_ALLOW_FREQ: u32 = 99_999_999;

const SHORT_INCREASE_FREQ: u32 = 10;
const MEDIUM_INCREASE_FREQ: u32 = 5;
const LONG_DECREASE_FREQ: u32 = 10;

/// A phrase learned from the user, with its adaptive frequency data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserPhrase {
    pub phrase: String,
    pub user_freq: u32,
    pub orig_freq: u32,
    pub max_freq: u32,
    pub last_used: u64,
}

/// What [`UserDictionary::upsert`] did to the entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateAction {
    Inserted,
    Modified,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("phrase not found")]
    NotFound,
    #[error("invalid phrase or phone sequence")]
    InvalidInput,
    #[error("user phrase store failure")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A key/value store of user phrases.
///
/// The store is externally synchronized: at most one session holds an open
/// handle at a time. All operations are synchronous. A commit brackets its
/// batch of upserts between [`begin`][UserDictionary::begin] and
/// [`end`][UserDictionary::end] so transactional backends can group them.
pub trait UserDictionary {
    /// Returns every phrase stored for the exact phoneme sequence.
    fn phrases_for(&self, syllables: &[Syllable]) -> Vec<UserPhrase>;
    /// Returns the entry for the phoneme sequence and phrase, if present.
    fn lookup(&self, syllables: &[Syllable], phrase: &str) -> Option<UserPhrase>;
    /// Inserts a new entry or applies the frequency-adjustment rule to an
    /// existing one. `orig_freq` and `max_freq` come from the caller, which
    /// can consult the static dictionary; `now` is the session lifetime.
    fn upsert(
        &mut self,
        syllables: &[Syllable],
        phrase: &str,
        orig_freq: u32,
        max_freq: u32,
        now: u64,
    ) -> Result<UpdateAction, StoreError>;
    /// Removes the entry. Removing an absent entry is an error.
    fn remove(&mut self, syllables: &[Syllable], phrase: &str) -> Result<(), StoreError>;
    /// Enumerates the (phoneme sequence, phrase) keys of every entry.
    fn entries(&self) -> Vec<(Vec<Syllable>, String)>;
    /// Starts a batch of updates done on behalf of a single commit.
    fn begin(&mut self) {}
    /// Ends the current batch of updates.
    fn end(&mut self) {}
    /// The stored lifetime counter.
    fn lifetime(&self) -> u64;
    /// Increments the lifetime counter, once per commit.
    fn bump_lifetime(&mut self) -> u64;
}

/// Computes the new user frequency for an entry that was used again after
/// `delta_time` commits.
///
/// Recently used entries move toward the maximum frequency, stale entries
/// decay back toward their original frequency. The thresholds and divisors
/// are inherited and deliberately kept as they were.
pub(crate) fn update_freq(freq: u32, max_freq: u32, orig_freq: u32, delta_time: u64) -> u32 {
    let spread = max_freq.saturating_sub(orig_freq);
    if delta_time < 4000 {
        let delta = if freq >= max_freq {
            (spread / 5 + 1).min(SHORT_INCREASE_FREQ)
        } else {
            (spread / 5 + 1).max(SHORT_INCREASE_FREQ)
        };
        freq.saturating_add(delta).min(MAX_ALLOW_FREQ)
    } else if delta_time < 50000 {
        let delta = if freq >= max_freq {
            (spread / 10 + 1).min(MEDIUM_INCREASE_FREQ)
        } else {
            (spread / 10 + 1).max(MEDIUM_INCREASE_FREQ)
        };
        freq.saturating_add(delta).min(MAX_ALLOW_FREQ)
    } else {
        let delta = (freq.saturating_sub(orig_freq) / 5).max(LONG_DECREASE_FREQ);
        freq.saturating_sub(delta).max(orig_freq)
    }
}

/// The base frequency the static dictionary assigns to this exact phrase,
/// or [`FREQ_INIT_VALUE`] when the dictionary does not know it.
pub(crate) fn original_freq(dict: &dyn Dictionary, syllables: &[Syllable], phrase: &str) -> u32 {
    dict.lookup_phrase(syllables)
        .find(|it| it.as_str() == phrase)
        .map(|it| it.freq())
        .unwrap_or(FREQ_INIT_VALUE)
}

/// The highest frequency among all phrases, static or learned, sharing this
/// phoneme sequence.
pub(crate) fn max_freq(
    dict: &dyn Dictionary,
    user: &dyn UserDictionary,
    syllables: &[Syllable],
) -> u32 {
    let dict_max = dict
        .lookup_phrase(syllables)
        .map(|it| it.freq())
        .max()
        .unwrap_or(FREQ_INIT_VALUE);
    let user_max = user
        .phrases_for(syllables)
        .iter()
        .map(|it| it.user_freq)
        .max()
        .unwrap_or(FREQ_INIT_VALUE);
    dict_max.max(user_max).max(FREQ_INIT_VALUE)
}

/// A user phrase store that lives only as long as the session.
///
/// Used by tests and as the degraded mode when the persistent store cannot
/// be acquired.
#[derive(Debug, Default)]
pub struct MemoryUserDictionary {
    entries: IndexMap<(Vec<Syllable>, String), UserPhrase>,
    lifetime: u64,
}

impl MemoryUserDictionary {
    pub fn new() -> MemoryUserDictionary {
        Default::default()
    }
}

impl UserDictionary for MemoryUserDictionary {
    fn phrases_for(&self, syllables: &[Syllable]) -> Vec<UserPhrase> {
        self.entries
            .iter()
            .filter(|((seq, _), _)| seq == syllables)
            .map(|(_, data)| data.clone())
            .collect()
    }

    fn lookup(&self, syllables: &[Syllable], phrase: &str) -> Option<UserPhrase> {
        self.entries
            .get(&(syllables.to_vec(), phrase.to_owned()))
            .cloned()
    }

    fn upsert(
        &mut self,
        syllables: &[Syllable],
        phrase: &str,
        orig_freq: u32,
        max_freq: u32,
        now: u64,
    ) -> Result<UpdateAction, StoreError> {
        if syllables.is_empty() || phrase.is_empty() {
            return Err(StoreError::InvalidInput);
        }
        let key = (syllables.to_vec(), phrase.to_owned());
        match self.entries.get_mut(&key) {
            Some(data) => {
                data.user_freq = update_freq(
                    data.user_freq,
                    max_freq,
                    data.orig_freq,
                    now.saturating_sub(data.last_used),
                );
                data.max_freq = max_freq;
                data.last_used = now;
                Ok(UpdateAction::Modified)
            }
            None => {
                self.entries.insert(
                    key,
                    UserPhrase {
                        phrase: phrase.to_owned(),
                        user_freq: orig_freq,
                        orig_freq,
                        max_freq,
                        last_used: now,
                    },
                );
                Ok(UpdateAction::Inserted)
            }
        }
    }

    fn remove(&mut self, syllables: &[Syllable], phrase: &str) -> Result<(), StoreError> {
        self.entries
            .shift_remove(&(syllables.to_vec(), phrase.to_owned()))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn entries(&self) -> Vec<(Vec<Syllable>, String)> {
        self.entries.keys().cloned().collect()
    }

    fn lifetime(&self) -> u64 {
        self.lifetime
    }

    fn bump_lifetime(&mut self) -> u64 {
        self.lifetime += 1;
        self.lifetime
    }
}

#[cfg(test)]
mod tests {
    use crate::{syl, zhuyin::Bopomofo::*};

    use super::{update_freq, MemoryUserDictionary, UpdateAction, UserDictionary, MAX_ALLOW_FREQ};

    #[test]
    fn upsert_twice_keeps_single_entry_and_freq_grows() {
        let mut user = MemoryUserDictionary::new();
        let seq = [syl![C, E, TONE4], syl![SH, TONE4]];
        assert_eq!(
            UpdateAction::Inserted,
            user.upsert(&seq, "測試", 100, 9318, 1).unwrap()
        );
        let first = user.lookup(&seq, "測試").unwrap();
        assert_eq!(
            UpdateAction::Modified,
            user.upsert(&seq, "測試", 100, 9318, 2).unwrap()
        );
        let second = user.lookup(&seq, "測試").unwrap();
        assert_eq!(1, user.entries().len());
        assert!(second.user_freq > first.user_freq);
        assert_eq!(2, second.last_used);
    }

    #[test]
    fn remove_twice_is_an_error() {
        let mut user = MemoryUserDictionary::new();
        let seq = [syl![C, E, TONE4]];
        user.upsert(&seq, "策", 1, 1, 0).unwrap();
        assert!(user.remove(&seq, "策").is_ok());
        assert!(user.remove(&seq, "策").is_err());
    }

    #[test]
    fn phrases_for_filters_by_sequence() {
        let mut user = MemoryUserDictionary::new();
        user.upsert(&[syl![C, E, TONE4]], "策", 1, 1, 0).unwrap();
        user.upsert(&[syl![SH, TONE4]], "士", 1, 1, 0).unwrap();
        let phrases = user.phrases_for(&[syl![C, E, TONE4]]);
        assert_eq!(1, phrases.len());
        assert_eq!("策", phrases[0].phrase);
    }

    #[test]
    fn short_interval_moves_toward_max() {
        // below max the spread based increment applies, (9318-100)/5+1
        assert_eq!(100 + 1844, update_freq(100, 9318, 100, 0));
        // below max and a small spread, the increment is at least 10
        assert_eq!(110, update_freq(100, 105, 100, 3999));
        // at or above max, the increment is at most 10
        assert_eq!(9319, update_freq(9318, 9318, 9318, 0));
    }

    #[test]
    fn medium_interval_uses_divisor_ten() {
        assert_eq!(100 + 922, update_freq(100, 9318, 100, 4000));
        assert_eq!(9319, update_freq(9318, 9318, 9318, 49999));
    }

    #[test]
    fn long_interval_decays_toward_origin() {
        // (600 - 100) / 5 = 100
        assert_eq!(500, update_freq(600, 9318, 100, 50000));
        // decay never crosses the original frequency
        assert_eq!(100, update_freq(105, 9318, 100, 50000));
    }

    #[test]
    fn frequency_is_capped() {
        assert_eq!(
            MAX_ALLOW_FREQ,
            update_freq(MAX_ALLOW_FREQ, MAX_ALLOW_FREQ, 1, 0)
        );
    }
}
