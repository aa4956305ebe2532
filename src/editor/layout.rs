//! Keyboard layout support for the phonetic syllable editor.
//!
//! Mapping keystrokes to phonetic symbols is the job of an external layout
//! collaborator. The engine carries the closed set of known layouts for
//! configuration round-trips, and ships the standard (Dai Chien) mapping
//! which is printed on almost every keyboard sold in Taiwan.

use crate::zhuyin::{Bopomofo, BopomofoKind, Syllable};

/// The closed set of keyboard layouts. Ordinals are stable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyboardLayout {
    #[default]
    Default = 0,
    Hsu,
    Ibm,
    GinYieh,
    Et,
    Et26,
    Dvorak,
    DvorakHsu,
    DachenCp26,
    HanyuPinyin,
    ThlPinyin,
    Mps2Pinyin,
    Carpalx,
    ColemakDhAnsi,
    ColemakDhOrth,
    Workman,
    Colemak,
}

impl KeyboardLayout {
    /// Looks a layout up by its stable ordinal.
    pub fn from_ordinal(ordinal: u8) -> Option<KeyboardLayout> {
        use KeyboardLayout::*;
        Some(match ordinal {
            0 => Default,
            1 => Hsu,
            2 => Ibm,
            3 => GinYieh,
            4 => Et,
            5 => Et26,
            6 => Dvorak,
            7 => DvorakHsu,
            8 => DachenCp26,
            9 => HanyuPinyin,
            10 => ThlPinyin,
            11 => Mps2Pinyin,
            12 => Carpalx,
            13 => ColemakDhAnsi,
            14 => ColemakDhOrth,
            15 => Workman,
            16 => Colemak,
            _ => return None,
        })
    }

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }
}

/// How the syllable editor responded to a key.
#[derive(Debug, PartialEq, Eq)]
pub enum SyllableKeyBehavior {
    /// The key put a phonetic symbol into the buffer.
    Absorb,
    /// The key ended the syllable; the caller should try to commit it.
    TryCommit,
    /// The key means nothing to this layout.
    KeyError,
}

/// The in-progress phonetic syllable buffer of the standard layout.
///
/// One key is one symbol. A tone key, or Space for the first tone, ends the
/// syllable.
#[derive(Debug, Default)]
pub struct Standard {
    syllable: Syllable,
}

impl Standard {
    pub fn new() -> Standard {
        Standard {
            syllable: Syllable::new(),
        }
    }

    fn map_key(key: u8) -> Option<Bopomofo> {
        use Bopomofo::*;
        Some(match key {
            b'1' => B,
            b'q' => P,
            b'a' => M,
            b'z' => F,
            b'2' => D,
            b'w' => T,
            b's' => N,
            b'x' => L,
            b'e' => G,
            b'd' => K,
            b'c' => H,
            b'r' => J,
            b'f' => Q,
            b'v' => X,
            b'5' => ZH,
            b't' => CH,
            b'g' => SH,
            b'b' => R,
            b'y' => Z,
            b'h' => C,
            b'n' => S,
            b'u' => I,
            b'j' => U,
            b'm' => IU,
            b'8' => A,
            b'i' => O,
            b'k' => E,
            b',' => EH,
            b'9' => AI,
            b'o' => EI,
            b'l' => AU,
            b'.' => OU,
            b'0' => AN,
            b'p' => EN,
            b';' => ANG,
            b'/' => ENG,
            b'-' => ER,
            b'3' => TONE3,
            b'4' => TONE4,
            b'6' => TONE2,
            b'7' => TONE5,
            b' ' => TONE1,
            _ => return None,
        })
    }

    /// Handles a key press event and returns the behavior of the layout.
    pub fn key_press(&mut self, key: u8) -> SyllableKeyBehavior {
        match Self::map_key(key) {
            Some(bopomofo) => self.push_bopomofo(bopomofo),
            None => SyllableKeyBehavior::KeyError,
        }
    }

    /// Feeds a phonetic symbol, from the key map or an external layout.
    pub fn push_bopomofo(&mut self, bopomofo: Bopomofo) -> SyllableKeyBehavior {
        if bopomofo.kind() == BopomofoKind::Tone {
            if self.syllable.is_empty() {
                return SyllableKeyBehavior::KeyError;
            }
            // the first tone is not written out
            if bopomofo != Bopomofo::TONE1 {
                self.syllable.update(bopomofo);
            }
            return SyllableKeyBehavior::TryCommit;
        }
        // a new symbol invalidates any stale tone
        self.syllable.tone.take();
        self.syllable.update(bopomofo);
        SyllableKeyBehavior::Absorb
    }

    /// Returns whether the editor contains any input.
    pub fn is_entering(&self) -> bool {
        !self.syllable.is_empty()
    }

    /// Removes the last phonetic symbol from the buffer and returns it, or
    /// [`None`] if it is empty.
    pub fn pop(&mut self) -> Option<Bopomofo> {
        self.syllable.pop()
    }

    /// Clears the phonetic syllable buffer.
    pub fn clear(&mut self) {
        self.syllable.clear();
    }

    /// Returns the current buffer without changing it.
    pub fn observe(&self) -> Syllable {
        self.syllable
    }
}

#[cfg(test)]
mod tests {
    use crate::{syl, zhuyin::Bopomofo};

    use super::{KeyboardLayout, Standard, SyllableKeyBehavior};

    #[test]
    fn layout_ordinals_are_stable() {
        assert_eq!(0, KeyboardLayout::Default.ordinal());
        assert_eq!(1, KeyboardLayout::Hsu.ordinal());
        assert_eq!(8, KeyboardLayout::DachenCp26.ordinal());
        assert_eq!(16, KeyboardLayout::Colemak.ordinal());
        for ordinal in 0..=16 {
            assert_eq!(
                ordinal,
                KeyboardLayout::from_ordinal(ordinal).unwrap().ordinal()
            );
        }
        assert_eq!(None, KeyboardLayout::from_ordinal(17));
    }

    #[test]
    fn type_a_syllable_with_tone() {
        let mut editor = Standard::new();
        assert_eq!(SyllableKeyBehavior::Absorb, editor.key_press(b'h'));
        assert_eq!(SyllableKeyBehavior::Absorb, editor.key_press(b'k'));
        assert_eq!(SyllableKeyBehavior::TryCommit, editor.key_press(b'4'));
        assert_eq!(syl![Bopomofo::C, Bopomofo::E, Bopomofo::TONE4], editor.observe());
    }

    #[test]
    fn space_commits_first_tone() {
        let mut editor = Standard::new();
        editor.key_press(b'g');
        assert_eq!(SyllableKeyBehavior::TryCommit, editor.key_press(b' '));
        assert_eq!(syl![Bopomofo::SH], editor.observe());
    }

    #[test]
    fn tone_on_empty_buffer_is_an_error() {
        let mut editor = Standard::new();
        assert_eq!(SyllableKeyBehavior::KeyError, editor.key_press(b'4'));
        assert_eq!(SyllableKeyBehavior::KeyError, editor.key_press(b' '));
    }

    #[test]
    fn unknown_key_is_an_error() {
        let mut editor = Standard::new();
        assert_eq!(SyllableKeyBehavior::KeyError, editor.key_press(b'@'));
    }

    #[test]
    fn same_kind_replaces() {
        let mut editor = Standard::new();
        editor.key_press(b'h');
        editor.key_press(b'g');
        editor.key_press(b'k');
        assert_eq!(syl![Bopomofo::SH, Bopomofo::E], editor.observe());
    }

    #[test]
    fn pop_and_clear() {
        let mut editor = Standard::new();
        editor.key_press(b'h');
        editor.key_press(b'k');
        assert!(editor.is_entering());
        assert_eq!(Some(Bopomofo::E), editor.pop());
        editor.clear();
        assert!(!editor.is_entering());
    }
}
