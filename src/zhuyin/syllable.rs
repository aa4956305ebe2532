use std::fmt::{self, Display};
use std::str::FromStr;

use thiserror::Error;

use super::{Bopomofo, BopomofoKind, ParseBopomofoError};

/// The consonants and vowels that are taken together to make a single sound.
///
/// <https://en.m.wikipedia.org/wiki/Syllable#Chinese_model>
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Syllable {
    pub initial: Option<Bopomofo>,
    pub medial: Option<Bopomofo>,
    pub rime: Option<Bopomofo>,
    pub tone: Option<Bopomofo>,
}

impl Syllable {
    pub const fn new() -> Syllable {
        Syllable {
            initial: None,
            medial: None,
            rime: None,
            tone: None,
        }
    }
    pub const fn builder() -> SyllableBuilder {
        SyllableBuilder {
            syllable: Syllable::new(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.initial.is_none()
            && self.medial.is_none()
            && self.rime.is_none()
            && self.tone.is_none()
    }
    pub fn has_initial(&self) -> bool {
        self.initial.is_some()
    }
    pub fn has_medial(&self) -> bool {
        self.medial.is_some()
    }
    pub fn has_rime(&self) -> bool {
        self.rime.is_some()
    }
    pub fn has_tone(&self) -> bool {
        self.tone.is_some()
    }
    /// Whether the syllable may stand in a committed phoneme sequence.
    ///
    /// A rime or an explicit tone mark ends a syllable. First-tone syllables
    /// without a rime (for example ㄓ) carry neither; callers are expected to
    /// validate those against the dictionary.
    pub fn is_complete(&self) -> bool {
        self.rime.is_some() || self.tone.is_some()
    }
    /// Number of symbols in the bopomofo rendering of this syllable.
    pub fn display_len(&self) -> usize {
        [self.initial, self.medial, self.rime, self.tone]
            .iter()
            .filter(|it| it.is_some())
            .count()
    }
    /// Returns the `Syllable` encoded in a u16 integer.
    ///
    /// The data layout used:
    ///
    /// ```text
    ///  0                   1
    ///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |   Initial   | M | Rime  |Tone |
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// ```
    ///
    /// An empty syllable encodes to zero.
    pub fn to_u16(&self) -> u16 {
        let initial = self.initial.map_or(0, |v| v.initial_index());
        let medial = self.medial.map_or(0, |v| v.medial_index());
        let rime = self.rime.map_or(0, |v| v.rime_index());
        let tone = self.tone.map_or(0, |v| v.tone_index());

        (initial << 9) | (medial << 7) | (rime << 3) | tone
    }
    /// Replaces the symbol of the same kind and keeps the rest.
    pub fn update(&mut self, bopomofo: Bopomofo) {
        match bopomofo.kind() {
            BopomofoKind::Initial => self.initial.replace(bopomofo),
            BopomofoKind::Medial => self.medial.replace(bopomofo),
            BopomofoKind::Rime => self.rime.replace(bopomofo),
            BopomofoKind::Tone => self.tone.replace(bopomofo),
        };
    }
    /// Removes the last symbol in tone, rime, medial, initial order and
    /// returns it, or [`None`] if the syllable is empty.
    pub fn pop(&mut self) -> Option<Bopomofo> {
        for bopomofo in [
            &mut self.tone,
            &mut self.rime,
            &mut self.medial,
            &mut self.initial,
        ] {
            if bopomofo.is_some() {
                return bopomofo.take();
            }
        }
        None
    }
    pub fn clear(&mut self) {
        *self = Syllable::new()
    }
}

impl From<Syllable> for u16 {
    fn from(syl: Syllable) -> Self {
        syl.to_u16()
    }
}

impl TryFrom<u16> for Syllable {
    type Error = DecodeSyllableError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let initial = value >> 9;
        let medial = (value >> 7) & 0b11;
        let rime = (value >> 3) & 0b1111;
        let tone = value & 0b111;

        let decode = |index, from: fn(u16) -> Option<Bopomofo>| match index {
            0 => Ok(None),
            _ => from(index).map(Some).ok_or(DecodeSyllableError),
        };

        Ok(Syllable {
            initial: decode(initial, Bopomofo::from_initial)?,
            medial: decode(medial, Bopomofo::from_medial)?,
            rime: decode(rime, Bopomofo::from_rime)?,
            tone: decode(tone, Bopomofo::from_tone)?,
        })
    }
}

impl Display for Syllable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bopomofo in [self.initial, self.medial, self.rime, self.tone]
            .into_iter()
            .flatten()
        {
            write!(f, "{}", bopomofo)?;
        }
        Ok(())
    }
}

impl FromStr for Syllable {
    type Err = ParseSyllableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut syllable = Syllable::new();
        for c in s.chars() {
            let bopomofo = Bopomofo::try_from(c)?;
            if match bopomofo.kind() {
                BopomofoKind::Initial => syllable.initial.is_some(),
                BopomofoKind::Medial => syllable.medial.is_some(),
                BopomofoKind::Rime => syllable.rime.is_some(),
                BopomofoKind::Tone => syllable.tone.is_some(),
            } {
                return Err(ParseSyllableError::Duplicate);
            }
            syllable.update(bopomofo);
        }
        Ok(syllable)
    }
}

pub struct SyllableBuilder {
    syllable: Syllable,
}

impl SyllableBuilder {
    pub const fn insert(mut self, bopomofo: Bopomofo) -> SyllableBuilder {
        match bopomofo.kind() {
            BopomofoKind::Initial => {
                if self.syllable.initial.is_some() {
                    panic!("multiple initial bopomofo");
                }
                self.syllable.initial = Some(bopomofo);
            }
            BopomofoKind::Medial => {
                if self.syllable.medial.is_some() {
                    panic!("multiple medial bopomofo");
                }
                self.syllable.medial = Some(bopomofo);
            }
            BopomofoKind::Rime => {
                if self.syllable.rime.is_some() {
                    panic!("multiple rime bopomofo");
                }
                self.syllable.rime = Some(bopomofo);
            }
            BopomofoKind::Tone => {
                if self.syllable.tone.is_some() {
                    panic!("multiple tone bopomofo");
                }
                self.syllable.tone = Some(bopomofo);
            }
        };
        self
    }
    pub const fn build(self) -> Syllable {
        self.syllable
    }
}

#[derive(Error, Debug)]
#[error("syllable decode error")]
pub struct DecodeSyllableError;

#[derive(Error, Debug)]
pub enum ParseSyllableError {
    #[error("unknown symbol")]
    Bopomofo(#[from] ParseBopomofoError),
    #[error("multiple symbols of the same kind")]
    Duplicate,
}

#[macro_export]
macro_rules! syl {
    () => { $crate::zhuyin::Syllable::new() };
    ($($bopomofo:expr),+) => {
        {
            let mut builder = $crate::zhuyin::Syllable::builder();
            $(builder = builder.insert($bopomofo);)+
            builder.build()
        }
    };
}

#[cfg(test)]
mod tests {
    use super::{Bopomofo, Syllable};

    #[test]
    fn syllable_hsu_sdf_as_u16() {
        let syl = Syllable::builder().insert(Bopomofo::S).build();
        assert_eq!(0x2A00, syl.to_u16());

        let syl = Syllable::builder().insert(Bopomofo::D).build();
        assert_eq!(0xA00, syl.to_u16());

        let syl = Syllable::builder().insert(Bopomofo::F).build();
        assert_eq!(0x800, syl.to_u16());
    }

    #[test]
    fn empty_syllable_as_u16() {
        assert_eq!(0, Syllable::builder().build().to_u16());
        assert_eq!(Syllable::new(), Syllable::try_from(0).unwrap());
    }

    #[test]
    fn syllable_as_u16_roundtrip() {
        let syl = syl![Bopomofo::S, Bopomofo::I, Bopomofo::EN, Bopomofo::TONE4];
        assert_eq!(syl, syl.to_u16().try_into().unwrap());
    }

    #[test]
    fn decode_rejects_unknown_combination() {
        // initial index 22 does not exist
        assert!(Syllable::try_from(22 << 9).is_err());
    }

    #[test]
    fn syl_macro_rules() {
        let syl = syl![];
        assert_eq!(Syllable::new(), syl);

        let syl = syl![Bopomofo::S, Bopomofo::I, Bopomofo::EN, Bopomofo::TONE4];
        assert_eq!(
            Syllable::builder()
                .insert(Bopomofo::S)
                .insert(Bopomofo::I)
                .insert(Bopomofo::EN)
                .insert(Bopomofo::TONE4)
                .build(),
            syl
        );
    }

    #[test]
    #[should_panic]
    fn syl_macro_rules_fool_proof() {
        syl![Bopomofo::S, Bopomofo::D];
    }

    #[test]
    fn syl_macro_rules_compiles_in_const() {
        const SYLLABLE: Syllable = syl![Bopomofo::S, Bopomofo::I, Bopomofo::EN];
        assert_eq!(
            Syllable::builder()
                .insert(Bopomofo::S)
                .insert(Bopomofo::I)
                .insert(Bopomofo::EN)
                .build(),
            SYLLABLE
        );
    }

    #[test]
    fn new_and_pop_bopomofo() {
        let mut syl = syl![Bopomofo::S, Bopomofo::I, Bopomofo::EN, Bopomofo::TONE4];
        assert_eq!(Some(Bopomofo::TONE4), syl.pop());
        assert_eq!(Some(Bopomofo::EN), syl.pop());
        assert_eq!(Some(Bopomofo::I), syl.pop());
        assert_eq!(Some(Bopomofo::S), syl.pop());
        assert_eq!(None, syl.pop());
        assert_eq!(syl![], syl);
    }

    #[test]
    fn display_and_parse_round_trip() {
        let syl = syl![Bopomofo::C, Bopomofo::E, Bopomofo::TONE4];
        assert_eq!("ㄘㄜˋ", syl.to_string());
        assert_eq!(syl, "ㄘㄜˋ".parse().unwrap());

        let syl = syl![Bopomofo::SH, Bopomofo::TONE4];
        assert_eq!(syl, syl.to_string().parse().unwrap());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("ㄘx".parse::<Syllable>().is_err());
        assert!("ㄘㄙ".parse::<Syllable>().is_err());
    }

    #[test]
    fn completeness() {
        assert!(syl![Bopomofo::C, Bopomofo::E].is_complete());
        assert!(syl![Bopomofo::SH, Bopomofo::TONE4].is_complete());
        assert!(!syl![Bopomofo::SH].is_complete());
        assert!(!syl![].is_complete());
    }
}
