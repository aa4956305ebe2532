use std::cell::RefCell;
use std::cmp::Ordering;
use std::ops::Neg;
use std::rc::Rc;

use tracing::trace;

use crate::dictionary::{Dictionary, Phrase};
use crate::userphrase::UserDictionary;
use crate::zhuyin::Syllable;

use super::{Break, ChineseSequence, Connect, ConversionEngine, Interval, MAX_PHRASE_LEN};

/// Where a phrase interval was resolved from. When the static dictionary and
/// the user store offer the same string the user entry wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PhraseSource {
    Dict,
    User,
}

#[derive(Clone, Debug)]
struct PossibleInterval {
    start: usize,
    end: usize,
    source: PhraseSource,
    phrase: Phrase,
}

impl PossibleInterval {
    fn len(&self) -> usize {
        self.end - self.start
    }
    fn contains(&self, other: &PossibleInterval) -> bool {
        self.start <= other.start && self.end >= other.end
    }
    fn intersects(&self, other: &PossibleInterval) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }
}

impl From<PossibleInterval> for Interval {
    fn from(value: PossibleInterval) -> Self {
        Interval {
            start: value.start,
            end: value.end,
            phrase: value.phrase.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct CoverRecord {
    interval_index: Vec<usize>,
    score: i32,
    match_connects: usize,
}

/// The conversion engine.
///
/// Finds, for every admissible phoneme interval, the best phrase the static
/// dictionary or the user phrase store can supply, then covers the sequence
/// with non-overlapping intervals: either the single highest scoring cover
/// found with dynamic programming, or the ranked list of all maximal covers
/// used for interactive rephrasing.
pub struct PhrasingEngine {
    dict: Rc<dyn Dictionary>,
    user: Rc<RefCell<dyn UserDictionary>>,
}

impl PhrasingEngine {
    pub fn new(
        dict: Rc<dyn Dictionary>,
        user: Rc<RefCell<dyn UserDictionary>>,
    ) -> PhrasingEngine {
        PhrasingEngine { dict, user }
    }

    /// All phrases either source can produce for the syllables, user entries
    /// overriding dictionary entries of the same string, ordered by
    /// descending effective frequency.
    pub fn candidates(&self, syllables: &[Syllable]) -> Vec<Phrase> {
        let mut phrases: Vec<Phrase> = vec![];
        for phrase in self.dict.lookup_phrase(syllables) {
            if !phrases.iter().any(|it| it.as_str() == phrase.as_str()) {
                phrases.push(phrase);
            }
        }
        for user_phrase in self.user.borrow().phrases_for(syllables) {
            let phrase = Phrase::new(user_phrase.phrase, user_phrase.user_freq);
            match phrases
                .iter_mut()
                .find(|it| it.as_str() == phrase.as_str())
            {
                Some(existing) => *existing = phrase,
                None => phrases.push(phrase),
            }
        }
        phrases.sort_by(|a, b| b.freq().cmp(&a.freq()));
        phrases
    }

    fn no_break_inside(start: usize, end: usize, breaks: &[Break]) -> bool {
        !breaks.iter().any(|br| br.0 > start && br.0 < end)
    }

    /// A selection that intersects the span without being contained rules the
    /// whole span out.
    fn selection_rules_out(start: usize, end: usize, selections: &[Interval]) -> bool {
        let span = Interval {
            start,
            end,
            phrase: String::new(),
        };
        selections
            .iter()
            .any(|s| span.intersects(s) && !span.contains(s))
    }

    /// Whether the phrase agrees with every selection contained in the span.
    fn phrase_agrees(start: usize, end: usize, phrase: &str, selections: &[Interval]) -> bool {
        selections
            .iter()
            .filter(|s| start <= s.start && end >= s.end)
            .all(|s| {
                let substring: String = phrase
                    .chars()
                    .skip(s.start - start)
                    .take(s.end - s.start)
                    .collect();
                substring == s.phrase
            })
    }

    fn best_dict_phrase(
        &self,
        start: usize,
        end: usize,
        syllables: &[Syllable],
        selections: &[Interval],
    ) -> Option<Phrase> {
        // dictionary iteration is frequency descending, the first phrase
        // satisfying the selections is the best one
        self.dict
            .lookup_phrase(syllables)
            .find(|phrase| Self::phrase_agrees(start, end, phrase.as_str(), selections))
    }

    fn best_user_phrase(
        &self,
        start: usize,
        end: usize,
        syllables: &[Syllable],
        selections: &[Interval],
    ) -> Option<Phrase> {
        self.user
            .borrow()
            .phrases_for(syllables)
            .into_iter()
            .filter(|it| Self::phrase_agrees(start, end, &it.phrase, selections))
            .max_by_key(|it| it.user_freq)
            .map(|it| Phrase::new(it.phrase, it.user_freq))
    }

    /// Discovers at most one interval per admissible span: the best phrase
    /// consistent with the breaks and prior selections.
    fn find_intervals(&self, sequence: &ChineseSequence) -> Vec<PossibleInterval> {
        let mut intervals = vec![];
        let len = sequence.syllables.len();
        for start in 0..len {
            for end in start + 1..=len.min(start + MAX_PHRASE_LEN) {
                if !Self::no_break_inside(start, end, &sequence.breaks) {
                    break;
                }
                if Self::selection_rules_out(start, end, &sequence.selections) {
                    continue;
                }
                let syllables = &sequence.syllables[start..end];
                let user = self.best_user_phrase(start, end, syllables, &sequence.selections);
                let dict = self.best_dict_phrase(start, end, syllables, &sequence.selections);
                let (source, phrase) = match (user, dict) {
                    (Some(user), Some(dict)) => {
                        // the same phrase, the user entry overrides
                        if user.as_str() == dict.as_str() || user.freq() > dict.freq() {
                            (PhraseSource::User, user)
                        } else {
                            (PhraseSource::Dict, dict)
                        }
                    }
                    (Some(user), None) => (PhraseSource::User, user),
                    (None, Some(dict)) => (PhraseSource::Dict, dict),
                    (None, None) => continue,
                };
                trace!(
                    "interval [{start}, {end}) {} ({:?} {})",
                    phrase.as_str(),
                    source,
                    phrase.freq()
                );
                intervals.push(PossibleInterval {
                    start,
                    end,
                    source,
                    phrase,
                });
            }
        }
        intervals
    }

    /// Removes intervals contained in another interval's span.
    ///
    /// Example:
    /// 國民大會 has three intervals: 國民, 大會, 國民大會. This pass removes
    /// 國民 and 大會 because 國民大會 contains both.
    ///
    /// An interval another interval partially overlaps keeps its contained
    /// intervals; they are still needed to complete covers around the
    /// overlapper.
    fn discard_contained(&self, intervals: Vec<PossibleInterval>) -> Vec<PossibleInterval> {
        let mut discarded = vec![false; intervals.len()];
        for a in 0..intervals.len() {
            if discarded[a] {
                continue;
            }
            let blocked = intervals.iter().enumerate().any(|(b, other)| {
                b != a
                    && !discarded[b]
                    && !intervals[a].contains(other)
                    && other.end > intervals[a].start
                    && intervals[a].end > other.start
            });
            if blocked {
                continue;
            }
            for b in 0..intervals.len() {
                if b != a && !discarded[b] && intervals[a].contains(&intervals[b]) {
                    discarded[b] = true;
                }
            }
        }
        intervals
            .into_iter()
            .zip(discarded)
            .filter(|(_, discarded)| !discarded)
            .map(|(interval, _)| interval)
            .collect()
    }

    /// Removes every interval that cannot take part in any cover reaching
    /// back to the head of the sequence.
    ///
    /// Example:
    /// With length 5 and intervals [0,1), [0,2), [1,3), [1,4), [4,5), [2,5),
    /// the possible covers are [0,2)[2,5) and [0,1)[1,4)[4,5). [1,3) cannot
    /// connect to the head or the tail, so it is removed.
    fn discard_unreachable(
        &self,
        len: usize,
        intervals: Vec<PossibleInterval>,
    ) -> Vec<PossibleInterval> {
        let mut leftmost: Vec<usize> = (0..=len).collect();
        let mut graph = vec![vec![false; len + 1]; len + 1];
        for it in &intervals {
            graph[it.start][it.end] = true;
            graph[it.end][it.start] = true;
        }
        for a in 0..=len {
            for i in 0..=len {
                if graph[a][i] && leftmost[i] < leftmost[a] {
                    leftmost[a] = leftmost[i];
                }
            }
        }
        let snapshot = intervals.clone();
        intervals
            .into_iter()
            .enumerate()
            .filter(|(i, it)| {
                if leftmost[it.start] == 0 {
                    return true;
                }
                // positions fully overwritten by every other interval cannot
                // appear in any cover through this interval
                let mut overwrite = vec![false; len];
                for (j, other) in snapshot.iter().enumerate() {
                    if *i != j {
                        overwrite[other.start..other.end]
                            .iter_mut()
                            .for_each(|pos| *pos = true);
                    }
                }
                !overwrite[it.start..it.end].iter().all(|pos| *pos)
            })
            .map(|(_, it)| it)
            .collect()
    }

    fn rule_largest_sum(interval_index: &[usize], intervals: &[PossibleInterval]) -> i32 {
        let mut score = 0;
        for &i in interval_index {
            score += intervals[i].len();
        }
        score as i32
    }

    fn rule_largest_avgwordlen(interval_index: &[usize], intervals: &[PossibleInterval]) -> i32 {
        // constant factor 6=1*2*3, to keep value as integer
        6 * Self::rule_largest_sum(interval_index, intervals)
            / i32::try_from(interval_index.len()).expect("interval count fits i32")
    }

    fn rule_smallest_lenvariance(interval_index: &[usize], intervals: &[PossibleInterval]) -> i32 {
        let len = interval_index.len();
        let mut score = 0;
        // heuristic, the original never squared the differences
        for i in 0..len {
            for j in i + 1..len {
                let interval_1 = &intervals[interval_index[i]];
                let interval_2 = &intervals[interval_index[j]];
                score += interval_1.len().abs_diff(interval_2.len());
            }
        }
        i32::try_from(score).expect("score fits i32").neg()
    }

    fn rule_largest_freqsum(interval_index: &[usize], intervals: &[PossibleInterval]) -> i32 {
        let mut score: i64 = 0;
        for &i in interval_index {
            let interval = &intervals[i];
            // one-word phrases have far lower weight
            let reduction_factor = if interval.len() == 1 { 512 } else { 1 };
            score += i64::from(interval.phrase.freq() / reduction_factor);
        }
        score.clamp(0, i64::from(i32::MAX)) as i32
    }

    fn score(interval_index: &[usize], intervals: &[PossibleInterval]) -> i32 {
        if interval_index.is_empty() {
            return 0;
        }
        let mut total_score = 0;
        total_score += 1000 * Self::rule_largest_sum(interval_index, intervals);
        total_score += 1000 * Self::rule_largest_avgwordlen(interval_index, intervals);
        total_score += 100 * Self::rule_smallest_lenvariance(interval_index, intervals);
        total_score += Self::rule_largest_freqsum(interval_index, intervals);
        total_score
    }

    /// Covers whose intervals span more connect-marked positions sort first.
    fn count_match_connects(
        interval_index: &[usize],
        intervals: &[PossibleInterval],
        connects: &[Connect],
    ) -> usize {
        connects
            .iter()
            .filter(|connect| {
                interval_index
                    .iter()
                    .any(|&k| intervals[k].start < connect.0 && intervals[k].end > connect.0)
            })
            .count()
    }

    fn dp_phrasing(&self, len: usize, mut intervals: Vec<PossibleInterval>) -> Vec<Interval> {
        // Assume P(x,y) is the highest score phrasing result from x to y. The
        // following is the formula for P(x,y):
        //
        // P(x,y) = MAX( P(x,y-1)+P(y-1,y), P(x,y-2)+P(y-2,y), ... )
        //
        // While P(x,y-1) is stored in the highest_score array, and P(y-1,y)
        // is an interval ending at y. In this formula, x is always 0.
        let mut highest_score: Vec<Option<CoverRecord>> = vec![None; len + 1];

        // The intervals must be sorted by the increasing order of end.
        intervals.sort_by(|a, b| a.end.cmp(&b.end).then(a.start.cmp(&b.start)));

        for i in 0..intervals.len() {
            let start = intervals[i].start;
            let end = intervals[i].end;

            let prefix = if start == 0 {
                Some(CoverRecord::default())
            } else {
                highest_score[start].clone()
            };
            let Some(mut record) = prefix else {
                continue;
            };
            record.interval_index.push(i);
            record.score = Self::score(&record.interval_index, &intervals);

            match &highest_score[end] {
                Some(best) if best.score >= record.score => (),
                _ => highest_score[end] = Some(record),
            }
        }

        highest_score[len]
            .take()
            .map(|record| {
                record
                    .interval_index
                    .into_iter()
                    .map(|i| intervals[i].clone().into())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether every interval referenced by `b` is contained in some interval
    /// referenced by `a`. Both records walk left to right.
    fn record_contains(
        a: &[usize],
        b: &[usize],
        intervals: &[PossibleInterval],
    ) -> bool {
        let mut big = 0;
        for &small in b {
            loop {
                if big >= a.len() || intervals[a[big]].start >= intervals[small].end {
                    return false;
                }
                if intervals[a[big]].contains(&intervals[small]) {
                    break;
                }
                big += 1;
            }
        }
        true
    }

    /// Stores a finished record unless a kept record already contains it,
    /// evicting any kept record it contains.
    fn save_record(
        record: &[usize],
        intervals: &[PossibleInterval],
        records: &mut Vec<CoverRecord>,
    ) {
        if records
            .iter()
            .any(|kept| Self::record_contains(&kept.interval_index, record, intervals))
        {
            return;
        }
        records
            .retain(|kept| !Self::record_contains(record, &kept.interval_index, intervals));
        records.push(CoverRecord {
            interval_index: record.to_vec(),
            score: 0,
            match_connects: 0,
        });
    }

    /// Enumerates maximal covers with a recursive walk from position zero.
    /// `intervals` must be sorted by (start, end).
    fn recursive_save(
        from_index: usize,
        to: usize,
        record: &mut Vec<usize>,
        intervals: &[PossibleInterval],
        records: &mut Vec<CoverRecord>,
    ) {
        let mut first = from_index;
        while first < intervals.len() && intervals[first].start < to {
            first += 1;
        }
        if first == intervals.len() {
            Self::save_record(record, intervals, records);
            return;
        }
        record.push(first);
        Self::recursive_save(first + 1, intervals[first].end, record, intervals, records);
        record.pop();
        // every interval that intersects the first candidate is a candidate
        for i in first + 1..intervals.len() {
            if !intervals[first].intersects(&intervals[i]) {
                break;
            }
            record.push(i);
            Self::recursive_save(i + 1, intervals[i].end, record, intervals, records);
            record.pop();
        }
    }

    fn all_covers(
        &self,
        sequence: &ChineseSequence,
        intervals: Vec<PossibleInterval>,
    ) -> (Vec<PossibleInterval>, Vec<CoverRecord>) {
        let len = sequence.syllables.len();
        let intervals = self.discard_contained(intervals);
        let mut intervals = self.discard_unreachable(len, intervals);
        intervals.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

        let mut records = vec![];
        let mut record = vec![];
        Self::recursive_save(0, 0, &mut record, &intervals, &mut records);
        for record in records.iter_mut() {
            record.score = Self::score(&record.interval_index, &intervals);
            record.match_connects = Self::count_match_connects(
                &record.interval_index,
                &intervals,
                &sequence.connects,
            );
        }
        // ties on score break by the number of matched connect marks
        records.sort_by(|a, b| match b.match_connects.cmp(&a.match_connects) {
            Ordering::Equal => b.score.cmp(&a.score),
            ordering => ordering,
        });
        (intervals, records)
    }
}

impl ConversionEngine for PhrasingEngine {
    fn convert(&self, sequence: &ChineseSequence) -> Vec<Interval> {
        let intervals = self.find_intervals(sequence);
        self.dp_phrasing(sequence.syllables.len(), intervals)
    }

    fn convert_next(&self, sequence: &ChineseSequence, next: usize) -> Vec<Interval> {
        let intervals = self.find_intervals(sequence);
        let (intervals, records) = self.all_covers(sequence, intervals);
        if records.is_empty() {
            return vec![];
        }
        let record = &records[next % records.len()];
        record
            .interval_index
            .iter()
            .map(|&i| intervals[i].clone().into())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashMap, rc::Rc};

    use crate::{
        conversion::{Break, ChineseSequence, Connect, ConversionEngine, Interval},
        dictionary::{Dictionary, Phrase},
        syl,
        userphrase::{MemoryUserDictionary, UserDictionary},
        zhuyin::Bopomofo::*,
    };

    use super::PhrasingEngine;

    fn test_dictionary() -> Rc<dyn Dictionary> {
        Rc::new(HashMap::from([
            (vec![syl![G, U, O, TONE2]], vec![Phrase::new("國", 1)]),
            (vec![syl![M, I, EN, TONE2]], vec![Phrase::new("民", 1)]),
            (vec![syl![D, A, TONE4]], vec![Phrase::new("大", 1)]),
            (vec![syl![H, U, EI, TONE4]], vec![Phrase::new("會", 1)]),
            (vec![syl![D, AI, TONE4]], vec![Phrase::new("代", 1)]),
            (vec![syl![B, I, AU, TONE3]], vec![Phrase::new("表", 1)]),
            (
                vec![syl![G, U, O, TONE2], syl![M, I, EN, TONE2]],
                vec![Phrase::new("國民", 200)],
            ),
            (
                vec![syl![D, A, TONE4], syl![H, U, EI, TONE4]],
                vec![Phrase::new("大會", 200)],
            ),
            (
                vec![syl![D, AI, TONE4], syl![B, I, AU, TONE3]],
                vec![Phrase::new("代表", 200), Phrase::new("戴錶", 100)],
            ),
            (vec![syl![X, I, EN]], vec![Phrase::new("心", 1)]),
            (
                vec![syl![K, U, TONE4], syl![I, EN]],
                vec![Phrase::new("庫音", 300)],
            ),
            (
                vec![syl![X, I, EN], syl![K, U, TONE4], syl![I, EN]],
                vec![Phrase::new("新酷音", 200)],
            ),
            (vec![syl![X, IU, EH, TONE2]], vec![Phrase::new("學", 300)]),
            (vec![syl![SH, ENG]], vec![Phrase::new("生", 100)]),
            (
                vec![syl![D, A, TONE4], syl![X, IU, EH, TONE2]],
                vec![Phrase::new("大學", 2000)],
            ),
            (
                vec![syl![X, IU, EH, TONE2], syl![SH, ENG]],
                vec![Phrase::new("學生", 1000)],
            ),
        ]))
    }

    fn test_engine() -> PhrasingEngine {
        PhrasingEngine::new(
            test_dictionary(),
            Rc::new(RefCell::new(MemoryUserDictionary::new())),
        )
    }

    fn guo_min_da_hui_dai_biau() -> Vec<crate::zhuyin::Syllable> {
        vec![
            syl![G, U, O, TONE2],
            syl![M, I, EN, TONE2],
            syl![D, A, TONE4],
            syl![H, U, EI, TONE4],
            syl![D, AI, TONE4],
            syl![B, I, AU, TONE3],
        ]
    }

    fn intervals(spans: &[(usize, usize, &str)]) -> Vec<Interval> {
        spans
            .iter()
            .map(|&(start, end, phrase)| Interval {
                start,
                end,
                phrase: phrase.to_string(),
            })
            .collect()
    }

    #[test]
    fn convert_empty_sequence() {
        let engine = test_engine();
        let sequence = ChineseSequence::default();
        assert_eq!(Vec::<Interval>::new(), engine.convert(&sequence));
        assert_eq!(Vec::<Interval>::new(), engine.convert_next(&sequence, 0));
    }

    #[test]
    fn convert_simple_chinese_sequence() {
        let engine = test_engine();
        let sequence = ChineseSequence {
            syllables: guo_min_da_hui_dai_biau(),
            ..Default::default()
        };
        assert_eq!(
            intervals(&[(0, 2, "國民"), (2, 4, "大會"), (4, 6, "代表")]),
            engine.convert(&sequence)
        );
    }

    #[test]
    fn convert_chinese_sequence_with_breaks() {
        let engine = test_engine();
        let sequence = ChineseSequence {
            syllables: guo_min_da_hui_dai_biau(),
            breaks: vec![Break(1), Break(5)],
            ..Default::default()
        };
        assert_eq!(
            intervals(&[
                (0, 1, "國"),
                (1, 2, "民"),
                (2, 4, "大會"),
                (4, 5, "代"),
                (5, 6, "表")
            ]),
            engine.convert(&sequence)
        );
    }

    #[test]
    fn convert_chinese_sequence_with_good_selection() {
        let engine = test_engine();
        let sequence = ChineseSequence {
            syllables: guo_min_da_hui_dai_biau(),
            selections: intervals(&[(4, 6, "戴錶")]),
            ..Default::default()
        };
        assert_eq!(
            intervals(&[(0, 2, "國民"), (2, 4, "大會"), (4, 6, "戴錶")]),
            engine.convert(&sequence)
        );
    }

    #[test]
    fn convert_chinese_sequence_with_substring_selection() {
        let engine = test_engine();
        let sequence = ChineseSequence {
            syllables: vec![syl![X, I, EN], syl![K, U, TONE4], syl![I, EN]],
            selections: intervals(&[(1, 3, "酷音")]),
            ..Default::default()
        };
        assert_eq!(
            intervals(&[(0, 3, "新酷音")]),
            engine.convert(&sequence)
        );
    }

    #[test]
    fn user_phrase_overrides_dictionary() {
        let user = Rc::new(RefCell::new(MemoryUserDictionary::new()));
        user.borrow_mut()
            .upsert(
                &[syl![D, AI, TONE4], syl![B, I, AU, TONE3]],
                "戴錶",
                100,
                200,
                1,
            )
            .unwrap();
        // drive the user frequency above the dictionary's 代表
        for time in 2..40 {
            user.borrow_mut()
                .upsert(
                    &[syl![D, AI, TONE4], syl![B, I, AU, TONE3]],
                    "戴錶",
                    100,
                    200,
                    time,
                )
                .unwrap();
        }
        let engine = PhrasingEngine::new(test_dictionary(), user);
        let sequence = ChineseSequence {
            syllables: vec![syl![D, AI, TONE4], syl![B, I, AU, TONE3]],
            ..Default::default()
        };
        assert_eq!(intervals(&[(0, 2, "戴錶")]), engine.convert(&sequence));
    }

    #[test]
    fn convert_cycle_alternatives() {
        let engine = test_engine();
        let sequence = ChineseSequence {
            syllables: guo_min_da_hui_dai_biau(),
            ..Default::default()
        };
        let best = intervals(&[(0, 2, "國民"), (2, 4, "大會"), (4, 6, "代表")]);
        assert_eq!(best, engine.convert_next(&sequence, 0));

        let mut seen = vec![];
        let mut count = 0;
        loop {
            let cover = engine.convert_next(&sequence, count);
            if count > 0 && cover == best {
                break;
            }
            seen.push(cover);
            count += 1;
        }
        // every alternative covers the whole sequence exactly once
        for cover in &seen {
            let mut covered = vec![false; 6];
            for interval in cover {
                for pos in interval.start..interval.end {
                    assert!(!covered[pos]);
                    covered[pos] = true;
                }
            }
            assert!(covered.into_iter().all(|c| c));
        }
        // and the cycle wraps back to the best cover
        assert_eq!(best, engine.convert_next(&sequence, count));
    }

    #[test]
    fn convert_next_cycles_ambiguous_phrasings() {
        let engine = test_engine();
        let sequence = ChineseSequence {
            syllables: vec![syl![D, A, TONE4], syl![X, IU, EH, TONE2], syl![SH, ENG]],
            ..Default::default()
        };
        assert_eq!(
            intervals(&[(0, 2, "大學"), (2, 3, "生")]),
            engine.convert_next(&sequence, 0)
        );
        assert_eq!(
            intervals(&[(0, 1, "大"), (1, 3, "學生")]),
            engine.convert_next(&sequence, 1)
        );
        // the all-singles cover is dominated and the cycle wraps
        assert_eq!(
            intervals(&[(0, 2, "大學"), (2, 3, "生")]),
            engine.convert_next(&sequence, 2)
        );
    }

    #[test]
    fn connect_marks_break_score_ties() {
        let engine = test_engine();
        let with_connect = ChineseSequence {
            syllables: vec![syl![D, A, TONE4], syl![X, IU, EH, TONE2], syl![SH, ENG]],
            connects: vec![Connect(2)],
            ..Default::default()
        };
        // 學生 is the only phrase spanning position 2, so the cover keeping
        // it joined wins even though 大學 scores higher
        assert_eq!(
            intervals(&[(0, 1, "大"), (1, 3, "學生")]),
            engine.convert_next(&with_connect, 0)
        );
    }

    #[test]
    fn candidates_merge_user_and_dictionary() {
        let user = Rc::new(RefCell::new(MemoryUserDictionary::new()));
        user.borrow_mut()
            .upsert(
                &[syl![D, AI, TONE4], syl![B, I, AU, TONE3]],
                "戴錶",
                100,
                200,
                1,
            )
            .unwrap();
        let engine = PhrasingEngine::new(test_dictionary(), user);
        let candidates = engine.candidates(&[syl![D, AI, TONE4], syl![B, I, AU, TONE3]]);
        assert_eq!(2, candidates.len());
        assert_eq!("代表", candidates[0].as_str());
        assert_eq!("戴錶", candidates[1].as_str());
        // the user entry supplies the effective frequency
        assert_eq!(100, candidates[1].freq());
    }
}
