//! The candidate picker.
//!
//! Opening the picker at the cursor computes the avail list, the ordered set
//! of phrase lengths available there, longest first. For each length the
//! picker shows a pageable, frequency-ranked candidate list. The picker is
//! also a two-level symbol chooser: categories first, then the symbols of
//! the chosen category, or the variant list of the symbol under the cursor.

use indexmap::IndexSet;

use crate::conversion::{Interval, MAX_PHRASE_LEN};

use super::{symbols, CellKind, Editor, KeyBehavior};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChoiceState {
    Word,
    SymbolCategory,
    SymbolInsert,
    SymbolUpdate,
}

#[derive(Debug)]
pub(crate) struct ChoiceContext {
    pub(crate) state: ChoiceState,
    pub(crate) old_cursor: usize,
    /// For word choice, the phone the picker is anchored on. Intervals start
    /// here, or end here under rearward phrase choice.
    pub(crate) anchor: usize,
    /// Available phrase lengths, ascending.
    pub(crate) avail: Vec<usize>,
    pub(crate) current: usize,
    pub(crate) candidates: Vec<String>,
    pub(crate) page: usize,
}

impl ChoiceContext {
    fn current_len(&self) -> usize {
        self.avail[self.current]
    }
}

impl Editor {
    /// The phoneme span of the currently selected length.
    fn current_word_span(&self, ctx: &ChoiceContext) -> (usize, usize) {
        let len = ctx.current_len();
        if self.options.phrase_choice_rearward {
            (ctx.anchor + 1 - len, ctx.anchor + 1)
        } else {
            (ctx.anchor, ctx.anchor + len)
        }
    }

    fn has_phrase(&self, from: usize, to: usize) -> bool {
        let syllables = &self.syllables[from..to];
        if self.dict.lookup_phrase(syllables).next().is_some() {
            return true;
        }
        if !self.user.borrow().phrases_for(syllables).is_empty() {
            return true;
        }
        if to - from == 1 && self.syllables_alt[from] != self.syllables[from] {
            return self
                .dict
                .lookup_word(self.syllables_alt[from])
                .next()
                .is_some();
        }
        false
    }

    /// Phrase lengths available at the anchor, ascending. Symbol cells bound
    /// the span on both sides.
    fn avail_lengths(&self, anchor: usize) -> Vec<usize> {
        let total = self.syllables.len();
        let symbol_breaks = self.symbol_break_positions();
        let mut avail = vec![];
        for len in 1..=MAX_PHRASE_LEN {
            let (from, to) = if self.options.phrase_choice_rearward {
                if len > anchor + 1 {
                    break;
                }
                (anchor + 1 - len, anchor + 1)
            } else {
                if anchor + len > total {
                    break;
                }
                (anchor, anchor + len)
            };
            if symbol_breaks.iter().any(|&p| p > from && p < to) {
                break;
            }
            if self.has_phrase(from, to) {
                avail.push(len);
            }
        }
        avail
    }

    /// Opens the candidate picker on the cell at the cursor.
    pub fn open_choice(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            return KeyBehavior::Ignored;
        }
        if self.preedit.is_empty() {
            return KeyBehavior::Ignored;
        }
        let old_cursor = self.cursor;
        if self.cursor == self.preedit.len() {
            self.cursor -= 1;
        }
        if self.preedit[self.cursor].kind == CellKind::Symbol {
            return self.open_symbol_variants(old_cursor);
        }
        let anchor = self.phone_cursor();
        let avail = self.avail_lengths(anchor);
        if avail.is_empty() {
            self.cursor = old_cursor;
            return KeyBehavior::Bell;
        }
        let current = avail.len() - 1;
        self.choice = Some(ChoiceContext {
            state: ChoiceState::Word,
            old_cursor,
            anchor,
            avail,
            current,
            candidates: vec![],
            page: 0,
        });
        self.sync_choice_cursor();
        self.load_word_candidates();
        KeyBehavior::Absorbed
    }

    /// Opens level one of the symbol picker.
    pub fn open_symbol_categories(&mut self) -> KeyBehavior {
        if self.symbol_table.is_empty() {
            return KeyBehavior::Absorbed;
        }
        let candidates = self
            .symbol_table
            .categories
            .iter()
            .map(|category| category.name.clone())
            .collect();
        self.choice = Some(ChoiceContext {
            state: ChoiceState::SymbolCategory,
            old_cursor: self.cursor,
            anchor: 0,
            avail: vec![1],
            current: 0,
            candidates,
            page: 0,
        });
        KeyBehavior::Absorbed
    }

    /// Reopens the variant list of the symbol cell under the cursor.
    fn open_symbol_variants(&mut self, old_cursor: usize) -> KeyBehavior {
        let key = self.preedit[self.cursor].symbol_key;
        match key {
            None => {
                self.cursor = old_cursor;
                self.open_symbol_categories()
            }
            Some(key) => match symbols::symbol_variants(key) {
                Some(variants) => {
                    self.choice = Some(ChoiceContext {
                        state: ChoiceState::SymbolUpdate,
                        old_cursor,
                        anchor: 0,
                        avail: vec![1],
                        current: 0,
                        candidates: variants.iter().map(|it| it.to_string()).collect(),
                        page: 0,
                    });
                    KeyBehavior::Absorbed
                }
                None => {
                    self.cursor = old_cursor;
                    KeyBehavior::Bell
                }
            },
        }
    }

    /// Closes the picker without choosing, restoring the cursor.
    pub fn close_choice(&mut self) {
        if let Some(ctx) = self.choice.take() {
            self.cursor = ctx.old_cursor.min(self.preedit.len());
        }
    }

    fn sync_choice_cursor(&mut self) {
        let Some(ctx) = &self.choice else {
            return;
        };
        if ctx.state != ChoiceState::Word || !self.options.phrase_choice_rearward {
            return;
        }
        let (from, _) = self.current_word_span(ctx);
        self.cursor = self.cell_of_phone(from);
    }

    fn load_word_candidates(&mut self) {
        let Some(ctx) = &self.choice else {
            return;
        };
        let (from, to) = self.current_word_span(ctx);
        let mut list: Vec<String> = self
            .engine
            .candidates(&self.syllables[from..to])
            .into_iter()
            .map(String::from)
            .collect();
        if to - from == 1 && self.syllables_alt[from] != self.syllables[from] {
            for phrase in self.engine.candidates(&self.syllables_alt[from..from + 1]) {
                list.push(phrase.into());
            }
        }
        let list: IndexSet<String> = list.into_iter().collect();
        if let Some(ctx) = &mut self.choice {
            ctx.candidates = list.into_iter().collect();
            ctx.page = 0;
        }
    }

    /// Handles a printable key while the picker is open.
    pub(crate) fn handle_choice_key(&mut self, ch: char) -> KeyBehavior {
        if !ch.is_ascii_graphic() {
            return KeyBehavior::Bell;
        }
        let key = ch as u8;
        if let Some(position) = self.options.sel_keys.iter().position(|&k| k == key) {
            if position < self.options.cand_per_page {
                let Some(ctx) = &self.choice else {
                    return KeyBehavior::Ignored;
                };
                let index = ctx.page * self.options.cand_per_page + position;
                if index < ctx.candidates.len() {
                    return self.choose(index);
                }
                return KeyBehavior::Bell;
            }
        }
        match key {
            b'j' => self.next_length(),
            b'k' => self.prev_length(),
            _ => KeyBehavior::Bell,
        }
    }

    /// Applies the candidate at `index` of the full list.
    pub fn choose(&mut self, index: usize) -> KeyBehavior {
        let Some(ctx) = &self.choice else {
            return KeyBehavior::Ignored;
        };
        if index >= ctx.candidates.len() {
            return KeyBehavior::Bell;
        }
        match ctx.state {
            ChoiceState::Word => self.choose_word(index),
            ChoiceState::SymbolCategory => self.choose_symbol_category(index),
            ChoiceState::SymbolInsert | ChoiceState::SymbolUpdate => self.choose_symbol(index),
        }
    }

    fn choose_word(&mut self, index: usize) -> KeyBehavior {
        let ctx = self.choice.as_ref().expect("word choice is open");
        let (start, end) = self.current_word_span(ctx);
        let phrase = ctx.candidates[index].clone();
        let selection = Interval { start, end, phrase };
        self.selections.retain(|s| !s.intersects(&selection));
        // marks inside the span are implied by the selection now
        for pos in start + 1..end {
            self.breaks[pos] = false;
            self.connects[pos] = false;
        }
        self.selections.push(selection);
        self.close_choice();
        if self.options.auto_shift_cursor {
            self.cursor = self.cell_of_phone(end).min(self.preedit.len());
        }
        self.rephrase();
        KeyBehavior::Absorbed
    }

    fn choose_symbol_category(&mut self, index: usize) -> KeyBehavior {
        let Some(category) = self.symbol_table.categories.get(index).cloned() else {
            return KeyBehavior::Bell;
        };
        if category.symbols.is_empty() {
            // the category inserts itself
            self.close_choice();
            let key = symbols::symbol_key(&category.name);
            if !self.insert_symbol(&category.name, key) {
                return KeyBehavior::Bell;
            }
            self.rephrase();
            return self.finish_mutation();
        }
        if let Some(ctx) = &mut self.choice {
            ctx.state = ChoiceState::SymbolInsert;
            ctx.candidates = category.symbols;
            ctx.page = 0;
        }
        KeyBehavior::Absorbed
    }

    fn choose_symbol(&mut self, index: usize) -> KeyBehavior {
        let ctx = self.choice.as_ref().expect("symbol choice is open");
        let state = ctx.state;
        let glyph = ctx.candidates[index].clone();
        match state {
            ChoiceState::SymbolUpdate => {
                let cell = self.cursor;
                self.preedit[cell].symbol_key = symbols::symbol_key(&glyph).or(self.preedit[cell].symbol_key);
                self.preedit[cell].glyph = glyph;
                self.close_choice();
                self.rephrase();
                KeyBehavior::Absorbed
            }
            _ => {
                self.close_choice();
                let key = symbols::symbol_key(&glyph);
                if !self.insert_symbol(&glyph, key) {
                    return KeyBehavior::Bell;
                }
                self.rephrase();
                self.finish_mutation()
            }
        }
    }

    // ------------------------------------------------------------------
    // length navigation

    /// Cycles to the next, shorter, length class.
    pub fn next_length(&mut self) -> KeyBehavior {
        let Some(ctx) = &mut self.choice else {
            return KeyBehavior::Ignored;
        };
        if ctx.state != ChoiceState::Word {
            return KeyBehavior::Bell;
        }
        ctx.current = match ctx.current {
            0 => ctx.avail.len() - 1,
            current => current - 1,
        };
        self.sync_choice_cursor();
        self.load_word_candidates();
        KeyBehavior::Absorbed
    }

    /// Cycles to the previous, longer, length class.
    pub fn prev_length(&mut self) -> KeyBehavior {
        let Some(ctx) = &mut self.choice else {
            return KeyBehavior::Ignored;
        };
        if ctx.state != ChoiceState::Word {
            return KeyBehavior::Bell;
        }
        ctx.current = (ctx.current + 1) % ctx.avail.len();
        self.sync_choice_cursor();
        self.load_word_candidates();
        KeyBehavior::Absorbed
    }

    /// Jumps back to the longest length class.
    pub fn cand_list_first(&mut self) -> KeyBehavior {
        let Some(ctx) = &mut self.choice else {
            return KeyBehavior::Ignored;
        };
        if ctx.state != ChoiceState::Word {
            return KeyBehavior::Bell;
        }
        ctx.current = ctx.avail.len() - 1;
        self.sync_choice_cursor();
        self.load_word_candidates();
        KeyBehavior::Absorbed
    }

    /// Jumps to the shortest length class.
    pub fn cand_list_last(&mut self) -> KeyBehavior {
        let Some(ctx) = &mut self.choice else {
            return KeyBehavior::Ignored;
        };
        if ctx.state != ChoiceState::Word {
            return KeyBehavior::Bell;
        }
        ctx.current = 0;
        self.sync_choice_cursor();
        self.load_word_candidates();
        KeyBehavior::Absorbed
    }

    pub fn cand_list_has_next(&self) -> bool {
        matches!(&self.choice, Some(ctx) if ctx.state == ChoiceState::Word && ctx.current > 0)
    }

    pub fn cand_list_has_prev(&self) -> bool {
        matches!(&self.choice,
            Some(ctx) if ctx.state == ChoiceState::Word && ctx.current + 1 < ctx.avail.len())
    }

    // ------------------------------------------------------------------
    // paging

    fn total_pages(&self) -> usize {
        match &self.choice {
            Some(ctx) => div_ceil(ctx.candidates.len(), self.options.cand_per_page).max(1),
            None => 0,
        }
    }

    /// Pages forward, wrapping from the last page back to the first.
    pub fn next_page(&mut self) -> KeyBehavior {
        let total = self.total_pages();
        let Some(ctx) = &mut self.choice else {
            return KeyBehavior::Ignored;
        };
        ctx.page = (ctx.page + 1) % total;
        KeyBehavior::Absorbed
    }

    /// Pages backward, wrapping from the first page to the last.
    pub fn prev_page(&mut self) -> KeyBehavior {
        let total = self.total_pages();
        let Some(ctx) = &mut self.choice else {
            return KeyBehavior::Ignored;
        };
        ctx.page = (ctx.page + total - 1) % total;
        KeyBehavior::Absorbed
    }

    pub fn first_page(&mut self) -> KeyBehavior {
        let Some(ctx) = &mut self.choice else {
            return KeyBehavior::Ignored;
        };
        ctx.page = 0;
        KeyBehavior::Absorbed
    }

    pub fn last_page(&mut self) -> KeyBehavior {
        let total = self.total_pages();
        let Some(ctx) = &mut self.choice else {
            return KeyBehavior::Ignored;
        };
        ctx.page = total - 1;
        KeyBehavior::Absorbed
    }

    // ------------------------------------------------------------------
    // observers

    /// Every candidate of the current length class.
    pub fn candidates(&self) -> &[String] {
        match &self.choice {
            Some(ctx) => &ctx.candidates,
            None => &[],
        }
    }

    /// The candidates visible on the current page.
    pub fn current_page_candidates(&self) -> &[String] {
        match &self.choice {
            Some(ctx) => {
                let begin = ctx.page * self.options.cand_per_page;
                let end = (begin + self.options.cand_per_page).min(ctx.candidates.len());
                &ctx.candidates[begin.min(end)..end]
            }
            None => &[],
        }
    }

    pub fn cand_total_choices(&self) -> usize {
        self.choice.as_ref().map_or(0, |ctx| ctx.candidates.len())
    }

    pub fn cand_total_pages(&self) -> usize {
        self.total_pages()
    }

    pub fn cand_current_page(&self) -> usize {
        self.choice.as_ref().map_or(0, |ctx| ctx.page)
    }

    pub fn cand_string_by_index(&self, index: usize) -> Option<&str> {
        self.choice
            .as_ref()
            .and_then(|ctx| ctx.candidates.get(index))
            .map(String::as_str)
    }

    pub fn cand_open(&mut self) -> KeyBehavior {
        self.open_choice()
    }

    pub fn cand_close(&mut self) {
        self.close_choice()
    }

    pub fn cand_choose_by_index(&mut self, index: usize) -> KeyBehavior {
        self.choose(index)
    }
}

fn div_ceil(value: usize, divisor: usize) -> usize {
    (value + divisor - 1) / divisor
}
