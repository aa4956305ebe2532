//! The input method session.
//!
//! An [`Editor`] owns every buffer of one typing session: the in-progress
//! phonetic syllable, the phoneme sequence, the mixed preedit of Chinese
//! characters and symbols, the break and connect marks, the user's phrase
//! selections, and the candidate picker. Keyboard events go in through
//! [`Editor::handle_key`]; the observable buffers come out through getters.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::conversion::{
    Break, ChineseSequence, Connect, ConversionEngine, Interval, PhrasingEngine,
    MAX_PHONE_SEQ_LEN, MAX_PHRASE_LEN,
};
use crate::dictionary::{Dictionary, EmptyDictionary, TrieDictionary};
use crate::userphrase::{
    max_freq, original_freq, MemoryUserDictionary, SqliteUserDictionary, StoreError,
    UserDictionary, UserPhrase,
};
use crate::zhuyin::{Bopomofo, Syllable};

pub use layout::{KeyboardLayout, Standard, SyllableKeyBehavior};
pub use symbols::{EasySymbolTable, SymbolCategory, SymbolTable};

mod choice;
mod layout;
mod symbols;

/// Most cells the preedit buffer will hold before the head is released.
pub const MAX_CHI_SYMBOL_LEN: usize = MAX_PHONE_SEQ_LEN - MAX_PHRASE_LEN;
pub const MIN_CHI_SYMBOL_LEN: usize = 0;
/// Most selection keys a candidate page can use.
pub const MAX_SELKEY: usize = 10;

const DEFAULT_SEL_KEYS: [u8; MAX_SELKEY] = *b"1234567890";

/// File names looked up inside the system and user data directories.
pub const DICT_FILE_NAME: &str = "dictionary.dat";
pub const USER_DB_FILE_NAME: &str = "liuyin.sqlite3";
pub const SYMBOL_TABLE_FILE_NAME: &str = "symbols.dat";
pub const EASY_SYMBOL_FILE_NAME: &str = "swkb.dat";

/// Words that never join their neighbors during auto-learning.
const BREAK_WORDS: [&str; 39] = [
    "是", "的", "了", "不", "也", "而", "你", "我", "他", "與", "它", "她", "其", "就", "和",
    "或", "們", "性", "員", "子", "上", "下", "中", "內", "外", "化", "者", "家", "兒", "年",
    "月", "日", "時", "分", "秒", "街", "路", "村", "在",
];

/// Classification returned by every event handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyBehavior {
    /// The engine did not consume the key; the host should handle it.
    Ignored,
    /// The key mutated the session state.
    Absorbed,
    /// The key produced commit output; read it with
    /// [`Editor::commit_string`].
    Committed,
    /// The key was rejected; the host may ring a bell.
    Bell,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// A keyboard event after the host has decoded its own key codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    /// A phonetic symbol produced by an external keyboard layout.
    Bopomofo(char),
    /// A plain printable key.
    Default(char),
    /// A key on the numeric key pad.
    Numpad(char),
    /// Ctrl plus a digit.
    CtrlNum(u8),
    Arrow(Direction),
    Enter,
    Esc,
    Del,
    Backspace,
    Home,
    End,
    Space,
    Tab,
    ShiftTab,
    PageUp,
    PageDown,
    ShiftLeft,
    ShiftRight,
    Capslock,
    ShiftSpace,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LanguageMode {
    #[default]
    Chinese,
    English,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShapeMode {
    #[default]
    HalfWidth,
    FullWidth,
}

/// The error type which is returned when a configuration value is out of
/// range. The previous setting stays unchanged.
#[derive(Debug, Error)]
#[error("invalid configuration value")]
pub struct InvalidValueError;

/// Runtime options of a session. All setters validate their input.
#[derive(Clone, Debug)]
pub struct EditorOptions {
    kb_type: KeyboardLayout,
    cand_per_page: usize,
    max_chi_symbol_len: usize,
    sel_keys: Vec<u8>,
    add_phrase_forward: bool,
    space_as_selection: bool,
    esc_clean_all_buf: bool,
    auto_shift_cursor: bool,
    easy_symbol_input: bool,
    phrase_choice_rearward: bool,
    auto_learn: bool,
    enable_fullwidth_toggle_key: bool,
    language_mode: LanguageMode,
    shape_mode: ShapeMode,
}

impl Default for EditorOptions {
    fn default() -> EditorOptions {
        EditorOptions {
            kb_type: KeyboardLayout::Default,
            cand_per_page: 10,
            max_chi_symbol_len: 20,
            sel_keys: DEFAULT_SEL_KEYS.to_vec(),
            add_phrase_forward: false,
            space_as_selection: false,
            esc_clean_all_buf: false,
            auto_shift_cursor: false,
            easy_symbol_input: false,
            phrase_choice_rearward: false,
            auto_learn: true,
            enable_fullwidth_toggle_key: true,
            language_mode: LanguageMode::Chinese,
            shape_mode: ShapeMode::HalfWidth,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CellKind {
    Chinese,
    Symbol,
}

/// One display cell of the preedit buffer.
#[derive(Clone, Debug)]
pub(crate) struct PreeditCell {
    pub(crate) kind: CellKind,
    pub(crate) glyph: String,
    /// The ASCII key a symbol cell came from, used to reopen its variants.
    pub(crate) symbol_key: Option<u8>,
}

/// One input method session.
pub struct Editor {
    pub(crate) dict: Rc<dyn Dictionary>,
    pub(crate) user: Rc<RefCell<dyn UserDictionary>>,
    pub(crate) engine: PhrasingEngine,
    pub(crate) options: EditorOptions,
    pub(crate) symbol_table: SymbolTable,
    pub(crate) easy_symbols: EasySymbolTable,

    pub(crate) syllable_editor: Standard,
    pub(crate) syllables: Vec<Syllable>,
    pub(crate) syllables_alt: Vec<Syllable>,
    pub(crate) preedit: Vec<PreeditCell>,
    pub(crate) cursor: usize,
    pub(crate) selections: Vec<Interval>,
    /// One flag per phoneme boundary, so one more than phonemes.
    pub(crate) breaks: Vec<bool>,
    pub(crate) connects: Vec<bool>,
    pub(crate) num_cut: usize,
    pub(crate) cover: Vec<Interval>,
    /// Cover intervals unioned across connect marks, phoneme positions.
    pub(crate) prefer_intervals: Vec<(usize, usize)>,
    pub(crate) disp_intervals: Vec<Interval>,
    pub(crate) choice: Option<choice::ChoiceContext>,
    pub(crate) commit_buf: String,
    pub(crate) aux: Option<String>,
    pub(crate) mark_anchor: Option<usize>,
}

impl Editor {
    pub fn new(dict: Rc<dyn Dictionary>, user: Rc<RefCell<dyn UserDictionary>>) -> Editor {
        let engine = PhrasingEngine::new(dict.clone(), user.clone());
        Editor {
            dict,
            user,
            engine,
            options: EditorOptions::default(),
            symbol_table: SymbolTable::default(),
            easy_symbols: EasySymbolTable::default(),
            syllable_editor: Standard::new(),
            syllables: vec![],
            syllables_alt: vec![],
            preedit: vec![],
            cursor: 0,
            selections: vec![],
            breaks: vec![false],
            connects: vec![false],
            num_cut: 0,
            cover: vec![],
            prefer_intervals: vec![],
            disp_intervals: vec![],
            choice: None,
            commit_buf: String::new(),
            aux: None,
            mark_anchor: None,
        }
    }

    /// Creates a session from the data directories, falling back to empty
    /// resources so the session stays operable when files are missing.
    pub fn open(sys_dir: &Path, user_dir: &Path) -> Editor {
        let dict: Rc<dyn Dictionary> = match TrieDictionary::open(sys_dir.join(DICT_FILE_NAME)) {
            Ok(dict) => Rc::new(dict),
            Err(e) => {
                info!("system dictionary unavailable, lookups will miss: {e}");
                Rc::new(EmptyDictionary)
            }
        };
        let user: Rc<RefCell<dyn UserDictionary>> =
            match SqliteUserDictionary::open(user_dir.join(USER_DB_FILE_NAME)) {
                Ok(user) => Rc::new(RefCell::new(user)),
                Err(e) => {
                    info!("user phrase store unavailable, learning is volatile: {e}");
                    Rc::new(RefCell::new(MemoryUserDictionary::new()))
                }
            };
        let mut editor = Editor::new(dict, user);
        match SymbolTable::load(sys_dir.join(SYMBOL_TABLE_FILE_NAME)) {
            Ok(table) => editor.symbol_table = table,
            Err(e) => info!("symbol table unavailable: {e}"),
        }
        match EasySymbolTable::load(sys_dir.join(EASY_SYMBOL_FILE_NAME)) {
            Ok(table) => editor.easy_symbols = table,
            Err(e) => info!("easy symbol table unavailable: {e}"),
        }
        editor
    }

    pub fn set_symbol_table(&mut self, table: SymbolTable) {
        self.symbol_table = table;
    }

    pub fn set_easy_symbols(&mut self, table: EasySymbolTable) {
        self.easy_symbols = table;
    }

    /// Clears every session buffer. The user phrase store is untouched.
    pub fn reset(&mut self) {
        self.clean_buffers();
        self.commit_buf.clear();
        self.aux = None;
    }

    // ------------------------------------------------------------------
    // observers

    /// The user visible, not yet committed buffer.
    pub fn preedit_string(&self) -> String {
        self.preedit.iter().map(|cell| cell.glyph.as_str()).collect()
    }

    /// The in-progress syllable, rendered in bopomofo.
    pub fn bopomofo_string(&self) -> String {
        self.syllable_editor.observe().to_string()
    }

    /// Output released by the last commit. Cleared by [`Editor::ack_commit`].
    pub fn commit_string(&self) -> &str {
        &self.commit_buf
    }

    pub fn ack_commit(&mut self) {
        self.commit_buf.clear();
    }

    /// Status line for the host, e.g. after a phrase was learned.
    pub fn aux_string(&self) -> Option<&str> {
        self.aux.as_deref()
    }

    /// Cursor position, in preedit cells.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Display intervals of the current phrasing, in preedit cells.
    pub fn intervals(&self) -> impl Iterator<Item = &Interval> {
        self.disp_intervals.iter()
    }

    pub fn is_entering(&self) -> bool {
        !self.preedit.is_empty() || self.syllable_editor.is_entering() || self.is_selecting()
    }

    pub fn is_selecting(&self) -> bool {
        self.choice.is_some()
    }

    // ------------------------------------------------------------------
    // configuration

    pub fn kb_type(&self) -> KeyboardLayout {
        self.options.kb_type
    }

    pub fn set_kb_type(&mut self, ordinal: u8) -> Result<(), InvalidValueError> {
        self.options.kb_type = KeyboardLayout::from_ordinal(ordinal).ok_or(InvalidValueError)?;
        Ok(())
    }

    pub fn cand_per_page(&self) -> usize {
        self.options.cand_per_page
    }

    pub fn set_cand_per_page(&mut self, n: usize) -> Result<(), InvalidValueError> {
        if !(1..=MAX_SELKEY).contains(&n) {
            return Err(InvalidValueError);
        }
        self.options.cand_per_page = n;
        Ok(())
    }

    pub fn max_chi_symbol_len(&self) -> usize {
        self.options.max_chi_symbol_len
    }

    pub fn set_max_chi_symbol_len(&mut self, n: usize) -> Result<(), InvalidValueError> {
        if !(MIN_CHI_SYMBOL_LEN..=MAX_CHI_SYMBOL_LEN).contains(&n) {
            return Err(InvalidValueError);
        }
        self.options.max_chi_symbol_len = n;
        Ok(())
    }

    pub fn sel_keys(&self) -> &[u8] {
        &self.options.sel_keys
    }

    pub fn set_sel_keys(&mut self, keys: &[u8]) -> Result<(), InvalidValueError> {
        if keys.is_empty()
            || keys.len() > MAX_SELKEY
            || keys.iter().any(|k| !k.is_ascii_graphic())
        {
            return Err(InvalidValueError);
        }
        self.options.sel_keys = keys.to_vec();
        Ok(())
    }

    pub fn add_phrase_direction(&self) -> bool {
        self.options.add_phrase_forward
    }

    pub fn set_add_phrase_direction(&mut self, forward: bool) {
        self.options.add_phrase_forward = forward;
    }

    pub fn space_as_selection(&self) -> bool {
        self.options.space_as_selection
    }

    pub fn set_space_as_selection(&mut self, on: bool) {
        self.options.space_as_selection = on;
    }

    pub fn esc_clean_all_buf(&self) -> bool {
        self.options.esc_clean_all_buf
    }

    pub fn set_esc_clean_all_buf(&mut self, on: bool) {
        self.options.esc_clean_all_buf = on;
    }

    pub fn auto_shift_cursor(&self) -> bool {
        self.options.auto_shift_cursor
    }

    pub fn set_auto_shift_cursor(&mut self, on: bool) {
        self.options.auto_shift_cursor = on;
    }

    pub fn easy_symbol_input(&self) -> bool {
        self.options.easy_symbol_input
    }

    pub fn set_easy_symbol_input(&mut self, on: bool) {
        self.options.easy_symbol_input = on;
    }

    pub fn phrase_choice_rearward(&self) -> bool {
        self.options.phrase_choice_rearward
    }

    pub fn set_phrase_choice_rearward(&mut self, on: bool) {
        self.options.phrase_choice_rearward = on;
    }

    pub fn auto_learn(&self) -> bool {
        self.options.auto_learn
    }

    pub fn set_auto_learn(&mut self, on: bool) {
        self.options.auto_learn = on;
    }

    pub fn enable_fullwidth_toggle_key(&self) -> bool {
        self.options.enable_fullwidth_toggle_key
    }

    pub fn set_enable_fullwidth_toggle_key(&mut self, on: bool) {
        self.options.enable_fullwidth_toggle_key = on;
    }

    pub fn language_mode(&self) -> LanguageMode {
        self.options.language_mode
    }

    pub fn set_language_mode(&mut self, mode: LanguageMode) {
        self.syllable_editor.clear();
        self.options.language_mode = mode;
    }

    pub fn shape_mode(&self) -> ShapeMode {
        self.options.shape_mode
    }

    pub fn set_shape_mode(&mut self, mode: ShapeMode) {
        self.options.shape_mode = mode;
    }

    // ------------------------------------------------------------------
    // user phrase API

    /// Enumerates every (phoneme sequence, phrase) pair in the user store.
    pub fn user_phrase_entries(&self) -> Vec<(Vec<Syllable>, String)> {
        self.user.borrow().entries()
    }

    /// Adds or reinforces a user phrase. `bopomofo` is a whitespace
    /// separated list of syllables, one per character of `phrase`.
    pub fn user_phrase_add(&mut self, phrase: &str, bopomofo: &str) -> Result<(), StoreError> {
        let syllables = parse_syllable_seq(bopomofo)?;
        if syllables.len() != phrase.chars().count() || syllables.len() > MAX_PHRASE_LEN {
            return Err(StoreError::InvalidInput);
        }
        let user = self.user.clone();
        let mut user = user.borrow_mut();
        let now = user.lifetime();
        let orig = original_freq(self.dict.as_ref(), &syllables, phrase);
        let max = max_freq(self.dict.as_ref(), &*user, &syllables);
        user.upsert(&syllables, phrase, orig, max, now).map(|_| ())
    }

    pub fn user_phrase_remove(&mut self, phrase: &str, bopomofo: &str) -> Result<(), StoreError> {
        let syllables = parse_syllable_seq(bopomofo)?;
        self.user.borrow_mut().remove(&syllables, phrase)
    }

    pub fn user_phrase_lookup(&self, phrase: &str, bopomofo: &str) -> Option<UserPhrase> {
        let syllables = parse_syllable_seq(bopomofo).ok()?;
        self.user.borrow().lookup(&syllables, phrase)
    }

    // ------------------------------------------------------------------
    // event dispatch

    /// Handles one keyboard event and returns its classification.
    pub fn handle_key(&mut self, event: KeyEvent) -> KeyBehavior {
        self.aux = None;
        match event {
            KeyEvent::Default(ch) => self.handle_default(ch),
            KeyEvent::Numpad(ch) => self.handle_numpad(ch),
            KeyEvent::Bopomofo(ch) => self.handle_bopomofo(ch),
            KeyEvent::Space => self.handle_space(),
            KeyEvent::Enter => self.handle_enter(),
            KeyEvent::Esc => self.handle_esc(),
            KeyEvent::Backspace => self.handle_backspace(),
            KeyEvent::Del => self.handle_del(),
            KeyEvent::Arrow(Direction::Left) => self.handle_left(),
            KeyEvent::Arrow(Direction::Right) => self.handle_right(),
            KeyEvent::Arrow(Direction::Up) => self.handle_up(),
            KeyEvent::Arrow(Direction::Down) => self.handle_down(),
            KeyEvent::Home => self.handle_home(),
            KeyEvent::End => self.handle_end(),
            KeyEvent::Tab => self.handle_tab(),
            KeyEvent::ShiftTab => self.handle_shift_tab(),
            KeyEvent::PageUp => self.handle_page(false),
            KeyEvent::PageDown => self.handle_page(true),
            KeyEvent::ShiftLeft => self.handle_shift_left(),
            KeyEvent::ShiftRight => self.handle_shift_right(),
            KeyEvent::CtrlNum(n) => self.handle_ctrl_num(n),
            KeyEvent::Capslock => self.handle_capslock(),
            KeyEvent::ShiftSpace => self.handle_shift_space(),
        }
    }

    fn handle_default(&mut self, ch: char) -> KeyBehavior {
        if self.is_selecting() {
            return self.handle_choice_key(ch);
        }
        if !ch.is_ascii_graphic() {
            return KeyBehavior::Ignored;
        }
        let key = ch as u8;
        self.mark_anchor = None;

        if self.options.language_mode == LanguageMode::English {
            let glyph = match self.options.shape_mode {
                ShapeMode::FullWidth => symbols::full_shape_symbol(key)
                    .map(str::to_owned)
                    .unwrap_or_else(|| ch.to_string()),
                ShapeMode::HalfWidth => ch.to_string(),
            };
            if !self.insert_symbol(&glyph, Some(key.to_ascii_uppercase())) {
                return KeyBehavior::Bell;
            }
            self.rephrase();
            return self.finish_mutation();
        }

        // ` opens the symbol picker
        if key == b'`' {
            return self.open_symbol_categories();
        }

        if self.options.easy_symbol_input {
            let mapped: Vec<String> = self.easy_symbols.symbols_for(key).to_vec();
            if !mapped.is_empty() {
                for glyph in &mapped {
                    if !self.insert_symbol(glyph, Some(key)) {
                        return KeyBehavior::Bell;
                    }
                }
                self.rephrase();
                return self.finish_mutation();
            }
        }

        match self.syllable_editor.key_press(key) {
            SyllableKeyBehavior::Absorb => KeyBehavior::Absorbed,
            SyllableKeyBehavior::TryCommit => self.try_commit_syllable(),
            SyllableKeyBehavior::KeyError => {
                let glyph = match self.options.shape_mode {
                    ShapeMode::FullWidth => symbols::full_shape_symbol(key)
                        .or_else(|| symbols::special_symbol(key)),
                    ShapeMode::HalfWidth => symbols::special_symbol(key),
                };
                match glyph {
                    Some(glyph) => {
                        let glyph = glyph.to_owned();
                        if !self.insert_symbol(&glyph, Some(key)) {
                            return KeyBehavior::Bell;
                        }
                        self.rephrase();
                        self.finish_mutation()
                    }
                    None => KeyBehavior::Ignored,
                }
            }
        }
    }

    fn handle_numpad(&mut self, ch: char) -> KeyBehavior {
        if self.is_selecting() {
            return self.handle_choice_key(ch);
        }
        if !ch.is_ascii_graphic() {
            return KeyBehavior::Ignored;
        }
        if self.preedit.is_empty() && !self.syllable_editor.is_entering() {
            // nothing pending, pass the digit straight through
            self.commit_buf.push(ch);
            return KeyBehavior::Committed;
        }
        self.handle_default(ch)
    }

    fn handle_bopomofo(&mut self, ch: char) -> KeyBehavior {
        if self.options.language_mode != LanguageMode::Chinese || self.is_selecting() {
            return KeyBehavior::Ignored;
        }
        let Ok(bopomofo) = Bopomofo::try_from(ch) else {
            return KeyBehavior::Ignored;
        };
        match self.syllable_editor.push_bopomofo(bopomofo) {
            SyllableKeyBehavior::Absorb => KeyBehavior::Absorbed,
            SyllableKeyBehavior::TryCommit => self.try_commit_syllable(),
            SyllableKeyBehavior::KeyError => KeyBehavior::Bell,
        }
    }

    fn handle_space(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            return self.handle_page(true);
        }
        if self.options.language_mode == LanguageMode::Chinese
            && self.syllable_editor.is_entering()
        {
            return match self.syllable_editor.key_press(b' ') {
                SyllableKeyBehavior::TryCommit => self.try_commit_syllable(),
                _ => KeyBehavior::Bell,
            };
        }
        if self.options.space_as_selection
            && self.options.language_mode == LanguageMode::Chinese
            && !self.preedit.is_empty()
        {
            return self.open_choice();
        }
        let glyph = match self.options.shape_mode {
            ShapeMode::FullWidth => "　",
            ShapeMode::HalfWidth => " ",
        };
        if !self.insert_symbol(glyph, None) {
            return KeyBehavior::Bell;
        }
        self.rephrase();
        self.finish_mutation()
    }

    fn handle_enter(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            return KeyBehavior::Ignored;
        }
        if let Some(range) = self.marked_range() {
            self.mark_anchor = None;
            return self.add_marked_phrase(range);
        }
        if self.preedit.is_empty() {
            return KeyBehavior::Ignored;
        }
        self.commit_all()
    }

    fn handle_esc(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            self.close_choice();
            return KeyBehavior::Absorbed;
        }
        if self.syllable_editor.is_entering() {
            self.syllable_editor.clear();
            return KeyBehavior::Absorbed;
        }
        if self.options.esc_clean_all_buf && !self.preedit.is_empty() {
            self.clean_buffers();
            return KeyBehavior::Absorbed;
        }
        KeyBehavior::Ignored
    }

    fn handle_backspace(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            self.close_choice();
            return KeyBehavior::Absorbed;
        }
        if self.syllable_editor.is_entering() {
            self.syllable_editor.pop();
            return KeyBehavior::Absorbed;
        }
        if self.cursor == 0 {
            return KeyBehavior::Ignored;
        }
        self.mark_anchor = None;
        self.kill_cell(self.cursor - 1, true);
        self.rephrase();
        KeyBehavior::Absorbed
    }

    fn handle_del(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            return KeyBehavior::Ignored;
        }
        if self.syllable_editor.is_entering() {
            return KeyBehavior::Bell;
        }
        if self.cursor >= self.preedit.len() {
            return KeyBehavior::Ignored;
        }
        self.mark_anchor = None;
        self.kill_cell(self.cursor, false);
        self.rephrase();
        KeyBehavior::Absorbed
    }

    fn handle_left(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            return self.handle_page(false);
        }
        if self.syllable_editor.is_entering() {
            return KeyBehavior::Bell;
        }
        self.mark_anchor = None;
        if self.cursor > 0 {
            self.cursor -= 1;
        }
        KeyBehavior::Absorbed
    }

    fn handle_right(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            return self.handle_page(true);
        }
        if self.syllable_editor.is_entering() {
            return KeyBehavior::Bell;
        }
        self.mark_anchor = None;
        if self.cursor < self.preedit.len() {
            self.cursor += 1;
        }
        KeyBehavior::Absorbed
    }

    fn handle_up(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            self.close_choice();
            return KeyBehavior::Absorbed;
        }
        KeyBehavior::Ignored
    }

    fn handle_down(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            return self.next_length();
        }
        if self.preedit.is_empty() {
            return KeyBehavior::Ignored;
        }
        self.open_choice()
    }

    fn handle_home(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            return self.first_page();
        }
        self.mark_anchor = None;
        self.cursor = 0;
        KeyBehavior::Absorbed
    }

    fn handle_end(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            return self.last_page();
        }
        self.mark_anchor = None;
        self.cursor = self.preedit.len();
        KeyBehavior::Absorbed
    }

    fn handle_tab(&mut self) -> KeyBehavior {
        if self.is_selecting() {
            return KeyBehavior::Ignored;
        }
        if self.preedit.is_empty() {
            return KeyBehavior::Ignored;
        }
        self.mark_anchor = None;
        if self.cursor == self.preedit.len() {
            // cycle to the next best phrasing
            self.num_cut += 1;
            self.rephrase();
            return KeyBehavior::Absorbed;
        }
        let pos = self.phone_cursor();
        if pos == 0 || pos >= self.syllables.len() {
            return KeyBehavior::Bell;
        }
        if self.prefer_intervals.iter().any(|&(f, t)| f < pos && t > pos) {
            self.set_break(pos);
        } else {
            self.set_connect(pos);
        }
        self.rephrase();
        KeyBehavior::Absorbed
    }

    fn handle_shift_tab(&mut self) -> KeyBehavior {
        if self.is_selecting() || self.preedit.is_empty() {
            return KeyBehavior::Ignored;
        }
        let pos = self.phone_cursor();
        if pos == 0 || pos >= self.syllables.len() {
            return KeyBehavior::Bell;
        }
        self.breaks[pos] = false;
        self.connects[pos] = false;
        self.rephrase();
        KeyBehavior::Absorbed
    }

    fn handle_page(&mut self, forward: bool) -> KeyBehavior {
        if !self.is_selecting() {
            return KeyBehavior::Ignored;
        }
        if forward {
            self.next_page()
        } else {
            self.prev_page()
        }
    }

    fn handle_shift_left(&mut self) -> KeyBehavior {
        if self.is_selecting()
            || self.syllable_editor.is_entering()
            || self.options.language_mode != LanguageMode::Chinese
        {
            return KeyBehavior::Ignored;
        }
        if self.cursor == 0 {
            return KeyBehavior::Absorbed;
        }
        if self.mark_anchor.is_none() {
            self.mark_anchor = Some(self.cursor);
        }
        self.cursor -= 1;
        KeyBehavior::Absorbed
    }

    fn handle_shift_right(&mut self) -> KeyBehavior {
        if self.is_selecting()
            || self.syllable_editor.is_entering()
            || self.options.language_mode != LanguageMode::Chinese
        {
            return KeyBehavior::Ignored;
        }
        if self.cursor >= self.preedit.len() {
            return KeyBehavior::Absorbed;
        }
        if self.mark_anchor.is_none() {
            self.mark_anchor = Some(self.cursor);
        }
        self.cursor += 1;
        KeyBehavior::Absorbed
    }

    fn handle_ctrl_num(&mut self, n: u8) -> KeyBehavior {
        if self.is_selecting() || self.options.language_mode != LanguageMode::Chinese {
            return KeyBehavior::Ignored;
        }
        let len = usize::from(n);
        if !(2..=9).contains(&len) {
            return KeyBehavior::Bell;
        }
        let range = if self.options.add_phrase_forward {
            (self.cursor, self.cursor + len)
        } else {
            (self.cursor.saturating_sub(len), self.cursor)
        };
        if range.1 - range.0 != len || range.1 > self.preedit.len() {
            return KeyBehavior::Bell;
        }
        self.add_marked_phrase(range)
    }

    fn handle_capslock(&mut self) -> KeyBehavior {
        self.set_language_mode(match self.options.language_mode {
            LanguageMode::Chinese => LanguageMode::English,
            LanguageMode::English => LanguageMode::Chinese,
        });
        KeyBehavior::Absorbed
    }

    fn handle_shift_space(&mut self) -> KeyBehavior {
        if !self.options.enable_fullwidth_toggle_key {
            return KeyBehavior::Ignored;
        }
        self.options.shape_mode = match self.options.shape_mode {
            ShapeMode::HalfWidth => ShapeMode::FullWidth,
            ShapeMode::FullWidth => ShapeMode::HalfWidth,
        };
        KeyBehavior::Absorbed
    }

    // ------------------------------------------------------------------
    // buffer mutations

    pub(crate) fn phone_cursor(&self) -> usize {
        self.chinese_cells_before(self.cursor)
    }

    pub(crate) fn chinese_cells_before(&self, cell: usize) -> usize {
        self.preedit[..cell]
            .iter()
            .filter(|it| it.kind == CellKind::Chinese)
            .count()
    }

    /// The cell index of the `phone`-th Chinese cell.
    pub(crate) fn cell_of_phone(&self, phone: usize) -> usize {
        let mut seen = 0;
        for (i, cell) in self.preedit.iter().enumerate() {
            if cell.kind == CellKind::Chinese {
                if seen == phone {
                    return i;
                }
                seen += 1;
            }
        }
        self.preedit.len()
    }

    fn add_chinese(&mut self, phone: Syllable, alt: Syllable) {
        let pos = self.phone_cursor();
        for selection in self.selections.iter_mut() {
            if selection.start >= pos {
                selection.start += 1;
                selection.end += 1;
            }
        }
        self.breaks.insert(pos + 1, false);
        self.connects.insert(pos + 1, false);
        self.syllables.insert(pos, phone);
        self.syllables_alt.insert(pos, alt);
        self.preedit.insert(
            self.cursor,
            PreeditCell {
                kind: CellKind::Chinese,
                glyph: String::new(),
                symbol_key: None,
            },
        );
        self.cursor += 1;
    }

    fn insert_symbol(&mut self, glyph: &str, key: Option<u8>) -> bool {
        if self.preedit.len() >= MAX_PHONE_SEQ_LEN {
            return false;
        }
        let pos = self.phone_cursor();
        self.connects[pos] = false;
        self.preedit.insert(
            self.cursor,
            PreeditCell {
                kind: CellKind::Symbol,
                glyph: glyph.to_owned(),
                symbol_key: key,
            },
        );
        self.cursor += 1;
        self.syllable_editor.clear();
        true
    }

    /// Removes one cell. Selections overlapping a removed phoneme are
    /// dropped; selections to the right shift left.
    fn kill_cell(&mut self, cell: usize, decrease_cursor: bool) {
        if cell >= self.preedit.len() {
            return;
        }
        if self.preedit[cell].kind == CellKind::Chinese {
            let pos = self.chinese_cells_before(cell);
            self.selections.retain(|s| !(s.start <= pos && s.end > pos));
            for selection in self.selections.iter_mut() {
                if selection.start > pos {
                    selection.start -= 1;
                    selection.end -= 1;
                }
            }
            self.breaks.remove(pos);
            self.connects.remove(pos);
            self.syllables.remove(pos);
            self.syllables_alt.remove(pos);
        }
        self.preedit.remove(cell);
        if decrease_cursor && self.cursor > 0 {
            self.cursor -= 1;
        }
        self.cursor = self.cursor.min(self.preedit.len());
    }

    /// Forbids phrases from spanning `pos`, dropping selections that cross.
    pub fn set_break(&mut self, pos: usize) {
        if pos == 0 || pos >= self.syllables.len() {
            return;
        }
        self.breaks[pos] = true;
        self.connects[pos] = false;
        self.selections.retain(|s| !(s.start < pos && s.end > pos));
    }

    /// Asks the scorer to prefer phrasings that span `pos`.
    pub fn set_connect(&mut self, pos: usize) {
        if pos == 0 || pos >= self.syllables.len() {
            return;
        }
        self.connects[pos] = true;
        self.breaks[pos] = false;
    }

    fn try_commit_syllable(&mut self) -> KeyBehavior {
        let syllable = self.syllable_editor.observe();
        let known = self.dict.lookup_word(syllable).next().is_some()
            || !self.user.borrow().phrases_for(&[syllable]).is_empty();
        if !known {
            // keep the buffer so the user can fix the tone
            return KeyBehavior::Bell;
        }
        if self.syllables.len() >= MAX_PHONE_SEQ_LEN {
            return KeyBehavior::Bell;
        }
        self.syllable_editor.clear();
        self.mark_anchor = None;
        self.add_chinese(syllable, syllable);
        self.rephrase();
        self.finish_mutation()
    }

    fn finish_mutation(&mut self) -> KeyBehavior {
        if self.preedit.len() > self.options.max_chi_symbol_len && self.release_head() {
            return KeyBehavior::Committed;
        }
        KeyBehavior::Absorbed
    }

    // ------------------------------------------------------------------
    // phrasing and the preedit assembler

    pub(crate) fn symbol_break_positions(&self) -> Vec<usize> {
        let mut positions = vec![];
        let mut chinese = 0;
        for cell in &self.preedit {
            match cell.kind {
                CellKind::Chinese => chinese += 1,
                CellKind::Symbol => positions.push(chinese),
            }
        }
        positions
    }

    /// Rebuilds the phrasing with the interactive all-cover engine mode and
    /// refreshes the preedit display.
    pub(crate) fn rephrase(&mut self) {
        self.rephrase_with(true);
    }

    fn rephrase_with(&mut self, all_covers: bool) {
        let mut breaks: Vec<Break> = self
            .breaks
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .map(|(pos, _)| Break(pos))
            .collect();
        for pos in self.symbol_break_positions() {
            if pos > 0 && pos < self.syllables.len() {
                breaks.push(Break(pos));
            }
        }
        for br in &breaks {
            self.selections
                .retain(|s| !(s.start < br.0 && s.end > br.0));
        }
        let connects = self
            .connects
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .map(|(pos, _)| Connect(pos))
            .collect();
        let sequence = ChineseSequence {
            syllables: self.syllables.clone(),
            selections: self.selections.clone(),
            breaks,
            connects,
        };
        self.cover = if all_covers {
            self.engine.convert_next(&sequence, self.num_cut)
        } else {
            self.engine.convert(&sequence)
        };
        if !self.cover_is_consistent() {
            error!("phrasing produced an inconsistent cover, resetting session buffers");
            self.clean_buffers();
            return;
        }
        self.make_prefer_intervals();
        self.assemble_preedit();
    }

    fn cover_is_consistent(&self) -> bool {
        let total = self.syllables.len();
        let mut spans: Vec<_> = self.cover.iter().map(|it| (it.start, it.end)).collect();
        spans.sort_unstable();
        let mut last_end = 0;
        for (start, end) in spans {
            if start >= end || end > total || start < last_end {
                return false;
            }
            last_end = end;
        }
        true
    }

    /// Unions the cover intervals across connect marks. The result drives
    /// the display intervals, auto-learning and the head release.
    fn make_prefer_intervals(&mut self) {
        let n = self.syllables.len();
        let mut belong = vec![0usize; n];
        for (i, interval) in self.cover.iter().enumerate() {
            for slot in belong[interval.start..interval.end].iter_mut() {
                *slot = i + 1;
            }
        }
        let mut set_no = self.cover.len() + 1;
        for slot in belong.iter_mut() {
            if *slot == 0 {
                *slot = set_no;
                set_no += 1;
            }
        }

        let mut parent = vec![0usize; set_no + 1];
        fn root(parent: &[usize], mut set: usize) -> usize {
            while parent[set] != 0 {
                set = parent[set];
            }
            set
        }
        for pos in 1..n {
            if self.connects[pos] {
                let a = root(&parent, belong[pos - 1]);
                let b = root(&parent, belong[pos]);
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }

        self.prefer_intervals.clear();
        let mut i = 0;
        while i < n {
            let mut j = i + 1;
            while j < n && root(&parent, belong[i]) == root(&parent, belong[j]) {
                j += 1;
            }
            self.prefer_intervals.push((i, j));
            i = j;
        }
    }

    /// Realizes the chosen cover into the preedit cells and computes the
    /// display intervals, stepping across symbol cells.
    fn assemble_preedit(&mut self) {
        let mut writes: Vec<(usize, String)> = vec![];
        for interval in &self.cover {
            let start = self.cell_of_phone(interval.start);
            for (offset, ch) in interval.phrase.chars().enumerate() {
                writes.push((start + offset, ch.to_string()));
            }
        }
        for selection in &self.selections {
            let start = self.cell_of_phone(selection.start);
            for (offset, ch) in selection.phrase.chars().enumerate() {
                writes.push((start + offset, ch.to_string()));
            }
        }
        for (cell, glyph) in writes {
            if cell < self.preedit.len() {
                self.preedit[cell].glyph = glyph;
            }
        }

        self.disp_intervals.clear();
        for &(from, to) in &self.prefer_intervals {
            let start = self.cell_of_phone(from);
            let end = start + (to - from);
            let phrase = self.preedit[start..end.min(self.preedit.len())]
                .iter()
                .map(|cell| cell.glyph.as_str())
                .collect();
            self.disp_intervals.push(Interval { start, end, phrase });
        }
    }

    /// How many leading cells to commit when the preedit overflows.
    fn count_release(&self) -> usize {
        if self.preedit.len() <= self.options.max_chi_symbol_len {
            return 0;
        }
        match self.preedit.first() {
            None => 0,
            Some(cell) if cell.kind == CellKind::Symbol => self
                .preedit
                .iter()
                .position(|it| it.kind == CellKind::Chinese)
                .unwrap_or(self.preedit.len()),
            Some(_) => self
                .prefer_intervals
                .iter()
                .find(|(from, _)| *from == 0)
                .map(|(from, to)| to - from)
                .unwrap_or(1),
        }
    }

    /// Commits cells from the head of the buffer until it fits again.
    fn release_head(&mut self) -> bool {
        let release = self.count_release();
        if release == 0 {
            return false;
        }
        let released_phones = self.chinese_cells_before(release);
        let user = self.user.clone();
        user.borrow_mut().bump_lifetime();
        if self.options.auto_learn {
            let learned: Vec<(usize, usize)> = self
                .prefer_intervals
                .iter()
                .copied()
                .filter(|&(_, to)| to <= released_phones)
                .collect();
            self.auto_learn_intervals(&learned);
        }
        let output: String = self.preedit[..release]
            .iter()
            .map(|cell| cell.glyph.as_str())
            .collect();
        self.commit_buf.push_str(&output);
        for _ in 0..release {
            self.kill_cell(0, true);
        }
        self.rephrase();
        true
    }

    fn commit_all(&mut self) -> KeyBehavior {
        // the final phrasing uses the best-cover mode
        self.rephrase_with(false);
        let output = self.preedit_string();
        let user = self.user.clone();
        user.borrow_mut().bump_lifetime();
        if self.options.auto_learn {
            let intervals = self.prefer_intervals.clone();
            self.auto_learn_intervals(&intervals);
        }
        self.commit_buf.push_str(&output);
        self.clean_buffers();
        KeyBehavior::Committed
    }

    fn clean_buffers(&mut self) {
        self.syllables.clear();
        self.syllables_alt.clear();
        self.preedit.clear();
        self.cursor = 0;
        self.selections.clear();
        self.breaks = vec![false];
        self.connects = vec![false];
        self.num_cut = 0;
        self.cover.clear();
        self.prefer_intervals.clear();
        self.disp_intervals.clear();
        self.choice = None;
        self.syllable_editor.clear();
        self.mark_anchor = None;
    }

    // ------------------------------------------------------------------
    // learning

    fn marked_range(&self) -> Option<(usize, usize)> {
        let anchor = self.mark_anchor?;
        let (a, b) = (anchor.min(self.cursor), anchor.max(self.cursor));
        (a != b).then_some((a, b))
    }

    /// Adds the phrase covering the marked cell range to the user store and
    /// surfaces the result in the auxiliary string.
    fn add_marked_phrase(&mut self, (from, to): (usize, usize)) -> KeyBehavior {
        if self.preedit[from..to]
            .iter()
            .any(|cell| cell.kind != CellKind::Chinese)
        {
            return KeyBehavior::Bell;
        }
        let phrase: String = self.preedit[from..to]
            .iter()
            .map(|cell| cell.glyph.as_str())
            .collect();
        let start = self.chinese_cells_before(from);
        let syllables = self.syllables[start..start + (to - from)].to_vec();

        let user = self.user.clone();
        let mut user = user.borrow_mut();
        let existed = user.lookup(&syllables, &phrase).is_some();
        let now = user.lifetime();
        let orig = original_freq(self.dict.as_ref(), &syllables, &phrase);
        let max = max_freq(self.dict.as_ref(), &*user, &syllables);
        match user.upsert(&syllables, &phrase, orig, max, now) {
            Ok(_) => {
                self.aux = Some(if existed {
                    format!("已有：{phrase}")
                } else {
                    format!("加入：{phrase}")
                });
                KeyBehavior::Absorbed
            }
            Err(e) => {
                error!("cannot save user phrase: {e}");
                KeyBehavior::Bell
            }
        }
    }

    fn is_break_word_cell(&self, cell: usize) -> bool {
        match self.preedit.get(cell) {
            Some(cell) if cell.kind == CellKind::Chinese => {
                BREAK_WORDS.contains(&cell.glyph.as_str())
            }
            _ => true,
        }
    }

    /// Derives user phrases from an accepted cover: every interval of two
    /// or more characters directly, and runs of consecutive one-character
    /// intervals as a synthetic phrase. Hard break words and symbols flush
    /// the run.
    fn auto_learn_intervals(&self, intervals: &[(usize, usize)]) {
        let user = self.user.clone();
        let mut user = user.borrow_mut();
        user.begin();
        let now = user.lifetime();

        let mut run_syllables: Vec<Syllable> = vec![];
        let mut run_phrase = String::new();
        let mut pending_end_cell = 0;
        for &(from, to) in intervals {
            let from_cell = self.cell_of_phone(from);
            let len = to - from;
            if pending_end_cell != 0 && pending_end_cell < from_cell {
                // a symbol separates the runs
                self.learn(&mut *user, &run_syllables, &run_phrase, now);
                run_syllables.clear();
                run_phrase.clear();
                pending_end_cell = 0;
            }
            if len == 1 && !self.is_break_word_cell(from_cell) {
                run_syllables.push(self.syllables[from]);
                run_phrase.push_str(&self.preedit[from_cell].glyph);
                pending_end_cell = from_cell + 1;
            } else {
                if pending_end_cell != 0 {
                    self.learn(&mut *user, &run_syllables, &run_phrase, now);
                    run_syllables.clear();
                    run_phrase.clear();
                    pending_end_cell = 0;
                }
                if len >= 2 {
                    let phrase: String = self.preedit[from_cell..from_cell + len]
                        .iter()
                        .map(|cell| cell.glyph.as_str())
                        .collect();
                    self.learn(&mut *user, &self.syllables[from..to], &phrase, now);
                }
            }
        }
        if pending_end_cell != 0 {
            self.learn(&mut *user, &run_syllables, &run_phrase, now);
        }
        user.end();
    }

    fn learn(&self, user: &mut dyn UserDictionary, syllables: &[Syllable], phrase: &str, now: u64) {
        if syllables.is_empty() {
            return;
        }
        if syllables.len() != phrase.chars().count() || syllables.len() > MAX_PHRASE_LEN {
            warn!(
                "not learning {phrase}: phone sequence length {} mismatch",
                syllables.len()
            );
            return;
        }
        let orig = original_freq(self.dict.as_ref(), syllables, phrase);
        let max = max_freq(self.dict.as_ref(), &*user, syllables);
        if let Err(e) = user.upsert(syllables, phrase, orig, max, now) {
            error!("cannot learn {phrase}: {e}");
        }
    }
}

fn parse_syllable_seq(bopomofo: &str) -> Result<Vec<Syllable>, StoreError> {
    let mut syllables = vec![];
    for token in bopomofo.split_whitespace() {
        let syllable: Syllable = token.parse().map_err(|_| StoreError::InvalidInput)?;
        if syllable.is_empty() {
            return Err(StoreError::InvalidInput);
        }
        syllables.push(syllable);
    }
    if syllables.is_empty() {
        return Err(StoreError::InvalidInput);
    }
    Ok(syllables)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use crate::dictionary::{Dictionary, EmptyDictionary, Phrase};
    use crate::syl;
    use crate::userphrase::MemoryUserDictionary;
    use crate::zhuyin::Bopomofo::*;

    use super::{
        Direction, Editor, KeyBehavior, KeyEvent, LanguageMode, SymbolCategory, SymbolTable,
    };

    fn test_dictionary() -> Rc<dyn Dictionary> {
        Rc::new(HashMap::from([
            (
                vec![syl![C, E, TONE4]],
                vec![Phrase::new("測", 9318), Phrase::new("策", 100)],
            ),
            (
                vec![syl![SH, TONE4]],
                vec![
                    Phrase::new("試", 9318),
                    Phrase::new("是", 5000),
                    Phrase::new("士", 100),
                ],
            ),
            (
                vec![syl![C, E, TONE4], syl![SH, TONE4]],
                vec![Phrase::new("測試", 9318), Phrase::new("策士", 100)],
            ),
            (vec![syl![SH]], vec![Phrase::new("師", 100)]),
            (vec![syl![U, O, TONE3]], vec![Phrase::new("我", 5000)]),
            (vec![syl![B, A]], vec![Phrase::new("八", 200)]),
            (vec![syl![D, A, TONE4]], vec![Phrase::new("大", 300)]),
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

    fn editor() -> Editor {
        Editor::new(
            test_dictionary(),
            Rc::new(RefCell::new(MemoryUserDictionary::new())),
        )
    }

    fn type_keys(editor: &mut Editor, keys: &str) {
        for ch in keys.chars() {
            editor.handle_key(match ch {
                ' ' => KeyEvent::Space,
                ch => KeyEvent::Default(ch),
            });
        }
    }

    fn assert_invariants(editor: &Editor) {
        let chinese = editor
            .preedit
            .iter()
            .filter(|cell| cell.kind == super::CellKind::Chinese)
            .count();
        assert_eq!(chinese, editor.syllables.len());
        assert_eq!(editor.syllables.len(), editor.syllables_alt.len());
        assert_eq!(editor.syllables.len() + 1, editor.breaks.len());
        assert_eq!(editor.syllables.len() + 1, editor.connects.len());
        for (i, a) in editor.selections.iter().enumerate() {
            assert!(a.end <= editor.syllables.len());
            for b in editor.selections.iter().skip(i + 1) {
                assert!(!a.intersects(b));
            }
        }
    }

    #[test]
    fn type_and_commit() {
        let mut editor = editor();
        type_keys(&mut editor, "hk4");
        assert_eq!("測", editor.preedit_string());
        type_keys(&mut editor, "g4");
        assert_eq!("測試", editor.preedit_string());
        assert_invariants(&editor);

        assert_eq!(KeyBehavior::Committed, editor.handle_key(KeyEvent::Enter));
        assert_eq!("測試", editor.commit_string());
        assert_eq!("", editor.preedit_string());
        editor.ack_commit();
        assert_eq!("", editor.commit_string());
    }

    #[test]
    fn space_completes_first_tone_syllable() {
        let mut editor = editor();
        type_keys(&mut editor, "g ");
        assert_eq!("師", editor.preedit_string());
        assert_invariants(&editor);
    }

    #[test]
    fn bopomofo_events_from_external_layout() {
        let mut editor = editor();
        for ch in "ㄘㄜˋ".chars() {
            editor.handle_key(KeyEvent::Bopomofo(ch));
        }
        assert_eq!("測", editor.preedit_string());
    }

    #[test]
    fn bopomofo_buffer_is_observable() {
        let mut editor = editor();
        type_keys(&mut editor, "hk");
        assert_eq!("ㄘㄜ", editor.bopomofo_string());
        assert_eq!("", editor.preedit_string());
        type_keys(&mut editor, "4");
        assert_eq!("", editor.bopomofo_string());
    }

    #[test]
    fn unknown_syllable_rings_the_bell() {
        let mut editor = editor();
        // ㄗˋ is not in the test dictionary
        editor.handle_key(KeyEvent::Default('y'));
        assert_eq!(
            KeyBehavior::Bell,
            editor.handle_key(KeyEvent::Default('4'))
        );
        assert_eq!("", editor.preedit_string());
        // the syllable stays so the user can fix the tone
        assert_eq!("ㄗˋ", editor.bopomofo_string());
    }

    #[test]
    fn backspace_pops_syllable_then_cells() {
        let mut editor = editor();
        type_keys(&mut editor, "hk4g");
        assert_eq!("ㄕ", editor.bopomofo_string());
        editor.handle_key(KeyEvent::Backspace);
        assert_eq!("", editor.bopomofo_string());
        assert_eq!("測", editor.preedit_string());
        editor.handle_key(KeyEvent::Backspace);
        assert_eq!("", editor.preedit_string());
        assert_eq!(
            KeyBehavior::Ignored,
            editor.handle_key(KeyEvent::Backspace)
        );
        assert_invariants(&editor);
    }

    #[test]
    fn delete_removes_cell_at_cursor() {
        let mut editor = editor();
        type_keys(&mut editor, "hk4g4");
        editor.handle_key(KeyEvent::Home);
        editor.handle_key(KeyEvent::Del);
        assert_eq!("試", editor.preedit_string());
        assert_invariants(&editor);
    }

    #[test]
    fn candidate_selection_at_end_of_buffer() {
        let mut editor = editor();
        type_keys(&mut editor, "hk4g4");
        assert_eq!(
            KeyBehavior::Absorbed,
            editor.handle_key(KeyEvent::Arrow(Direction::Down))
        );
        // forward mode anchors on the last character
        assert_eq!(vec!["試", "是", "士"], editor.candidates().to_vec());
        assert_eq!(
            KeyBehavior::Absorbed,
            editor.handle_key(KeyEvent::Default('2'))
        );
        assert!(!editor.is_selecting());
        assert_eq!("測是", editor.preedit_string());
        assert_invariants(&editor);

        assert_eq!(KeyBehavior::Committed, editor.handle_key(KeyEvent::Enter));
        assert_eq!("測是", editor.commit_string());
    }

    #[test]
    fn candidate_selection_of_longest_phrase() {
        let mut editor = editor();
        type_keys(&mut editor, "hk4g4");
        editor.handle_key(KeyEvent::Home);
        editor.handle_key(KeyEvent::Arrow(Direction::Down));
        assert_eq!(vec!["測試", "策士"], editor.candidates().to_vec());
        editor.handle_key(KeyEvent::Default('2'));
        assert_eq!("策士", editor.preedit_string());
        assert_invariants(&editor);
    }

    #[test]
    fn rearward_choice_anchors_on_preceding_phrase() {
        let mut editor = editor();
        editor.set_phrase_choice_rearward(true);
        type_keys(&mut editor, "hk4g4");
        editor.handle_key(KeyEvent::Arrow(Direction::Down));
        assert_eq!(vec!["測試", "策士"], editor.candidates().to_vec());
        editor.handle_key(KeyEvent::Default('2'));
        assert_eq!("策士", editor.preedit_string());
    }

    #[test]
    fn length_navigation_cycles() {
        let mut editor = editor();
        type_keys(&mut editor, "hk4g4");
        editor.handle_key(KeyEvent::Home);
        editor.handle_key(KeyEvent::Arrow(Direction::Down));
        assert!(editor.cand_list_has_next());
        assert!(!editor.cand_list_has_prev());
        editor.handle_key(KeyEvent::Default('j'));
        assert_eq!(vec!["測", "策"], editor.candidates().to_vec());
        // wraps back to the longest class
        editor.handle_key(KeyEvent::Default('j'));
        assert_eq!(vec!["測試", "策士"], editor.candidates().to_vec());
        editor.handle_key(KeyEvent::Default('k'));
        assert_eq!(vec!["測", "策"], editor.candidates().to_vec());
        editor.handle_key(KeyEvent::Esc);
        assert!(!editor.is_selecting());
        assert_eq!("測試", editor.preedit_string());
    }

    #[test]
    fn candidate_pages_wrap_around() {
        let mut editor = editor();
        editor.set_cand_per_page(1).unwrap();
        type_keys(&mut editor, "hk4g4");
        editor.handle_key(KeyEvent::Home);
        editor.handle_key(KeyEvent::Arrow(Direction::Down));
        assert_eq!(2, editor.cand_total_pages());
        assert_eq!(0, editor.cand_current_page());
        assert_eq!(vec!["測試"], editor.current_page_candidates().to_vec());

        editor.handle_key(KeyEvent::PageDown);
        assert_eq!(1, editor.cand_current_page());
        assert_eq!(vec!["策士"], editor.current_page_candidates().to_vec());
        editor.handle_key(KeyEvent::PageDown);
        assert_eq!(0, editor.cand_current_page());
        editor.handle_key(KeyEvent::PageUp);
        assert_eq!(1, editor.cand_current_page());
    }

    #[test]
    fn space_as_selection_opens_the_picker() {
        let mut editor = editor();
        editor.set_space_as_selection(true);
        type_keys(&mut editor, "hk4g4");
        assert_eq!(KeyBehavior::Absorbed, editor.handle_key(KeyEvent::Space));
        assert!(editor.is_selecting());
    }

    #[test]
    fn tab_cycles_phrasing_at_end_of_buffer() {
        let mut editor = editor();
        type_keys(&mut editor, "284vm,6g/ ");
        assert_eq!("大學生", editor.preedit_string());
        assert_eq!(2, editor.intervals().next().unwrap().end);
        editor.handle_key(KeyEvent::Tab);
        assert_eq!(1, editor.intervals().next().unwrap().end);
        editor.handle_key(KeyEvent::Tab);
        assert_eq!(2, editor.intervals().next().unwrap().end);
        assert_invariants(&editor);
    }

    #[test]
    fn tab_in_the_middle_breaks_and_connects() {
        let mut editor = editor();
        type_keys(&mut editor, "284vm,6g/ ");
        editor.handle_key(KeyEvent::Home);
        editor.handle_key(KeyEvent::Arrow(Direction::Right));
        // the current phrasing spans the cursor, so Tab cuts it
        editor.handle_key(KeyEvent::Tab);
        assert_eq!(1, editor.intervals().next().unwrap().end);
        // nothing spans the cursor anymore, so Tab joins it
        editor.handle_key(KeyEvent::Tab);
        assert_eq!(2, editor.intervals().next().unwrap().end);
        assert_invariants(&editor);
    }

    #[test]
    fn head_release_on_overflow() {
        let mut editor = editor();
        editor.set_max_chi_symbol_len(2).unwrap();
        type_keys(&mut editor, "hk4g4");
        // exactly at the limit, no commit yet
        assert_eq!("", editor.commit_string());
        // the third syllable overflows the buffer and releases the head
        editor.handle_key(KeyEvent::Default('h'));
        editor.handle_key(KeyEvent::Default('k'));
        assert_eq!(
            KeyBehavior::Committed,
            editor.handle_key(KeyEvent::Default('4'))
        );
        assert_eq!("測試", editor.commit_string());
        assert_eq!("測", editor.preedit_string());
        assert_invariants(&editor);
    }

    #[test]
    fn esc_clears_syllable_then_optionally_all() {
        let mut editor = editor();
        type_keys(&mut editor, "hk4g");
        editor.handle_key(KeyEvent::Esc);
        assert_eq!("", editor.bopomofo_string());
        assert_eq!("測", editor.preedit_string());
        assert_eq!(KeyBehavior::Ignored, editor.handle_key(KeyEvent::Esc));

        editor.set_esc_clean_all_buf(true);
        assert_eq!(KeyBehavior::Absorbed, editor.handle_key(KeyEvent::Esc));
        assert_eq!("", editor.preedit_string());
    }

    #[test]
    fn english_mode_inserts_plain_and_fullwidth() {
        let mut editor = editor();
        editor.handle_key(KeyEvent::Capslock);
        assert_eq!(LanguageMode::English, editor.language_mode());
        editor.handle_key(KeyEvent::Default('a'));
        assert_eq!("a", editor.preedit_string());

        editor.handle_key(KeyEvent::ShiftSpace);
        editor.handle_key(KeyEvent::Default('b'));
        assert_eq!("aｂ", editor.preedit_string());
        assert_invariants(&editor);

        assert_eq!(KeyBehavior::Committed, editor.handle_key(KeyEvent::Enter));
        assert_eq!("aｂ", editor.commit_string());
    }

    #[test]
    fn special_symbols_and_variant_reopen() {
        let mut editor = editor();
        editor.handle_key(KeyEvent::Default('<'));
        assert_eq!("，", editor.preedit_string());
        assert_invariants(&editor);

        editor.handle_key(KeyEvent::Arrow(Direction::Down));
        assert!(editor.is_selecting());
        assert_eq!(vec!["，", "←"], editor.candidates().to_vec());
        editor.handle_key(KeyEvent::Default('2'));
        assert_eq!("←", editor.preedit_string());
    }

    #[test]
    fn symbol_picker_two_levels() {
        let mut editor = editor();
        editor.set_symbol_table(SymbolTable {
            categories: vec![
                SymbolCategory {
                    name: "…".to_string(),
                    symbols: vec![],
                },
                SymbolCategory {
                    name: "括號".to_string(),
                    symbols: vec!["「".to_string(), "『".to_string()],
                },
            ],
        });
        editor.handle_key(KeyEvent::Default('`'));
        assert!(editor.is_selecting());
        assert_eq!(vec!["…", "括號"], editor.candidates().to_vec());
        editor.handle_key(KeyEvent::Default('2'));
        assert_eq!(vec!["「", "『"], editor.candidates().to_vec());
        editor.handle_key(KeyEvent::Default('2'));
        assert!(!editor.is_selecting());
        assert_eq!("『", editor.preedit_string());
        assert_invariants(&editor);
    }

    #[test]
    fn display_intervals_step_across_symbols() {
        let mut editor = editor();
        editor.handle_key(KeyEvent::Default('<'));
        type_keys(&mut editor, "hk4");
        let intervals: Vec<_> = editor.intervals().cloned().collect();
        assert_eq!(1, intervals.len());
        assert_eq!(1, intervals[0].start);
        assert_eq!(2, intervals[0].end);
        assert_eq!("測", intervals[0].phrase);
    }

    #[test]
    fn auto_learn_on_commit() {
        let mut editor = editor();
        type_keys(&mut editor, "hk4g4");
        editor.handle_key(KeyEvent::Enter);
        let entry = editor.user_phrase_lookup("測試", "ㄘㄜˋ ㄕˋ").unwrap();
        assert_eq!(9318, entry.orig_freq);
        assert_eq!(entry.orig_freq, entry.user_freq);
    }

    #[test]
    fn auto_learn_accumulates_single_runs() {
        let mut editor = editor();
        // 八 and 大 have no two character phrase in the dictionary
        type_keys(&mut editor, "18 284");
        assert_eq!("八大", editor.preedit_string());
        editor.handle_key(KeyEvent::Enter);
        assert!(editor.user_phrase_lookup("八大", "ㄅㄚ ㄉㄚˋ").is_some());
    }

    #[test]
    fn auto_learn_can_be_disabled() {
        let mut editor = editor();
        editor.set_auto_learn(false);
        type_keys(&mut editor, "hk4g4");
        editor.handle_key(KeyEvent::Enter);
        assert!(editor.user_phrase_entries().is_empty());
    }

    #[test]
    fn marked_range_adds_user_phrase() {
        let mut editor = editor();
        type_keys(&mut editor, "ji3hk4g4");
        assert_eq!("我測試", editor.preedit_string());
        editor.handle_key(KeyEvent::ShiftLeft);
        editor.handle_key(KeyEvent::ShiftLeft);
        assert_eq!(KeyBehavior::Absorbed, editor.handle_key(KeyEvent::Enter));
        assert_eq!(Some("加入：測試"), editor.aux_string());
        let entry = editor.user_phrase_lookup("測試", "ㄘㄜˋ ㄕˋ").unwrap();
        assert_eq!(entry.orig_freq, entry.user_freq);

        // committing reinforces the phrase through auto-learning
        assert_eq!(KeyBehavior::Committed, editor.handle_key(KeyEvent::Enter));
        assert_eq!("我測試", editor.commit_string());
        let entry = editor.user_phrase_lookup("測試", "ㄘㄜˋ ㄕˋ").unwrap();
        assert!(entry.user_freq > entry.orig_freq);
    }

    #[test]
    fn ctrl_num_adds_phrase_before_cursor() {
        let mut editor = editor();
        type_keys(&mut editor, "hk4g4");
        assert_eq!(
            KeyBehavior::Absorbed,
            editor.handle_key(KeyEvent::CtrlNum(2))
        );
        assert_eq!(Some("加入：測試"), editor.aux_string());
        assert!(editor.user_phrase_lookup("測試", "ㄘㄜˋ ㄕˋ").is_some());
        assert_eq!(
            KeyBehavior::Bell,
            editor.handle_key(KeyEvent::CtrlNum(5))
        );
    }

    #[test]
    fn user_phrase_api_round_trip() {
        let mut editor = editor();
        editor.user_phrase_add("策士", "ㄘㄜˋ ㄕˋ").unwrap();
        assert!(editor.user_phrase_lookup("策士", "ㄘㄜˋ ㄕˋ").is_some());
        assert_eq!(1, editor.user_phrase_entries().len());

        assert!(editor.user_phrase_add("策士", "ㄘㄜˋ").is_err());
        assert!(editor.user_phrase_add("策士", "not bopomofo").is_err());

        editor.user_phrase_remove("策士", "ㄘㄜˋ ㄕˋ").unwrap();
        assert!(editor.user_phrase_remove("策士", "ㄘㄜˋ ㄕˋ").is_err());
    }

    #[test]
    fn learned_phrase_wins_next_conversion() {
        let mut editor = editor();
        // keep choosing 策士 over the dictionary's 測試
        for _ in 0..8 {
            type_keys(&mut editor, "hk4g4");
            editor.handle_key(KeyEvent::Home);
            editor.handle_key(KeyEvent::Arrow(Direction::Down));
            let index = editor
                .candidates()
                .iter()
                .position(|it| it == "策士")
                .unwrap();
            editor.cand_choose_by_index(index);
            assert_eq!("策士", editor.preedit_string());
            editor.handle_key(KeyEvent::Enter);
            editor.ack_commit();
        }
        // the adapted frequency now beats the dictionary default
        type_keys(&mut editor, "hk4g4");
        assert_eq!("策士", editor.preedit_string());
    }

    #[test]
    fn configuration_validation() {
        let mut editor = editor();
        assert!(editor.set_cand_per_page(0).is_err());
        assert!(editor.set_cand_per_page(11).is_err());
        assert_eq!(10, editor.cand_per_page());
        assert!(editor.set_cand_per_page(5).is_ok());
        assert_eq!(5, editor.cand_per_page());

        assert!(editor.set_max_chi_symbol_len(40).is_err());
        assert_eq!(20, editor.max_chi_symbol_len());

        assert!(editor.set_kb_type(17).is_err());
        assert!(editor.set_kb_type(8).is_ok());
        assert_eq!(8, editor.kb_type().ordinal());

        assert!(editor.set_sel_keys(b"").is_err());
        assert!(editor.set_sel_keys(b"asdfghjkl;").is_ok());
        assert_eq!(b"asdfghjkl;".as_slice(), editor.sel_keys());
    }

    #[test]
    fn empty_dictionary_session_stays_operable() {
        let mut editor = Editor::new(
            Rc::new(EmptyDictionary),
            Rc::new(RefCell::new(MemoryUserDictionary::new())),
        );
        type_keys(&mut editor, "hk");
        assert_eq!(KeyBehavior::Bell, editor.handle_key(KeyEvent::Default('4')));
        assert_eq!(KeyBehavior::Ignored, editor.handle_key(KeyEvent::Enter));
    }

    #[test]
    fn numpad_passes_through_when_idle() {
        let mut editor = editor();
        assert_eq!(
            KeyBehavior::Committed,
            editor.handle_key(KeyEvent::Numpad('5'))
        );
        assert_eq!("5", editor.commit_string());
    }

    #[test]
    fn deterministic_for_identical_input() {
        let run = || {
            let mut editor = editor();
            type_keys(&mut editor, "hk4g4ji3");
            editor.handle_key(KeyEvent::Tab);
            editor.handle_key(KeyEvent::Enter);
            editor.commit_string().to_string()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn reset_clears_session_buffers() {
        let mut editor = editor();
        type_keys(&mut editor, "hk4g");
        editor.reset();
        assert_eq!("", editor.preedit_string());
        assert_eq!("", editor.bopomofo_string());
        assert!(!editor.is_entering());
        assert_invariants(&editor);
    }
}
