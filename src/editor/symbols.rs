//! Symbol input data and tables.
//!
//! Three sources feed symbol cells: the inline punctuation map applied
//! directly to printable keys, the full-shape substitution map used in
//! full-width mode, and the two-level symbol picker whose categories come
//! from a data file. Each inserted symbol remembers its originating key so
//! the picker can reopen on it later.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Punctuation keys that map straight to a Chinese symbol.
pub(crate) const SPECIAL_SYMBOLS: [(u8, &str); 29] = [
    (b'[', "「"),
    (b']', "」"),
    (b'{', "『"),
    (b'}', "』"),
    (b'\'', "、"),
    (b'<', "，"),
    (b':', "："),
    (b'"', "；"),
    (b'>', "。"),
    (b'~', "～"),
    (b'!', "！"),
    (b'@', "＠"),
    (b'#', "＃"),
    (b'$', "＄"),
    (b'%', "％"),
    (b'^', "︿"),
    (b'&', "＆"),
    (b'*', "＊"),
    (b'(', "（"),
    (b')', "）"),
    (b'_', "—"),
    (b'+', "＋"),
    (b'=', "＝"),
    (b'\\', "＼"),
    (b'|', "｜"),
    (b'?', "？"),
    (b',', "，"),
    (b'.', "。"),
    (b';', "；"),
];

/// Full-width replacements for printable ASCII, used in full-shape mode.
pub(crate) const FULL_SHAPE_SYMBOLS: [(u8, &str); 75] = [
    (b'0', "０"),
    (b'1', "１"),
    (b'2', "２"),
    (b'3', "３"),
    (b'4', "４"),
    (b'5', "５"),
    (b'6', "６"),
    (b'7', "７"),
    (b'8', "８"),
    (b'9', "９"),
    (b'a', "ａ"),
    (b'b', "ｂ"),
    (b'c', "ｃ"),
    (b'd', "ｄ"),
    (b'e', "ｅ"),
    (b'f', "ｆ"),
    (b'g', "ｇ"),
    (b'h', "ｈ"),
    (b'i', "ｉ"),
    (b'j', "ｊ"),
    (b'k', "ｋ"),
    (b'l', "ｌ"),
    (b'm', "ｍ"),
    (b'n', "ｎ"),
    (b'o', "ｏ"),
    (b'p', "ｐ"),
    (b'q', "ｑ"),
    (b'r', "ｒ"),
    (b's', "ｓ"),
    (b't', "ｔ"),
    (b'u', "ｕ"),
    (b'v', "ｖ"),
    (b'w', "ｗ"),
    (b'x', "ｘ"),
    (b'y', "ｙ"),
    (b'z', "ｚ"),
    (b'A', "Ａ"),
    (b'B', "Ｂ"),
    (b'C', "Ｃ"),
    (b'D', "Ｄ"),
    (b'E', "Ｅ"),
    (b'F', "Ｆ"),
    (b'G', "Ｇ"),
    (b'H', "Ｈ"),
    (b'I', "Ｉ"),
    (b'J', "Ｊ"),
    (b'K', "Ｋ"),
    (b'L', "Ｌ"),
    (b'M', "Ｍ"),
    (b'N', "Ｎ"),
    (b'O', "Ｏ"),
    (b'P', "Ｐ"),
    (b'Q', "Ｑ"),
    (b'R', "Ｒ"),
    (b'S', "Ｓ"),
    (b'T', "Ｔ"),
    (b'U', "Ｕ"),
    (b'V', "Ｖ"),
    (b'W', "Ｗ"),
    (b'X', "Ｘ"),
    (b'Y', "Ｙ"),
    (b'Z', "Ｚ"),
    (b' ', "　"),
    (b'"', "”"),
    (b'\'', "’"),
    (b'/', "／"),
    (b'<', "＜"),
    (b'>', "＞"),
    (b'`', "‵"),
    (b'[', "〔"),
    (b']', "〕"),
    (b'{', "｛"),
    (b'}', "｝"),
    (b'+', "＋"),
    (b'-', "－"),
];

/// Symbol variants keyed by the originating key, used to reopen a picker on
/// an existing symbol cell. The first entry of each row is the key.
pub(crate) const SYMBOL_VARIANTS: [&[&str]; 56] = [
    &["0", "ø"],
    &["[", "「", "『", "《", "〈", "【", "〔"],
    &["]", "」", "』", "》", "〉", "】", "〕"],
    &["{", "｛"],
    &["}", "｝"],
    &["<", "，", "←"],
    &[">", "。", "→", "．"],
    &["?", "？", "¿"],
    &["!", "！", "Ⅰ", "¡"],
    &["@", "＠", "Ⅱ", "⊕", "⊙", "㊣", "﹫"],
    &["#", "＃", "Ⅲ", "﹟"],
    &["$", "＄", "Ⅳ", "€", "﹩", "￠", "∮", "￡", "￥"],
    &["%", "％", "Ⅴ"],
    &["^", "︿", "Ⅵ", "﹀", "︽", "︾"],
    &["&", "＆", "Ⅶ", "﹠"],
    &["*", "＊", "Ⅷ", "×", "※", "╳", "﹡", "☯", "☆", "★"],
    &["(", "（", "Ⅸ"],
    &[")", "）", "Ⅹ"],
    &[
        "_", "—", "－", "―", "–", "←", "→", "＿", "￣", "﹍", "﹉", "﹎", "﹊", "﹏", "﹋", "…",
        "‥", "¯",
    ],
    &["+", "＋", "±", "﹢"],
    &["=", "＝", "≒", "≠", "≡", "≦", "≧", "﹦"],
    &["`", "』", "『", "′", "‵"],
    &["~", "～"],
    &[":", "：", "；", "︰", "﹕"],
    &["\"", "；"],
    &["'", "、", "…", "‥"],
    &["\\", "＼", "↖", "↘", "﹨"],
    &[
        "-", "—", "－", "―", "–", "←", "→", "＿", "￣", "﹍", "﹉", "﹎", "﹊", "﹏", "﹋", "…",
        "‥", "¯",
    ],
    &["/", "／", "÷", "↗", "↙", "∕"],
    &["|", "↑", "↓", "∣", "∥", "︱", "︳", "︴"],
    &["A", "Å", "Α", "α", "├", "╠", "╟", "╞"],
    &["B", "Β", "β", "∵"],
    &["C", "Χ", "χ", "┘", "╯", "╝", "╜", "╛", "㏄", "℃", "㎝", "♣", "©"],
    &["D", "Δ", "δ", "◇", "◆", "┤", "╣", "╢", "╡", "♦"],
    &["E", "Ε", "ε", "┐", "╮", "╗", "╓", "╕"],
    &["F", "Φ", "ψ", "│", "║", "♀"],
    &["G", "Γ", "γ"],
    &["H", "Η", "η", "♥"],
    &["I", "Ι", "ι"],
    &["J", "φ"],
    &["K", "Κ", "κ", "㎞", "㏎"],
    &["L", "Λ", "λ", "㏒", "㏑"],
    &["M", "Μ", "μ", "♂", "ℓ", "㎎", "㏕", "㎜", "㎡"],
    &["N", "Ν", "ν", "№"],
    &["O", "Ο", "ο"],
    &["P", "Π", "π"],
    &["Q", "Θ", "θ", "Д", "┌", "╭", "╔", "╓", "╒"],
    &["R", "Ρ", "ρ", "─", "═", "®"],
    &["S", "Σ", "σ", "∴", "□", "■", "┼", "╬", "╪", "╫", "∫", "§", "♠"],
    &["T", "Τ", "τ", "θ", "△", "▲", "▽", "▼", "™", "⊿"],
    &["U", "Υ", "υ", "μ", "∪", "∩"],
    &["V", "ν"],
    &["W", "Ω", "ω", "┬", "╦", "╤", "╥"],
    &["X", "Ξ", "ξ", "┴", "╩", "╧", "╨"],
    &["Y", "Ψ"],
    &["Z", "Ζ", "ζ", "└", "╰", "╚", "╙", "╘"],
];

/// Looks up the punctuation replacement for a key.
pub(crate) fn special_symbol(key: u8) -> Option<&'static str> {
    SPECIAL_SYMBOLS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, symbol)| *symbol)
}

/// Looks up the full-width replacement for a key.
pub(crate) fn full_shape_symbol(key: u8) -> Option<&'static str> {
    FULL_SHAPE_SYMBOLS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, symbol)| *symbol)
}

/// Finds the key a symbol originated from, so the cell can reopen its
/// variant list later.
pub(crate) fn symbol_key(symbol: &str) -> Option<u8> {
    SYMBOL_VARIANTS
        .iter()
        .find(|row| row.iter().skip(1).any(|it| *it == symbol))
        .map(|row| row[0].as_bytes()[0])
}

/// The variant list for a key, without the key itself.
pub(crate) fn symbol_variants(key: u8) -> Option<&'static [&'static str]> {
    SYMBOL_VARIANTS
        .iter()
        .find(|row| row[0].as_bytes()[0] == key)
        .map(|row| &row[1..])
}

/// One category of the two-level symbol picker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolCategory {
    pub name: String,
    pub symbols: Vec<String>,
}

/// The category table of the symbol picker, loaded from a data file.
///
/// Each line is `category=symbols…`; a line without `=` is a category that
/// inserts its own name directly.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    pub categories: Vec<SymbolCategory>,
}

impl SymbolTable {
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<SymbolTable> {
        let reader = BufReader::new(File::open(path)?);
        let mut categories = vec![];
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let (name, symbols) = match line.split_once('=') {
                Some((name, symbols)) => {
                    (name.to_owned(), symbols.chars().map(String::from).collect())
                }
                None => (line.to_owned(), vec![]),
            };
            categories.push(SymbolCategory { name, symbols });
        }
        Ok(SymbolTable { categories })
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Number of easy symbol slots, the keys 0-9 then A-Z.
pub(crate) const EASY_SYMBOL_SLOTS: usize = 36;

/// Easy symbol strings keyed by 0-9A-Z, loaded from a data file of
/// `K symbols` lines.
#[derive(Clone, Debug)]
pub struct EasySymbolTable {
    entries: Vec<Vec<String>>,
}

impl Default for EasySymbolTable {
    fn default() -> Self {
        EasySymbolTable {
            entries: vec![vec![]; EASY_SYMBOL_SLOTS],
        }
    }
}

/// `0` to `9` map to slots 0-9 and `A` to `Z` to slots 10-35.
pub(crate) fn easy_symbol_index(key: u8) -> Option<usize> {
    match key {
        b'0'..=b'9' => Some(usize::from(key - b'0')),
        b'A'..=b'Z' => Some(usize::from(key - b'A') + 10),
        _ => None,
    }
}

impl EasySymbolTable {
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<EasySymbolTable> {
        let reader = BufReader::new(File::open(path)?);
        let mut table = EasySymbolTable::default();
        for line in reader.lines() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let (Some(key), Some(symbols)) = (parts.next(), parts.next()) else {
                continue;
            };
            if key.len() != 1 {
                continue;
            }
            if let Some(index) = easy_symbol_index(key.as_bytes()[0]) {
                table.entries[index] = symbols.chars().map(String::from).collect();
            }
        }
        Ok(table)
    }

    pub(crate) fn symbols_for(&self, key: u8) -> &[String] {
        easy_symbol_index(key)
            .map(|index| self.entries[index].as_slice())
            .unwrap_or(&[])
    }
}
