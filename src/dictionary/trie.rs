use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::Path;

use binary_layout::{define_layout, FieldCopyAccess};
use memmap2::Mmap;
use riff::{ChunkContents, ChunkId, RIFF_ID};
use thiserror::Error;

use crate::zhuyin::Syllable;

use super::{Dictionary, DictionaryInfo, Phrase, Phrases};

const FORM_TYPE_ID: ChunkId = ChunkId { value: *b"DICT" };
const INFO_CHUNK_ID: ChunkId = ChunkId { value: *b"INFO" };
const TRIE_CHUNK_ID: ChunkId = ChunkId { value: *b"TRIE" };
const PHRS_CHUNK_ID: ChunkId = ChunkId { value: *b"PHRS" };

define_layout!(trie_node, LittleEndian, {
    key: u16,
    child_begin_lo: u16,
    child_begin_hi: u8,
    child_end_lo: u16,
    child_end_hi: u8,
});

define_layout!(phrase_head, LittleEndian, {
    freq: u32,
    len: u8,
});

const NODE_SIZE: usize = 8;
const PHRASE_HEAD_SIZE: usize = 5;
const MAX_CHILD_INDEX: u32 = 1 << 24;

fn read_u24(lo: u16, hi: u8) -> usize {
    usize::from(lo) | (usize::from(hi) << 16)
}

/// The error type which is returned when a dictionary file cannot be used.
#[derive(Error, Debug)]
pub enum TrieOpenError {
    #[error("io error")]
    Io(#[from] io::Error),
    #[error("not a dictionary file")]
    InvalidFormat,
}

enum DictData {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl DictData {
    fn bytes(&self) -> &[u8] {
        match self {
            DictData::Mmap(mmap) => mmap,
            DictData::Owned(vec) => vec,
        }
    }
}

/// A read-only dictionary backed by a memory mapped trie file.
///
/// The file is a little-endian RIFF container with a `TRIE` chunk holding
/// the node array and a `PHRS` chunk holding the phrase records. Every node
/// is eight bytes: a 16-bit syllable key and a pair of 24-bit child indices.
/// The children of a node occupy a contiguous, key-sorted index range so a
/// lookup is a binary search per syllable. A child with key zero terminates
/// a phrase and its index range addresses bytes in the `PHRS` chunk instead.
///
/// The mapping is immutable and can be shared by reference between sessions
/// in the same process.
pub struct TrieDictionary {
    data: DictData,
    trie: (usize, usize),
    phrases: (usize, usize),
    info: DictionaryInfo,
}

impl TrieDictionary {
    /// Maps the dictionary file at `path` read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<TrieDictionary, TrieOpenError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_data(DictData::Mmap(mmap))
    }

    /// Reads the dictionary from an in-memory buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<TrieDictionary, TrieOpenError> {
        Self::from_data(DictData::Owned(bytes))
    }

    fn from_data(data: DictData) -> Result<TrieDictionary, TrieOpenError> {
        let bytes = data.bytes();
        if bytes.len() < 12
            || bytes[0..4] != RIFF_ID.value
            || bytes[8..12] != FORM_TYPE_ID.value
        {
            return Err(TrieOpenError::InvalidFormat);
        }

        let mut trie = None;
        let mut phrases = None;
        let mut info = DictionaryInfo::default();

        let mut pos = 12;
        while pos + 8 <= bytes.len() {
            let id: [u8; 4] = bytes[pos..pos + 4].try_into().expect("sliced 4 bytes");
            let size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().expect("4 bytes"));
            let content = pos + 8;
            let end = content
                .checked_add(size as usize)
                .filter(|end| *end <= bytes.len())
                .ok_or(TrieOpenError::InvalidFormat)?;
            match id {
                id if id == TRIE_CHUNK_ID.value => trie = Some((content, end)),
                id if id == PHRS_CHUNK_ID.value => phrases = Some((content, end)),
                id if id == INFO_CHUNK_ID.value => {
                    info = Self::parse_info(&bytes[content..end]);
                }
                _ => (),
            }
            // chunks are word aligned
            pos = end + (size as usize & 1);
        }

        let trie = trie.ok_or(TrieOpenError::InvalidFormat)?;
        let phrases = phrases.ok_or(TrieOpenError::InvalidFormat)?;
        if (trie.1 - trie.0) % NODE_SIZE != 0 || trie.1 - trie.0 < NODE_SIZE {
            return Err(TrieOpenError::InvalidFormat);
        }

        Ok(TrieDictionary {
            data,
            trie,
            phrases,
            info,
        })
    }

    fn parse_info(content: &[u8]) -> DictionaryInfo {
        let mut info = DictionaryInfo::default();
        let text = String::from_utf8_lossy(content);
        for line in text.lines() {
            if let Some((key, value)) = line.split_once('=') {
                let value = Some(value.to_owned());
                match key {
                    "name" => info.name = value,
                    "copyright" => info.copyright = value,
                    "license" => info.license = value,
                    "version" => info.version = value,
                    "software" => info.software = value,
                    _ => (),
                }
            }
        }
        info
    }

    fn node(&self, index: usize) -> Option<&[u8]> {
        let (begin, end) = self.trie;
        let offset = begin.checked_add(index.checked_mul(NODE_SIZE)?)?;
        if offset + NODE_SIZE > end {
            return None;
        }
        Some(&self.data.bytes()[offset..offset + NODE_SIZE])
    }

    fn child_range(&self, node: &[u8]) -> (usize, usize) {
        (
            read_u24(
                trie_node::child_begin_lo::read(node),
                trie_node::child_begin_hi::read(node),
            ),
            read_u24(
                trie_node::child_end_lo::read(node),
                trie_node::child_end_hi::read(node),
            ),
        )
    }

    /// Walks the trie and returns the byte range of the phrase records
    /// attached to the syllables, if the whole sequence ends in a phrase.
    fn find_phrase(&self, syllables: &[Syllable]) -> Option<(usize, usize)> {
        if syllables.is_empty() {
            return None;
        }
        let mut node = self.node(0)?;
        for syl in syllables {
            let key = syl.to_u16();
            let (mut lo, mut hi) = self.child_range(node);
            // binary search the key-sorted child range
            node = loop {
                if lo >= hi {
                    return None;
                }
                let mid = lo + (hi - lo) / 2;
                let candidate = self.node(mid)?;
                match trie_node::key::read(candidate).cmp(&key) {
                    std::cmp::Ordering::Equal => break candidate,
                    std::cmp::Ordering::Less => lo = mid + 1,
                    std::cmp::Ordering::Greater => hi = mid,
                }
            };
        }
        // a terminal child carries key zero and sorts first
        let (begin, end) = self.child_range(node);
        if begin >= end {
            return None;
        }
        let terminal = self.node(begin)?;
        if trie_node::key::read(terminal) != 0 {
            return None;
        }
        let (begin, end) = self.child_range(terminal);
        let (phrs_begin, phrs_end) = self.phrases;
        let begin = phrs_begin.checked_add(begin)?;
        let end = phrs_begin.checked_add(end)?;
        if begin > end || end > phrs_end {
            return None;
        }
        Some((begin, end))
    }
}

impl Dictionary for TrieDictionary {
    fn lookup_phrase(&self, syllables: &[Syllable]) -> Phrases {
        let range = match self.find_phrase(syllables) {
            Some(range) => range,
            None => return Box::new(std::iter::empty()),
        };
        Box::new(PhrasesIter {
            bytes: self.data.bytes(),
            pos: range.0,
            end: range.1,
        })
    }

    fn about(&self) -> DictionaryInfo {
        self.info.clone()
    }
}

struct PhrasesIter<'a> {
    bytes: &'a [u8],
    pos: usize,
    end: usize,
}

impl Iterator for PhrasesIter<'_> {
    type Item = Phrase;

    fn next(&mut self) -> Option<Phrase> {
        if self.pos + PHRASE_HEAD_SIZE > self.end {
            return None;
        }
        let head = &self.bytes[self.pos..self.pos + PHRASE_HEAD_SIZE];
        let freq = phrase_head::freq::read(head);
        let len = usize::from(phrase_head::len::read(head));
        let begin = self.pos + PHRASE_HEAD_SIZE;
        if begin + len > self.end {
            self.pos = self.end;
            return None;
        }
        self.pos = begin + len;
        let phrase = String::from_utf8_lossy(&self.bytes[begin..begin + len]);
        Some(Phrase::new(phrase, freq))
    }
}

/// The error type which is returned from building a dictionary.
#[derive(Error, Debug)]
pub enum BuildDictionaryError {
    #[error("io error")]
    Io(#[from] io::Error),
    #[error("found duplicated phrases")]
    DuplicatePhrase,
    #[error("phrase string too long")]
    PhraseTooLong,
    #[error("dictionary too large")]
    TooLarge,
}

#[derive(Default)]
struct BuilderNode {
    children: BTreeMap<u16, BuilderNode>,
    phrases: Vec<Phrase>,
}

/// Builds a [`TrieDictionary`] file from scratch.
pub struct TrieDictionaryBuilder {
    root: BuilderNode,
    info: DictionaryInfo,
}

impl TrieDictionaryBuilder {
    pub fn new() -> TrieDictionaryBuilder {
        TrieDictionaryBuilder {
            root: BuilderNode::default(),
            info: DictionaryInfo::default(),
        }
    }

    pub fn set_info(&mut self, info: DictionaryInfo) {
        self.info = info;
    }

    pub fn insert(
        &mut self,
        syllables: &[Syllable],
        phrase: Phrase,
    ) -> Result<(), BuildDictionaryError> {
        if phrase.as_str().len() > usize::from(u8::MAX) {
            return Err(BuildDictionaryError::PhraseTooLong);
        }
        let mut node = &mut self.root;
        for syl in syllables {
            node = node.children.entry(syl.to_u16()).or_default();
        }
        if node.phrases.iter().any(|it| it.as_str() == phrase.as_str()) {
            return Err(BuildDictionaryError::DuplicatePhrase);
        }
        node.phrases.push(phrase);
        Ok(())
    }

    /// Serializes the trie to `writer` in the RIFF based file format.
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<(), BuildDictionaryError> {
        struct Record {
            key: u16,
            begin: u64,
            end: u64,
        }

        let mut records = vec![Record {
            key: 0,
            begin: 0,
            end: 0,
        }];
        let mut phrase_data: Vec<u8> = vec![];

        // Breadth-first so that each node's children, the terminal first,
        // occupy one contiguous, key-sorted index range.
        let mut queue = VecDeque::from([(&self.root, 0usize)]);
        while let Some((node, index)) = queue.pop_front() {
            let begin = records.len() as u64;
            if !node.phrases.is_empty() {
                let data_begin = phrase_data.len() as u64;
                let mut phrases = node.phrases.clone();
                phrases.sort_by(|a, b| b.freq().cmp(&a.freq()).then(a.as_str().cmp(b.as_str())));
                for phrase in phrases {
                    let bytes = phrase.as_str().as_bytes();
                    let mut head = [0u8; PHRASE_HEAD_SIZE];
                    phrase_head::freq::write(&mut head, phrase.freq());
                    phrase_head::len::write(&mut head, bytes.len() as u8);
                    phrase_data.extend_from_slice(&head);
                    phrase_data.extend_from_slice(bytes);
                }
                records.push(Record {
                    key: 0,
                    begin: data_begin,
                    end: phrase_data.len() as u64,
                });
            }
            for (key, child) in &node.children {
                queue.push_back((child, records.len()));
                records.push(Record {
                    key: *key,
                    begin: 0,
                    end: 0,
                });
            }
            records[index].begin = begin;
            records[index].end = records.len() as u64;
        }

        let mut nodes = vec![];
        for record in records {
            push_node(&mut nodes, record.key, record.begin, record.end)?;
        }

        let info = self.info_text();
        let mut contents = vec![];
        if !info.is_empty() {
            contents.push(ChunkContents::Data(INFO_CHUNK_ID, info.into_bytes()));
        }
        contents.push(ChunkContents::Data(TRIE_CHUNK_ID, nodes));
        contents.push(ChunkContents::Data(PHRS_CHUNK_ID, phrase_data));
        ChunkContents::Children(RIFF_ID.clone(), FORM_TYPE_ID, contents).write(writer)?;
        Ok(())
    }

    fn info_text(&self) -> String {
        let mut text = String::new();
        for (key, value) in [
            ("name", &self.info.name),
            ("copyright", &self.info.copyright),
            ("license", &self.info.license),
            ("version", &self.info.version),
            ("software", &self.info.software),
        ] {
            if let Some(value) = value {
                text.push_str(key);
                text.push('=');
                text.push_str(value);
                text.push('\n');
            }
        }
        text
    }
}

impl Default for TrieDictionaryBuilder {
    fn default() -> Self {
        TrieDictionaryBuilder::new()
    }
}

fn push_node(
    nodes: &mut Vec<u8>,
    key: u16,
    begin: u64,
    end: u64,
) -> Result<(), BuildDictionaryError> {
    if begin >= u64::from(MAX_CHILD_INDEX) || end >= u64::from(MAX_CHILD_INDEX) {
        return Err(BuildDictionaryError::TooLarge);
    }
    let mut node = [0u8; NODE_SIZE];
    trie_node::key::write(&mut node, key);
    trie_node::child_begin_lo::write(&mut node, begin as u16);
    trie_node::child_begin_hi::write(&mut node, (begin >> 16) as u8);
    trie_node::child_end_lo::write(&mut node, end as u16);
    trie_node::child_end_hi::write(&mut node, (end >> 16) as u8);
    nodes.extend_from_slice(&node);
    Ok(())
}
