use crate::postings::{attach_skips, DocId, Posting};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Dictionary value: document frequency, inverse document frequency, and
/// the byte offset of the serialized posting list in the postings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub doc_freq: u32,
    pub idf: f32,
    pub offset: u64,
}

/// Per-document metadata: the cosine normalization factor and the byte
/// offset of the document's own raw term-frequency vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub norm: f32,
    pub vector_offset: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn blocks_dir(&self) -> PathBuf { self.root.join("blocks") }
}

pub fn save_dictionary(paths: &IndexPaths, dict: &BTreeMap<String, TermEntry>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.dictionary())?;
    let bytes = bincode::serialize(dict)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_dictionary(paths: &IndexPaths) -> Result<BTreeMap<String, TermEntry>> {
    let mut f = File::open(paths.dictionary())
        .with_context(|| format!("open dictionary {}", paths.dictionary().display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let dict = bincode::deserialize(&buf)?;
    Ok(dict)
}

pub fn save_docs(paths: &IndexPaths, docs: &BTreeMap<DocId, DocMeta>) -> Result<()> {
    let mut f = File::create(paths.docs())?;
    let bytes = bincode::serialize(docs)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_docs(paths: &IndexPaths) -> Result<BTreeMap<DocId, DocMeta>> {
    let mut f = File::open(paths.docs())
        .with_context(|| format!("open document metadata {}", paths.docs().display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let docs = bincode::deserialize(&buf)?;
    Ok(docs)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())
        .with_context(|| format!("open index metadata {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Append-only writer over the postings file tracking the running byte
/// offset, so the merger can record where each list starts.
pub struct PostingsWriter {
    writer: BufWriter<File>,
    offset: u64,
}

impl PostingsWriter {
    pub fn create(paths: &IndexPaths) -> Result<Self> {
        create_dir_all(&paths.root)?;
        let file = File::create(paths.postings())
            .with_context(|| format!("create postings file {}", paths.postings().display()))?;
        Ok(Self { writer: BufWriter::new(file), offset: 0 })
    }

    /// Serialize one record and return the offset it was written at.
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<u64> {
        let bytes = bincode::serialize(record)?;
        self.writer.write_all(&bytes)?;
        let at = self.offset;
        self.offset += bytes.len() as u64;
        Ok(at)
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Cursor into the postings file. Seeks are absolute, so every reader can
/// hold its own cursor and queries never share file position state.
pub struct PostingsReader {
    reader: BufReader<File>,
}

impl PostingsReader {
    fn open(paths: &IndexPaths) -> Result<Self> {
        let file = File::open(paths.postings())
            .with_context(|| format!("open postings file {}", paths.postings().display()))?;
        Ok(Self { reader: BufReader::new(file) })
    }

    pub fn read_postings(&mut self, offset: u64) -> Result<Vec<Posting>> {
        self.reader.seek(SeekFrom::Start(offset))?;
        let list = bincode::deserialize_from(&mut self.reader)?;
        Ok(list)
    }

    pub fn read_vector(&mut self, offset: u64) -> Result<Vec<(String, f32)>> {
        self.reader.seek(SeekFrom::Start(offset))?;
        let vector = bincode::deserialize_from(&mut self.reader)?;
        Ok(vector)
    }
}

/// The immutable on-disk index. The dictionary and per-document metadata
/// are loaded wholly into memory on open; posting lists and document
/// vectors are paged in lazily by offset.
pub struct Index {
    pub dictionary: BTreeMap<String, TermEntry>,
    pub docs: BTreeMap<DocId, DocMeta>,
    pub num_docs: u32,
    paths: IndexPaths,
}

impl Index {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let paths = IndexPaths::new(root);
        let dictionary = load_dictionary(&paths)?;
        let docs = load_docs(&paths)?;
        let meta = load_meta(&paths)?;
        tracing::info!(terms = dictionary.len(), docs = docs.len(), "opened index");
        Ok(Self { dictionary, docs, num_docs: meta.num_docs, paths })
    }

    /// Open an independent postings cursor for this index.
    pub fn reader(&self) -> Result<PostingsReader> {
        PostingsReader::open(&self.paths)
    }

    pub fn term_entry(&self, term: &str) -> Option<&TermEntry> {
        self.dictionary.get(term)
    }

    /// The posting list for a term; a term absent from the dictionary
    /// yields an empty list, not an error.
    pub fn postings(&self, reader: &mut PostingsReader, term: &str) -> Result<Vec<Posting>> {
        match self.dictionary.get(term) {
            Some(entry) => reader.read_postings(entry.offset),
            None => Ok(Vec::new()),
        }
    }

    /// A document's stored raw term-frequency vector, used by Rocchio
    /// expansion. Unknown documents yield an empty vector.
    pub fn doc_vector(&self, reader: &mut PostingsReader, doc_id: DocId) -> Result<Vec<(String, f32)>> {
        match self.docs.get(&doc_id) {
            Some(meta) => reader.read_vector(meta.vector_offset),
            None => Ok(Vec::new()),
        }
    }

    /// The posting list of every indexed document, with skip pointers
    /// attached; the complement operand for NOT.
    pub fn all_documents(&self) -> Vec<Posting> {
        let mut all: Vec<Posting> = self.docs.keys().map(|&d| Posting::bare(d)).collect();
        attach_skips(&mut all);
        all
    }
}
