use crate::block::BlockRecord;
use crate::index::{save_dictionary, save_docs, DocMeta, IndexPaths, PostingsWriter, TermEntry};
use crate::postings::{attach_skips, DocId, Posting, RawPosting};
use anyhow::{Context, Result};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::fs::{remove_file, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

/// A source of block records sorted by (term, sequence number).
pub trait RecordSource {
    /// The next record, or None once the source is exhausted.
    fn try_next(&mut self) -> Result<Option<BlockRecord>>;

    /// Called after exhaustion; file-backed sources remove their file.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Cursor over one temporary block file, reading records in append order.
pub struct BlockFileCursor {
    path: PathBuf,
    reader: BufReader<File>,
}

impl BlockFileCursor {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("open block file {}", path.display()))?;
        Ok(Self { path, reader: BufReader::new(file) })
    }
}

impl RecordSource for BlockFileCursor {
    fn try_next(&mut self) -> Result<Option<BlockRecord>> {
        match bincode::deserialize_from(&mut self.reader) {
            Ok(record) => Ok(Some(record)),
            // a clean end of file is exhaustion, anything else is corruption
            Err(err) if is_eof(&err) => Ok(None),
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("corrupt block file {}", self.path.display()))),
        }
    }

    fn finish(&mut self) -> Result<()> {
        remove_file(&self.path)
            .with_context(|| format!("remove merged block file {}", self.path.display()))
    }
}

fn is_eof(err: &bincode::Error) -> bool {
    matches!(&**err, bincode::ErrorKind::Io(io) if io.kind() == ErrorKind::UnexpectedEof)
}

struct HeapEntry {
    term: String,
    seq: u32,
    source: usize,
    postings: Vec<RawPosting>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.term == other.term && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.term.cmp(&other.term).then_with(|| self.seq.cmp(&other.seq))
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sorted union of two raw posting runs; for a document present in both,
/// the accumulator's entry (from the earlier block) wins.
fn union_first_seen(acc: &[RawPosting], incoming: &[RawPosting]) -> Vec<RawPosting> {
    let mut out = Vec::with_capacity(acc.len() + incoming.len());
    let (mut i, mut j) = (0, 0);
    while i < acc.len() && j < incoming.len() {
        match acc[i].doc_id.cmp(&incoming[j].doc_id) {
            Ordering::Equal => {
                out.push(acc[i].clone());
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                out.push(acc[i].clone());
                i += 1;
            }
            Ordering::Greater => {
                out.push(incoming[j].clone());
                j += 1;
            }
        }
    }
    out.extend_from_slice(&acc[i..]);
    out.extend_from_slice(&incoming[j..]);
    out
}

struct Accumulators {
    dictionary: BTreeMap<String, TermEntry>,
    norms: BTreeMap<DocId, f64>,
    vectors: BTreeMap<DocId, Vec<(String, f32)>>,
}

fn finalize_term(
    term: String,
    raw: Vec<RawPosting>,
    num_docs: u32,
    writer: &mut PostingsWriter,
    acc: &mut Accumulators,
) -> Result<()> {
    let doc_freq = raw.len() as u32;
    let idf = (f64::from(num_docs) / f64::from(doc_freq)).log10() as f32;

    let mut postings: Vec<Posting> = raw
        .iter()
        .map(|r| Posting {
            doc_id: r.doc_id,
            weight: 1.0 + (r.tf as f32).log10(),
            positions: r.positions.clone(),
            skip: None,
        })
        .collect();
    attach_skips(&mut postings);
    let offset = writer.append(&postings)?;

    for p in &postings {
        *acc.norms.entry(p.doc_id).or_insert(0.0) += f64::from(p.weight) * f64::from(p.weight);
    }
    for r in raw {
        acc.vectors.entry(r.doc_id).or_default().push((term.clone(), r.tf as f32));
    }
    acc.dictionary.insert(term, TermEntry { doc_freq, idf, offset });
    Ok(())
}

/// N-way merge of sorted block sources into the final dictionary, postings
/// file and document metadata. The heap is keyed by (term, sequence
/// number) so equal terms accumulate document ids in first-seen order.
/// Exhausted sources are finished (block files deleted) as the merge
/// drains them; any unreadable block aborts the build.
pub fn merge_blocks(
    mut sources: Vec<Box<dyn RecordSource>>,
    num_docs: u32,
    paths: &IndexPaths,
) -> Result<()> {
    tracing::info!(blocks = sources.len(), num_docs, "merging blocks");

    let mut heap = BinaryHeap::new();
    for (i, source) in sources.iter_mut().enumerate() {
        match source.try_next()? {
            Some(record) => heap.push(Reverse(HeapEntry {
                term: record.term,
                seq: record.seq,
                source: i,
                postings: record.postings,
            })),
            None => source.finish()?,
        }
    }

    let mut writer = PostingsWriter::create(paths)?;
    let mut acc = Accumulators {
        dictionary: BTreeMap::new(),
        norms: BTreeMap::new(),
        vectors: BTreeMap::new(),
    };
    let mut current: Option<(String, Vec<RawPosting>)> = None;

    while let Some(Reverse(entry)) = heap.pop() {
        let HeapEntry { term, seq: _, source, postings } = entry;
        current = match current.take() {
            Some((cur_term, run)) if cur_term == term => {
                Some((cur_term, union_first_seen(&run, &postings)))
            }
            Some((cur_term, run)) => {
                finalize_term(cur_term, run, num_docs, &mut writer, &mut acc)?;
                Some((term, postings))
            }
            None => Some((term, postings)),
        };

        // refill from the source that yielded the popped record
        match sources[source].try_next()? {
            Some(record) => heap.push(Reverse(HeapEntry {
                term: record.term,
                seq: record.seq,
                source,
                postings: record.postings,
            })),
            None => sources[source].finish()?,
        }
    }
    if let Some((term, run)) = current.take() {
        finalize_term(term, run, num_docs, &mut writer, &mut acc)?;
    }

    // document vectors go after the posting lists, each at a recorded offset
    let mut docs: BTreeMap<DocId, DocMeta> = BTreeMap::new();
    for (doc_id, vector) in acc.vectors {
        let vector_offset = writer.append(&vector)?;
        let norm = acc.norms.get(&doc_id).copied().unwrap_or(0.0).sqrt() as f32;
        docs.insert(doc_id, DocMeta { norm, vector_offset });
    }
    writer.finish()?;

    tracing::info!(terms = acc.dictionary.len(), docs = docs.len(), "merge complete");
    save_dictionary(paths, &acc.dictionary)?;
    save_docs(paths, &docs)?;
    Ok(())
}
