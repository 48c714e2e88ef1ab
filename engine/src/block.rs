use crate::postings::{DocId, RawPosting};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub const DEFAULT_MEMORY_BUDGET: usize = 512 * 1024;

// Rough per-entry heap costs used for the in-memory size estimate.
const TERM_COST: usize = 48;
const POSTING_COST: usize = 32;
const POSITION_COST: usize = 4;

/// One `(term, block sequence number, postings)` record of a temporary
/// block file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub term: String,
    pub seq: u32,
    pub postings: Vec<RawPosting>,
}

/// Accumulates an in-memory term-to-postings map under a byte budget and
/// flushes term-sorted blocks to numbered temporary files. The budget is
/// checked at document boundaries, so a document's postings for one term
/// are never split across blocks.
pub struct BlockBuilder {
    dir: PathBuf,
    budget: usize,
    map: HashMap<String, Vec<RawPosting>>,
    estimate: usize,
    seq: u32,
    blocks: Vec<PathBuf>,
    num_docs: u32,
}

/// Block paths and document count handed to the merge phase.
pub struct BuildOutput {
    pub blocks: Vec<PathBuf>,
    pub num_docs: u32,
}

impl BlockBuilder {
    pub fn new(dir: PathBuf, budget: usize) -> Result<Self> {
        create_dir_all(&dir).with_context(|| format!("create block directory {}", dir.display()))?;
        Ok(Self {
            dir,
            budget,
            map: HashMap::new(),
            estimate: 0,
            seq: 0,
            blocks: Vec::new(),
            num_docs: 0,
        })
    }

    /// Ingest one document's token stream. Repeated occurrences of a term
    /// bump its frequency and position list; the document id itself is
    /// recorded once per term.
    pub fn add(&mut self, doc_id: DocId, tokens: Vec<(String, usize)>) -> Result<()> {
        for (term, pos) in tokens {
            if !self.map.contains_key(&term) {
                self.estimate += term.len() + TERM_COST;
            }
            let list = self.map.entry(term).or_default();
            match list.last_mut() {
                Some(last) if last.doc_id == doc_id => {
                    last.tf += 1;
                    last.positions.push(pos as u32);
                    self.estimate += POSITION_COST;
                }
                _ => {
                    list.push(RawPosting { doc_id, tf: 1, positions: vec![pos as u32] });
                    self.estimate += POSTING_COST + POSITION_COST;
                }
            }
        }
        self.num_docs += 1;
        if self.estimate > self.budget {
            self.flush()?;
        }
        Ok(())
    }

    /// Flush the final partial block and return the block paths plus the
    /// number of documents ingested.
    pub fn finish(mut self) -> Result<BuildOutput> {
        self.flush()?;
        Ok(BuildOutput { blocks: self.blocks, num_docs: self.num_docs })
    }

    fn flush(&mut self) -> Result<()> {
        if self.map.is_empty() {
            return Ok(());
        }
        let path = self.dir.join(format!("block-{:05}.bin", self.seq));
        tracing::debug!(seq = self.seq, terms = self.map.len(), "flushing block");
        let file = File::create(&path)
            .with_context(|| format!("create block file {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        let mut entries: Vec<(String, Vec<RawPosting>)> = self.map.drain().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        for (term, postings) in entries {
            let record = BlockRecord { term, seq: self.seq, postings };
            bincode::serialize_into(&mut writer, &record)?;
        }
        writer.flush()?;

        self.blocks.push(path);
        self.seq += 1;
        self.estimate = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{BlockFileCursor, RecordSource};
    use crate::tokenizer::tokenize;
    use tempfile::tempdir;

    fn read_all(path: &std::path::Path) -> Vec<BlockRecord> {
        let mut cursor = BlockFileCursor::open(path).unwrap();
        let mut records = Vec::new();
        while let Some(record) = cursor.try_next().unwrap() {
            records.push(record);
        }
        records
    }

    #[test]
    fn repeated_terms_do_not_duplicate_doc_ids() {
        let dir = tempdir().unwrap();
        let mut builder = BlockBuilder::new(dir.path().join("blocks"), DEFAULT_MEMORY_BUDGET).unwrap();
        builder.add(1, tokenize("cat dog cat cat")).unwrap();
        let output = builder.finish().unwrap();
        assert_eq!(output.num_docs, 1);
        assert_eq!(output.blocks.len(), 1);

        let records = read_all(&output.blocks[0]);
        let cat = records.iter().find(|r| r.term == "cat").unwrap();
        assert_eq!(cat.postings.len(), 1);
        assert_eq!(cat.postings[0].tf, 3);
        assert_eq!(cat.postings[0].positions, vec![0, 2, 3]);
    }

    #[test]
    fn blocks_are_term_sorted() {
        let dir = tempdir().unwrap();
        let mut builder = BlockBuilder::new(dir.path().join("blocks"), DEFAULT_MEMORY_BUDGET).unwrap();
        builder.add(1, tokenize("zebra apple mango")).unwrap();
        let output = builder.finish().unwrap();

        let terms: Vec<String> = read_all(&output.blocks[0]).into_iter().map(|r| r.term).collect();
        let mut sorted = terms.clone();
        sorted.sort();
        assert_eq!(terms, sorted);
    }

    #[test]
    fn tiny_budget_produces_multiple_blocks() {
        let dir = tempdir().unwrap();
        let mut builder = BlockBuilder::new(dir.path().join("blocks"), 1).unwrap();
        builder.add(1, tokenize("cat dog")).unwrap();
        builder.add(2, tokenize("cat fish")).unwrap();
        builder.add(3, tokenize("dog fish")).unwrap();
        let output = builder.finish().unwrap();
        assert_eq!(output.blocks.len(), 3);

        // each block carries its own sequence number
        for (i, path) in output.blocks.iter().enumerate() {
            for record in read_all(path) {
                assert_eq!(record.seq, i as u32);
            }
        }
    }

    #[test]
    fn finish_flushes_the_partial_block() {
        let dir = tempdir().unwrap();
        let mut builder = BlockBuilder::new(dir.path().join("blocks"), DEFAULT_MEMORY_BUDGET).unwrap();
        builder.add(4, tokenize("only one document")).unwrap();
        let output = builder.finish().unwrap();
        assert_eq!(output.blocks.len(), 1);
        assert!(output.blocks[0].exists());
    }
}
