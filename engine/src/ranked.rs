use crate::index::{Index, PostingsReader};
use crate::postings::DocId;
use crate::tokenizer;
use anyhow::Result;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Rocchio blend factor for the relevant-document centroid.
pub const FEEDBACK_WEIGHT: f32 = 0.2;
/// Size of the pseudo-relevant set taken from an initial ranking.
pub const PSEUDO_RELEVANT: usize = 20;
/// Maximum number of centroid-only terms added to the expanded query.
pub const EXPANSION_TERMS: usize = 2000;

/// A scored document, ordered so a max-heap yields descending score with
/// ties resolved to the lower document id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f32,
}

impl Eq for ScoredDoc {}

impl Ord for ScoredDoc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// TF-IDF cosine ranking over the immutable index: logarithmic tf and idf
/// on the query side, logarithmic tf with cosine normalization on the
/// document side. Holds its own postings cursor.
pub struct RankedEngine<'a> {
    index: &'a Index,
    reader: PostingsReader,
}

impl<'a> RankedEngine<'a> {
    pub fn new(index: &'a Index) -> Result<Self> {
        Ok(Self { index, reader: index.reader()? })
    }

    /// Rank documents for a free-text query, most relevant first, ties by
    /// ascending document id. `k` caps the result length when given.
    pub fn rank(&mut self, query: &str, k: Option<usize>) -> Result<Vec<ScoredDoc>> {
        let freqs = query_frequencies(query);
        let heap = self.cosine(&freqs)?;
        Ok(take_top(heap, k))
    }

    /// One round of Rocchio expansion with the supplied judged-relevant
    /// documents; an empty set degenerates to the `(1 - beta)`-scaled
    /// query and leaves the ranking order unchanged.
    pub fn rank_with_feedback(
        &mut self,
        query: &str,
        relevant: &[DocId],
        k: Option<usize>,
    ) -> Result<Vec<ScoredDoc>> {
        let freqs = query_frequencies(query);
        let expanded = self.rocchio(&freqs, relevant)?;
        let heap = self.cosine(&expanded)?;
        Ok(take_top(heap, k))
    }

    /// Rocchio expansion that falls back to a pseudo-relevant set (the
    /// top of the initial ranking) when no judged documents are supplied.
    pub fn rank_expanded(
        &mut self,
        query: &str,
        relevant: &[DocId],
        k: Option<usize>,
    ) -> Result<Vec<ScoredDoc>> {
        if !relevant.is_empty() {
            return self.rank_with_feedback(query, relevant, k);
        }
        let freqs = query_frequencies(query);
        let initial = self.cosine(&freqs)?;
        let pseudo: Vec<DocId> = take_top(initial, Some(PSEUDO_RELEVANT))
            .into_iter()
            .map(|s| s.doc_id)
            .collect();
        self.rank_with_feedback(query, &pseudo, k)
    }

    /// Accumulate query-weight times document-weight inner products, then
    /// normalize by the document norms. Documents with a zero norm are
    /// excluded rather than producing NaN scores.
    fn cosine(&mut self, freqs: &HashMap<String, f32>) -> Result<BinaryHeap<ScoredDoc>> {
        let mut scores: HashMap<DocId, f32> = HashMap::new();
        for (term, tf) in freqs {
            // absent terms have zero idf and empty postings
            let Some(entry) = self.index.term_entry(term) else {
                continue;
            };
            let q_weight = (1.0 + tf.log10()) * entry.idf;
            for posting in self.reader.read_postings(entry.offset)? {
                *scores.entry(posting.doc_id).or_insert(0.0) += q_weight * posting.weight;
            }
        }

        let mut heap = BinaryHeap::with_capacity(scores.len());
        for (doc_id, dot) in scores {
            let Some(meta) = self.index.docs.get(&doc_id) else {
                continue;
            };
            if meta.norm <= 0.0 {
                continue;
            }
            heap.push(ScoredDoc { doc_id, score: dot / meta.norm });
        }
        Ok(heap)
    }

    /// Blend the query vector with the centroid of the relevant documents'
    /// raw term-frequency vectors, keeping at most `EXPANSION_TERMS` of
    /// the terms contributed by the centroid alone.
    fn rocchio(
        &mut self,
        freqs: &HashMap<String, f32>,
        relevant: &[DocId],
    ) -> Result<HashMap<String, f32>> {
        let mut centroid: HashMap<String, f32> = HashMap::new();
        for &doc_id in relevant {
            for (term, tf) in self.index.doc_vector(&mut self.reader, doc_id)? {
                *centroid.entry(term).or_insert(0.0) += tf;
            }
        }
        if !relevant.is_empty() {
            let scale = FEEDBACK_WEIGHT / relevant.len() as f32;
            for value in centroid.values_mut() {
                *value *= scale;
            }
        }

        let mut expanded = HashMap::with_capacity(freqs.len());
        for (term, tf) in freqs {
            let fed = centroid.remove(term).unwrap_or(0.0);
            expanded.insert(term.clone(), tf * (1.0 - FEEDBACK_WEIGHT) + fed);
        }

        let mut rest: Vec<(String, f32)> = centroid.into_iter().collect();
        rest.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rest.truncate(EXPANSION_TERMS);
        expanded.extend(rest);
        Ok(expanded)
    }
}

fn query_frequencies(query: &str) -> HashMap<String, f32> {
    let mut freqs = HashMap::new();
    for (term, _pos) in tokenizer::tokenize(query) {
        *freqs.entry(term).or_insert(0.0) += 1.0;
    }
    freqs
}

fn take_top(mut heap: BinaryHeap<ScoredDoc>, k: Option<usize>) -> Vec<ScoredDoc> {
    let limit = k.unwrap_or(usize::MAX).min(heap.len());
    let mut out = Vec::with_capacity(limit);
    while out.len() < limit {
        let Some(top) = heap.pop() else {
            break;
        };
        out.push(top);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_orders_by_score_then_ascending_doc_id() {
        let mut heap = BinaryHeap::new();
        heap.push(ScoredDoc { doc_id: 4, score: 0.5 });
        heap.push(ScoredDoc { doc_id: 2, score: 0.5 });
        heap.push(ScoredDoc { doc_id: 1, score: 0.1 });
        heap.push(ScoredDoc { doc_id: 3, score: 0.9 });

        let order: Vec<DocId> = take_top(heap, None).into_iter().map(|s| s.doc_id).collect();
        assert_eq!(order, vec![3, 2, 4, 1]);
    }

    #[test]
    fn take_top_caps_the_result() {
        let mut heap = BinaryHeap::new();
        for doc_id in 0..10 {
            heap.push(ScoredDoc { doc_id, score: doc_id as f32 });
        }
        let top = take_top(heap, Some(3));
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].doc_id, 9);
    }

    #[test]
    fn query_frequencies_count_stemmed_terms() {
        let freqs = query_frequencies("cats cat the dog");
        assert_eq!(freqs.get("cat"), Some(&2.0));
        assert_eq!(freqs.get("dog"), Some(&1.0));
        assert_eq!(freqs.get("the"), None);
    }
}
