mod common;

use common::build_index;
use engine::block::DEFAULT_MEMORY_BUDGET;
use engine::ranked::{RankedEngine, FEEDBACK_WEIGHT};
use engine::DocId;
use tempfile::tempdir;

const CORPUS: &[(DocId, &str)] = &[
    (1, "cat dog cat"),
    (2, "dog dog"),
    (3, "fish shark"),
    (4, "fish whale shark"),
];

fn doc_ids(ranked: &[engine::ScoredDoc]) -> Vec<DocId> {
    ranked.iter().map(|s| s.doc_id).collect()
}

#[test]
fn documents_with_the_term_outrank_documents_without_it() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), &[(1, "cat dog cat"), (2, "dog dog")], DEFAULT_MEMORY_BUDGET);
    let mut engine = RankedEngine::new(&index).unwrap();

    let ranked = engine.rank("cat", None).unwrap();
    assert_eq!(doc_ids(&ranked), vec![1], "only the document containing the term scores");
    assert!(ranked[0].score > 0.0);
}

#[test]
fn equal_scores_break_ties_by_ascending_doc_id() {
    let dir = tempdir().unwrap();
    let index = build_index(
        dir.path(),
        &[(1, "apple"), (2, "apple"), (3, "banana")],
        DEFAULT_MEMORY_BUDGET,
    );
    let mut engine = RankedEngine::new(&index).unwrap();

    let ranked = engine.rank("apple", None).unwrap();
    assert_eq!(doc_ids(&ranked), vec![1, 2]);
    assert!((ranked[0].score - ranked[1].score).abs() < 1e-6);
}

#[test]
fn top_k_truncates_the_ranking() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    let mut engine = RankedEngine::new(&index).unwrap();

    let all = engine.rank("fish shark whale", None).unwrap();
    let top1 = engine.rank("fish shark whale", Some(1)).unwrap();
    assert!(all.len() > 1);
    assert_eq!(top1.len(), 1);
    assert_eq!(top1[0].doc_id, all[0].doc_id);
}

#[test]
fn unknown_terms_contribute_nothing() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    let mut engine = RankedEngine::new(&index).unwrap();

    let plain = engine.rank("cat", None).unwrap();
    let with_unknown = engine.rank("cat zebra", None).unwrap();
    assert_eq!(doc_ids(&plain), doc_ids(&with_unknown));
    for (a, b) in plain.iter().zip(with_unknown.iter()) {
        assert!((a.score - b.score).abs() < 1e-6);
    }
}

#[test]
fn empty_feedback_scales_scores_without_reordering() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    let mut engine = RankedEngine::new(&index).unwrap();

    // all query terms have frequency one, so the (1 - beta) scaling is
    // uniform across terms and the ranking must not change
    let plain = engine.rank("cat dog", None).unwrap();
    let fed = engine.rank_with_feedback("cat dog", &[], None).unwrap();
    assert_eq!(doc_ids(&plain), doc_ids(&fed));

    let scale = 1.0 + (1.0f32 - FEEDBACK_WEIGHT).log10();
    for (a, b) in plain.iter().zip(fed.iter()) {
        assert!((b.score - a.score * scale).abs() < 1e-5);
    }
}

#[test]
fn judged_feedback_pulls_in_related_documents() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    let mut engine = RankedEngine::new(&index).unwrap();

    let plain = engine.rank("cat", None).unwrap();
    assert_eq!(doc_ids(&plain), vec![1]);

    // marking the shark document relevant expands the query with its terms
    let expanded = engine.rank_with_feedback("cat", &[3], None).unwrap();
    let ids = doc_ids(&expanded);
    assert!(ids.contains(&3));
    assert!(ids.contains(&4));
}

#[test]
fn pseudo_relevant_expansion_keeps_the_best_document_first() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    let mut engine = RankedEngine::new(&index).unwrap();

    let expanded = engine.rank_expanded("cat", &[], None).unwrap();
    assert_eq!(expanded[0].doc_id, 1);
    // expansion with doc 1's own vector brings in its other term
    assert!(doc_ids(&expanded).contains(&2));
}

#[test]
fn relevant_documents_missing_from_the_index_are_ignored() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    let mut engine = RankedEngine::new(&index).unwrap();

    let ranked = engine.rank_with_feedback("cat", &[99], None).unwrap();
    assert_eq!(doc_ids(&ranked), vec![1]);
}
