mod common;

use common::build_index;
use engine::block::DEFAULT_MEMORY_BUDGET;
use engine::boolean::BooleanEngine;
use engine::parser::parse;
use engine::{DocId, Index};
use tempfile::tempdir;

const CORPUS: &[(DocId, &str)] = &[
    (1, "the quick brown fox jumps over the lazy dog"),
    (2, "quick brown cats sleep"),
    (3, "the dog chases the quick red fox"),
    (4, "information retrieval systems index documents"),
    (5, "boolean information retrieval uses posting lists"),
];

fn evaluate(index: &Index, query: &str) -> Vec<DocId> {
    let mut engine = BooleanEngine::new(index).unwrap();
    engine.evaluate(&parse(query).unwrap()).unwrap()
}

#[test]
fn single_term_lists_its_documents() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    assert_eq!(evaluate(&index, "quick"), vec![1, 2, 3]);
    assert_eq!(evaluate(&index, "zebra"), Vec::<DocId>::new());
}

#[test]
fn and_intersects_in_ascending_order() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    assert_eq!(evaluate(&index, "quick AND fox"), vec![1, 3]);
    assert_eq!(evaluate(&index, "quick AND zebra"), Vec::<DocId>::new());
}

#[test]
fn or_unions_in_ascending_order() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    assert_eq!(evaluate(&index, "quick OR dog"), vec![1, 2, 3]);
    assert_eq!(evaluate(&index, "cats OR retrieval"), vec![2, 4, 5]);
}

#[test]
fn not_complements_against_all_documents() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    assert_eq!(evaluate(&index, "NOT quick"), vec![4, 5]);
    assert_eq!(evaluate(&index, "quick AND NOT fox"), vec![2]);
    assert_eq!(evaluate(&index, "quick AND NOT quick"), Vec::<DocId>::new());
}

#[test]
fn parentheses_override_precedence() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    // without parentheses AND binds first
    assert_eq!(evaluate(&index, "cats OR dog AND fox"), vec![1, 2, 3]);
    assert_eq!(evaluate(&index, "(cats OR dog) AND fox"), vec![1, 3]);
}

#[test]
fn two_word_phrase_requires_adjacency() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    assert_eq!(evaluate(&index, "\"quick brown\""), vec![1, 2]);
    // doc 3 contains "quick" and "fox" but not adjacently
    assert_eq!(evaluate(&index, "\"quick fox\""), Vec::<DocId>::new());
    assert_eq!(evaluate(&index, "\"red fox\""), vec![3]);
}

#[test]
fn three_word_phrase_is_a_subset_of_its_prefix() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    let two = evaluate(&index, "\"quick brown\"");
    let three = evaluate(&index, "\"quick brown fox\"");
    assert_eq!(three, vec![1]);
    assert!(three.iter().all(|d| two.contains(d)));

    let third_term = evaluate(&index, "fox");
    assert!(three.iter().all(|d| third_term.contains(d)));
}

#[test]
fn phrases_combine_with_boolean_operators() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    assert_eq!(evaluate(&index, "\"brown fox\" AND dog"), vec![1]);
    assert_eq!(evaluate(&index, "\"information retrieval\" OR cats"), vec![2, 4, 5]);
}

#[test]
fn stopword_aware_phrase_matching() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    // "jumps over the lazy" tokenizes to adjacent "jump lazi", stopwords removed
    assert_eq!(evaluate(&index, "\"jumps lazy\""), vec![1]);
}

#[test]
fn malformed_queries_are_rejected_before_evaluation() {
    let dir = tempdir().unwrap();
    let index = build_index(dir.path(), CORPUS, DEFAULT_MEMORY_BUDGET);
    let mut engine = BooleanEngine::new(&index).unwrap();

    assert!(parse("(quick AND fox").is_err());
    assert!(parse("\"\"").is_err());

    // parses, but leaves two operands on the stack
    let postfix = parse("quick fox").unwrap();
    assert!(engine.evaluate(&postfix).is_err());

    // operator with no operands
    let postfix = parse("AND").unwrap();
    assert!(engine.evaluate(&postfix).is_err());
}
