use crate::index::{Index, PostingsReader};
use crate::parser::QueryToken;
use crate::postings::{DocId, Posting};
use anyhow::{bail, Result};

/// Evaluation stack slot: either a materialized posting list or a term
/// still awaiting dictionary resolution.
enum Operand {
    Resolved(Vec<Posting>),
    Term(String),
}

/// Evaluates postfix boolean queries against an immutable index. Holds its
/// own postings cursor, so independent engines can serve queries
/// concurrently.
pub struct BooleanEngine<'a> {
    index: &'a Index,
    reader: PostingsReader,
}

impl<'a> BooleanEngine<'a> {
    pub fn new(index: &'a Index) -> Result<Self> {
        Ok(Self { index, reader: index.reader()? })
    }

    /// Evaluate a postfix query to the ascending list of matching
    /// document ids.
    pub fn evaluate(&mut self, postfix: &[QueryToken]) -> Result<Vec<DocId>> {
        let mut stack: Vec<Operand> = Vec::new();
        for token in postfix {
            match token {
                QueryToken::Term(term) => stack.push(Operand::Term(term.clone())),
                QueryToken::Phrase(terms) => {
                    let list = self.resolve_phrase(terms)?;
                    stack.push(Operand::Resolved(list));
                }
                QueryToken::And => {
                    let (a, b) = self.pop_pair(&mut stack)?;
                    stack.push(Operand::Resolved(intersect(&a, &b)));
                }
                QueryToken::Or => {
                    let (a, b) = self.pop_pair(&mut stack)?;
                    stack.push(Operand::Resolved(union(&a, &b)));
                }
                QueryToken::Not => {
                    let a = self.pop_operand(&mut stack)?;
                    let all = self.index.all_documents();
                    stack.push(Operand::Resolved(difference(&all, &a)));
                }
            }
        }

        let Some(top) = stack.pop() else {
            bail!("malformed query: nothing to evaluate");
        };
        if !stack.is_empty() {
            bail!("malformed query: operands left without an operator");
        }
        let result = self.resolve(top)?;
        Ok(result.into_iter().map(|p| p.doc_id).collect())
    }

    fn resolve(&mut self, operand: Operand) -> Result<Vec<Posting>> {
        match operand {
            Operand::Resolved(list) => Ok(list),
            Operand::Term(term) => self.index.postings(&mut self.reader, &term),
        }
    }

    fn pop_operand(&mut self, stack: &mut Vec<Operand>) -> Result<Vec<Posting>> {
        let Some(operand) = stack.pop() else {
            bail!("malformed query: operator is missing an operand");
        };
        self.resolve(operand)
    }

    fn pop_pair(&mut self, stack: &mut Vec<Operand>) -> Result<(Vec<Posting>, Vec<Posting>)> {
        let a = self.pop_operand(stack)?;
        let b = self.pop_operand(stack)?;
        Ok((a, b))
    }

    /// Resolve a quoted phrase to the documents containing its words at
    /// consecutive positions, chaining the positional join across words.
    fn resolve_phrase(&mut self, terms: &[String]) -> Result<Vec<Posting>> {
        let Some((first, rest)) = terms.split_first() else {
            bail!("empty phrase");
        };
        let mut acc = self.index.postings(&mut self.reader, first)?;
        for term in rest {
            if acc.is_empty() {
                break;
            }
            let next = self.index.postings(&mut self.reader, term)?;
            acc = positional_intersect(&acc, &next);
        }
        Ok(acc)
    }
}

/// Step one slot forward, or ride skip pointers while the skip target's
/// document is still at or before `target`.
fn advance(list: &[Posting], at: usize, target: DocId) -> usize {
    match list[at].skip {
        Some(skip) if list[skip as usize].doc_id <= target => {
            let mut at = skip as usize;
            while let Some(next) = list[at].skip {
                if list[next as usize].doc_id <= target {
                    at = next as usize;
                } else {
                    break;
                }
            }
            at
        }
        _ => at + 1,
    }
}

/// Sorted intersection with skip acceleration: when the lists disagree,
/// the lagging side follows its skip pointer whenever the skip still
/// lands at or before the other side's current document.
pub fn intersect(a: &[Posting], b: &[Posting]) -> Vec<Posting> {
    let mut out = Vec::new();
    let (mut p1, mut p2) = (0, 0);
    while p1 < a.len() && p2 < b.len() {
        let d1 = a[p1].doc_id;
        let d2 = b[p2].doc_id;
        if d1 == d2 {
            out.push(Posting::bare(d1));
            p1 += 1;
            p2 += 1;
        } else if d1 < d2 {
            p1 = advance(a, p1, d2);
        } else {
            p2 = advance(b, p2, d1);
        }
    }
    out
}

/// Linear-scan intersection without skip acceleration; kept as the
/// reference implementation for the skip-equivalence tests.
pub fn intersect_linear(a: &[Posting], b: &[Posting]) -> Vec<Posting> {
    let mut out = Vec::new();
    let (mut p1, mut p2) = (0, 0);
    while p1 < a.len() && p2 < b.len() {
        let d1 = a[p1].doc_id;
        let d2 = b[p2].doc_id;
        if d1 == d2 {
            out.push(Posting::bare(d1));
            p1 += 1;
            p2 += 1;
        } else if d1 < d2 {
            p1 += 1;
        } else {
            p2 += 1;
        }
    }
    out
}

/// Sorted union of two posting lists.
pub fn union(a: &[Posting], b: &[Posting]) -> Vec<Posting> {
    let mut out = Vec::new();
    let (mut p1, mut p2) = (0, 0);
    while p1 < a.len() && p2 < b.len() {
        let d1 = a[p1].doc_id;
        let d2 = b[p2].doc_id;
        if d1 == d2 {
            out.push(Posting::bare(d1));
            p1 += 1;
            p2 += 1;
        } else if d1 < d2 {
            out.push(Posting::bare(d1));
            p1 += 1;
        } else {
            out.push(Posting::bare(d2));
            p2 += 1;
        }
    }
    out.extend(a[p1..].iter().map(|p| Posting::bare(p.doc_id)));
    out.extend(b[p2..].iter().map(|p| Posting::bare(p.doc_id)));
    out
}

/// Documents of `all` absent from `a`; with `all` being the full document
/// list this is the NOT complement.
pub fn difference(all: &[Posting], a: &[Posting]) -> Vec<Posting> {
    let mut out = Vec::new();
    let (mut p_all, mut p1) = (0, 0);
    while p_all < all.len() && p1 < a.len() {
        let d_all = all[p_all].doc_id;
        let d1 = a[p1].doc_id;
        if d_all == d1 {
            p_all += 1;
            p1 += 1;
        } else if d_all < d1 {
            out.push(Posting::bare(d_all));
            p_all += 1;
        } else {
            p1 += 1;
        }
    }
    out.extend(all[p_all..].iter().map(|p| Posting::bare(p.doc_id)));
    out
}

/// Document-level intersection that also joins position lists, keeping a
/// document only when `b` has a position exactly one past a position of
/// `a`. The surviving postings carry the phrase end positions, so the
/// join chains for longer phrases.
pub fn positional_intersect(a: &[Posting], b: &[Posting]) -> Vec<Posting> {
    let mut out = Vec::new();
    let (mut p1, mut p2) = (0, 0);
    while p1 < a.len() && p2 < b.len() {
        let d1 = a[p1].doc_id;
        let d2 = b[p2].doc_id;
        if d1 == d2 {
            let ends = adjacent_positions(&a[p1].positions, &b[p2].positions);
            if !ends.is_empty() {
                let weight = 1.0 + (ends.len() as f32).log10();
                out.push(Posting { doc_id: d1, weight, positions: ends, skip: None });
            }
            p1 += 1;
            p2 += 1;
        } else if d1 < d2 {
            p1 += 1;
        } else {
            p2 += 1;
        }
    }
    out
}

fn adjacent_positions(prev: &[u32], next: &[u32]) -> Vec<u32> {
    let mut out = Vec::new();
    let (mut p1, mut p2) = (0, 0);
    while p1 < prev.len() && p2 < next.len() {
        let a = prev[p1];
        let b = next[p2];
        if b == a + 1 {
            out.push(b);
            p1 += 1;
            p2 += 1;
        } else if a < b {
            p1 += 1;
        } else {
            p2 += 1;
        }
    }
    out
}
