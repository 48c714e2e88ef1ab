use crate::tokenizer;
use anyhow::{bail, Result};

/// Maximum number of words in a quoted phrase after stopword removal.
const MAX_PHRASE_LEN: usize = 3;

/// One element of a postfix (reverse-Polish) boolean query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryToken {
    Term(String),
    Phrase(Vec<String>),
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operator {
    And,
    Or,
    Not,
}

impl Operator {
    fn precedence(self) -> u8 {
        match self {
            Operator::Not => 3,
            Operator::And => 2,
            Operator::Or => 1,
        }
    }

    fn token(self) -> QueryToken {
        match self {
            Operator::And => QueryToken::And,
            Operator::Or => QueryToken::Or,
            Operator::Not => QueryToken::Not,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Operand(QueryToken),
    Op(Operator),
    Open,
    Close,
}

/// Parse a boolean query into postfix form via the shunting-yard
/// algorithm. Operands are case-folded and stemmed here so later
/// dictionary lookups are consistent with indexing. Unbalanced
/// parentheses and empty phrases are parse errors, raised before any
/// index access.
pub fn parse(query: &str) -> Result<Vec<QueryToken>> {
    shunting_yard(lex(query)?)
}

fn lex(query: &str) -> Result<Vec<Lexeme>> {
    let padded = query.replace('(', " ( ").replace(')', " ) ");
    let mut words = padded.split_whitespace();
    let mut out = Vec::new();
    while let Some(word) = words.next() {
        match word {
            "(" => out.push(Lexeme::Open),
            ")" => out.push(Lexeme::Close),
            "AND" => out.push(Lexeme::Op(Operator::And)),
            "OR" => out.push(Lexeme::Op(Operator::Or)),
            "NOT" => out.push(Lexeme::Op(Operator::Not)),
            _ if word.starts_with('"') => {
                let mut raw = vec![word.trim_start_matches('"').to_string()];
                let mut terminated = word.len() > 1 && word.ends_with('"');
                while !terminated {
                    let Some(next) = words.next() else {
                        bail!("unterminated phrase in query {query:?}");
                    };
                    terminated = next.ends_with('"');
                    raw.push(next.to_string());
                }
                out.push(lex_phrase(&raw, query)?);
            }
            _ => out.push(Lexeme::Operand(QueryToken::Term(tokenizer::normalize(word)))),
        }
    }
    Ok(out)
}

/// Normalize the words of a quoted phrase, dropping stopwords. A phrase
/// that normalizes to a single word degenerates to a plain term.
fn lex_phrase(raw: &[String], query: &str) -> Result<Lexeme> {
    let mut terms = Vec::new();
    for word in raw {
        let folded = tokenizer::fold(word.trim_matches('"'));
        if folded.is_empty() || tokenizer::is_stopword(&folded) {
            continue;
        }
        terms.push(tokenizer::stem(&folded));
    }
    match terms.len() {
        0 => bail!("empty phrase in query {query:?}"),
        1 => Ok(Lexeme::Operand(QueryToken::Term(terms.remove(0)))),
        2..=MAX_PHRASE_LEN => Ok(Lexeme::Operand(QueryToken::Phrase(terms))),
        n => bail!("phrase of {n} words exceeds the {MAX_PHRASE_LEN}-word limit"),
    }
}

fn shunting_yard(lexemes: Vec<Lexeme>) -> Result<Vec<QueryToken>> {
    let mut output = Vec::new();
    let mut stack: Vec<Lexeme> = Vec::new();

    for lexeme in lexemes {
        match lexeme {
            Lexeme::Operand(token) => output.push(token),
            Lexeme::Open => stack.push(Lexeme::Open),
            Lexeme::Close => loop {
                match stack.pop() {
                    Some(Lexeme::Open) => break,
                    Some(Lexeme::Op(op)) => output.push(op.token()),
                    _ => bail!("unbalanced parentheses in query"),
                }
            },
            Lexeme::Op(op) => {
                while let Some(&Lexeme::Op(top)) = stack.last() {
                    if top.precedence() > op.precedence() {
                        output.push(top.token());
                        stack.pop();
                    } else {
                        break;
                    }
                }
                stack.push(Lexeme::Op(op));
            }
        }
    }

    while let Some(lexeme) = stack.pop() {
        match lexeme {
            Lexeme::Op(op) => output.push(op.token()),
            _ => bail!("unbalanced parentheses in query"),
        }
    }
    Ok(output)
}
