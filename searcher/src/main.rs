use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::boolean::BooleanEngine;
use engine::parser::parse;
use engine::ranked::RankedEngine;
use engine::{DocId, Index, ScoredDoc};
use tracing_subscriber::{fmt, EnvFilter};

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

#[derive(Parser)]
#[command(name = "searcher")]
#[command(about = "Answer boolean or ranked queries against a built index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one boolean query per input line
    Boolean {
        /// Index directory
        #[arg(long)]
        index: String,
        /// File with one query per line
        #[arg(long)]
        queries: String,
        /// Output file, one line of ascending document ids per query
        #[arg(long)]
        output: String,
    },
    /// Rank documents for free-text queries by cosine similarity
    Ranked {
        /// Index directory
        #[arg(long)]
        index: String,
        /// File with one query per line, or with `--feedback` the query
        /// followed by judged-relevant document ids
        #[arg(long)]
        queries: String,
        /// Output file, one line of document ids per query
        #[arg(long)]
        output: String,
        /// Number of results per query
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Run one round of Rocchio expansion and emit the full ranking
        #[arg(long, default_value_t = false)]
        feedback: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Boolean { index, queries, output } => run_boolean(&index, &queries, &output),
        Commands::Ranked { index, queries, output, top, feedback } => {
            run_ranked(&index, &queries, &output, top, feedback)
        }
    }
}

fn run_boolean(index_dir: &str, queries: &str, output: &str) -> Result<()> {
    let index = Index::open(index_dir)?;
    let mut engine = BooleanEngine::new(&index)?;

    let reader = BufReader::new(
        File::open(queries).with_context(|| format!("open queries file {queries}"))?,
    );
    let mut out = BufWriter::new(
        File::create(output).with_context(|| format!("create results file {output}"))?,
    );
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            writeln!(out)?;
            continue;
        }
        let postfix = parse(&line)?;
        let docs = engine.evaluate(&postfix)?;
        writeln!(out, "{}", render_ids(&docs))?;
    }
    out.flush()?;
    Ok(())
}

fn run_ranked(index_dir: &str, queries: &str, output: &str, top: usize, feedback: bool) -> Result<()> {
    let index = Index::open(index_dir)?;
    let mut engine = RankedEngine::new(&index)?;

    let reader = BufReader::new(
        File::open(queries).with_context(|| format!("open queries file {queries}"))?,
    );
    let mut out = BufWriter::new(
        File::create(output).with_context(|| format!("create results file {output}"))?,
    );

    if feedback {
        let mut lines = reader.lines();
        let query = lines.next().transpose()?.context("queries file is empty")?;
        let mut relevant: Vec<DocId> = Vec::new();
        for line in lines {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            relevant.push(
                trimmed
                    .parse()
                    .with_context(|| format!("invalid relevant document id {trimmed:?}"))?,
            );
        }
        let ranked = engine.rank_expanded(&degrade(&query), &relevant, None)?;
        writeln!(out, "{}", render_scored(&ranked))?;
    } else {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                writeln!(out)?;
                continue;
            }
            let ranked = engine.rank(&degrade(&line), Some(top))?;
            writeln!(out, "{}", render_scored(&ranked))?;
        }
    }
    out.flush()?;
    Ok(())
}

/// A ranked query carrying boolean markers is degraded to plain free
/// text rather than filtered; ranking has no boolean semantics.
fn degrade(query: &str) -> String {
    if query.contains('"') || query.contains("AND") {
        tracing::debug!(query, "boolean markers in ranked query, degrading to free text");
        query.replace("AND", " ").replace('"', " ")
    } else {
        query.to_string()
    }
}

fn render_ids(docs: &[DocId]) -> String {
    docs.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(" ")
}

fn render_scored(ranked: &[ScoredDoc]) -> String {
    ranked.iter().map(|s| s.doc_id.to_string()).collect::<Vec<_>>().join(" ")
}
