use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::block::{BlockBuilder, DEFAULT_MEMORY_BUDGET};
use engine::index::{save_meta, IndexPaths, MetaFile};
use engine::merge::{merge_blocks, BlockFileCursor, RecordSource};
use engine::tokenizer::tokenize;
use engine::DocId;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build an inverted index by external block merging", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a directory of documents named by numeric id
    Build {
        /// Corpus directory
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// In-memory postings budget in bytes before a block is flushed
        #[arg(long, default_value_t = DEFAULT_MEMORY_BUDGET)]
        memory_budget: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, memory_budget } => {
            build_index(&input, &output, memory_budget)
        }
    }
}

fn build_index(input: &str, output: &str, memory_budget: usize) -> Result<()> {
    let paths = IndexPaths::new(output);
    fs::create_dir_all(&paths.root)?;

    // corpus files are named by their document id; scan in ascending order
    let mut doc_files: Vec<(DocId, PathBuf)> = Vec::new();
    for entry in WalkDir::new(input).min_depth(1).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let Ok(doc_id) = name.parse::<DocId>() else {
            tracing::warn!(file = %path.display(), "skipping file without a numeric id");
            continue;
        };
        doc_files.push((doc_id, path.to_path_buf()));
    }
    doc_files.sort_unstable_by_key(|(doc_id, _)| *doc_id);

    let mut builder = BlockBuilder::new(paths.blocks_dir(), memory_budget)?;
    for (doc_id, path) in &doc_files {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read document {}", path.display()))?;
        builder.add(*doc_id, tokenize(&text))?;
    }
    let build = builder.finish()?;
    tracing::info!(num_docs = build.num_docs, blocks = build.blocks.len(), "ingest complete");

    let mut sources: Vec<Box<dyn RecordSource>> = Vec::with_capacity(build.blocks.len());
    for path in &build.blocks {
        sources.push(Box::new(BlockFileCursor::open(path)?));
    }
    merge_blocks(sources, build.num_docs, &paths)?;
    fs::remove_dir(paths.blocks_dir()).context("remove emptied blocks directory")?;

    let meta = MetaFile {
        num_docs: build.num_docs,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into()),
        version: 1,
    };
    save_meta(&paths, &meta)?;

    tracing::info!(output, "index build complete");
    Ok(())
}
