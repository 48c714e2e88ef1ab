use engine::block::BlockBuilder;
use engine::index::{save_meta, IndexPaths, MetaFile};
use engine::merge::{merge_blocks, BlockFileCursor, RecordSource};
use engine::tokenizer::tokenize;
use engine::{DocId, Index};
use std::path::Path;

/// Build a complete index over `(doc_id, text)` pairs with the given
/// block memory budget, then open it.
pub fn build_index(root: &Path, docs: &[(DocId, &str)], budget: usize) -> Index {
    let paths = IndexPaths::new(root);
    let mut builder = BlockBuilder::new(paths.blocks_dir(), budget).unwrap();
    for (doc_id, text) in docs {
        builder.add(*doc_id, tokenize(text)).unwrap();
    }
    let build = builder.finish().unwrap();

    let mut sources: Vec<Box<dyn RecordSource>> = Vec::new();
    for path in &build.blocks {
        sources.push(Box::new(BlockFileCursor::open(path).unwrap()));
    }
    merge_blocks(sources, build.num_docs, &paths).unwrap();

    let meta = MetaFile {
        num_docs: build.num_docs,
        created_at: "2024-01-01T00:00:00Z".into(),
        version: 1,
    };
    save_meta(&paths, &meta).unwrap();
    Index::open(root).unwrap()
}
