use serde::{Deserialize, Serialize};

pub type DocId = u32;

/// One entry of a posting list: the document, its log-scaled term weight,
/// the in-document token positions, and an optional skip pointer to a later
/// slot of the same list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32,
    pub positions: Vec<u32>,
    pub skip: Option<u32>,
}

impl Posting {
    /// A posting carrying only a document id, as produced by the boolean
    /// merge operations.
    pub fn bare(doc_id: DocId) -> Self {
        Self {
            doc_id,
            weight: 0.0,
            positions: Vec::new(),
            skip: None,
        }
    }
}

/// Block-stage posting holding raw counts; weights are derived at merge
/// time once document frequencies are final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPosting {
    pub doc_id: DocId,
    pub tf: u32,
    pub positions: Vec<u32>,
}

/// Attach skip pointers with stride floor(sqrt(len)): every stride-th slot
/// points one stride ahead while a full stride remains, all other slots
/// carry no pointer.
pub fn attach_skips(postings: &mut [Posting]) {
    for p in postings.iter_mut() {
        p.skip = None;
    }
    let len = postings.len();
    let stride = (len as f64).sqrt().floor() as usize;
    if stride == 0 {
        return;
    }
    let mut at = 0;
    while at + stride < len {
        postings[at].skip = Some((at + stride) as u32);
        at += stride;
    }
}
