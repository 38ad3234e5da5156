//! Splits a document into request-sized pieces for the speech API.
//!
//! The split is a heuristic: documents at or above [`MAX_REQUEST_BYTES`]
//! are cut on the literal `".\n"` delimiter and submitted two groups at a
//! time. Nothing guarantees a pair stays under the limit; the retry in
//! [`crate::narration`] handles pairs the API rejects.

pub const MAX_REQUEST_BYTES: usize = 5000;
pub const SENTENCE_DELIMITER: &str = ".\n";
pub const GROUPS_PER_REQUEST: usize = 2;

/// One request's worth of text, along with the groups it was built from so
/// a rejected pair can be resubmitted one group at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Index of the first group in this chunk.
    pub index: usize,
    pub groups: Vec<&'a str>,
}

impl<'a> Chunk<'a> {
    pub fn text(&self) -> String {
        self.groups.join(SENTENCE_DELIMITER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkPlan<'a> {
    Single(&'a str),
    Pairs(Vec<Chunk<'a>>),
}

impl ChunkPlan<'_> {
    pub fn request_count(&self) -> usize {
        match self {
            ChunkPlan::Single(_) => 1,
            ChunkPlan::Pairs(chunks) => chunks.len(),
        }
    }
}

/// Request count announced in the log before a long document is synthesized.
pub fn estimated_requests(byte_len: usize) -> usize {
    byte_len / MAX_REQUEST_BYTES + 3
}

pub fn plan_chunks(text: &str) -> ChunkPlan<'_> {
    if text.len() < MAX_REQUEST_BYTES {
        return ChunkPlan::Single(text);
    }

    let groups: Vec<&str> = text.split(SENTENCE_DELIMITER).collect();
    let chunks = groups
        .chunks(GROUPS_PER_REQUEST)
        .enumerate()
        .map(|(n, pair)| Chunk {
            index: n * GROUPS_PER_REQUEST,
            groups: pair.to_vec(),
        })
        .collect();

    ChunkPlan::Pairs(chunks)
}
