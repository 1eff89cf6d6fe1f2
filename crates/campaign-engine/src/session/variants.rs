use thiserror::Error;

use crate::content::CandidateMessage;

pub const MAX_VARIANTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("variant pool cannot be empty")]
    Empty,
    #[error("variant pool holds at most {max} candidates, got {0}", max = MAX_VARIANTS)]
    TooMany(usize),
    #[error("variant index {index} is out of range for {len} variants")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Candidates from one generation request plus the selected pointer.
/// Never empty; `selected_index` is always a valid index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPool {
    candidates: Vec<CandidateMessage>,
    selected_index: usize,
}

impl VariantPool {
    pub fn new(candidates: Vec<CandidateMessage>) -> Result<Self, PoolError> {
        check_size(candidates.len())?;
        Ok(Self {
            candidates,
            selected_index: 0,
        })
    }

    /// Replaces every candidate at once and selects the first one.
    pub fn install(&mut self, candidates: Vec<CandidateMessage>) -> Result<(), PoolError> {
        check_size(candidates.len())?;
        self.candidates = candidates;
        self.selected_index = 0;
        Ok(())
    }

    pub fn select(&mut self, index: usize) -> Result<&CandidateMessage, PoolError> {
        if index >= self.candidates.len() {
            return Err(PoolError::IndexOutOfRange {
                index,
                len: self.candidates.len(),
            });
        }
        self.selected_index = index;
        Ok(&self.candidates[index])
    }

    /// The only mutation path for edits: other entries are never touched.
    pub fn replace_selected(&mut self, candidate: CandidateMessage) -> CandidateMessage {
        std::mem::replace(&mut self.candidates[self.selected_index], candidate)
    }

    pub fn selected(&self) -> &CandidateMessage {
        &self.candidates[self.selected_index]
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn get(&self, index: usize) -> Option<&CandidateMessage> {
        self.candidates.get(index)
    }

    pub fn candidates(&self) -> &[CandidateMessage] {
        &self.candidates
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateMessage> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

fn check_size(len: usize) -> Result<(), PoolError> {
    match len {
        0 => Err(PoolError::Empty),
        len if len > MAX_VARIANTS => Err(PoolError::TooMany(len)),
        _ => Ok(()),
    }
}
