use crate::WorkItem;

/// 1-based inclusive chapter range, validated against the list it selects from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterRange {
    from: usize,
    to: usize,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("chapter numbers must be between 1 and {len}")]
    OutOfBounds { len: usize },
    #[error("from chapter ({from}) must be less than or equal to to chapter ({to})")]
    Reversed { from: usize, to: usize },
}

impl ChapterRange {
    pub fn new(from: usize, to: usize, len: usize) -> Result<Self, RangeError> {
        if from < 1 || to < 1 || from > len || to > len {
            return Err(RangeError::OutOfBounds { len });
        }
        if from > to {
            return Err(RangeError::Reversed { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn first(&self) -> usize {
        self.from
    }

    pub fn last(&self) -> usize {
        self.to
    }

    pub fn count(&self) -> usize {
        self.to - self.from + 1
    }

    pub fn select<'a>(&self, items: &'a [WorkItem]) -> &'a [WorkItem] {
        let end = self.to.min(items.len());
        let start = (self.from - 1).min(end);
        &items[start..end]
    }
}
