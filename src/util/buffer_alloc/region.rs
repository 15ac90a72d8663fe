/// A contiguous span of bytes inside one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub offset: u64,
    pub size: u64,
}

impl Region {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// One past the last byte of the region.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }

    /// True when `other` starts exactly where `self` ends.
    pub fn touches(&self, other: &Region) -> bool {
        self.end() == other.offset
    }
}
