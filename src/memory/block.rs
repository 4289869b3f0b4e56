//! Byte ranges inside the planned buffer.

/// Half-open byte range `[address, address + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    /// Byte offset from the start of the planned buffer
    pub address: usize,
    /// Size in bytes
    pub size: usize,
}

impl Block {
    pub fn new(address: usize, size: usize) -> Self {
        Self { address, size }
    }

    /// One past the last byte of the block
    pub fn end(&self) -> usize {
        self.address + self.size
    }

    /// Check if this block ends exactly where `other` starts
    pub fn is_adjacent_to(&self, other: &Block) -> bool {
        self.end() == other.address
    }

    pub fn overlaps(&self, other: &Block) -> bool {
        self.address < other.end() && other.address < self.end()
    }

    pub fn contains(&self, other: &Block) -> bool {
        self.address <= other.address && other.end() <= self.end()
    }
}
