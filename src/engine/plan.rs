// Maps an inclusive byte interval onto aligned chunk fetches.

use crate::error::{Error, Result};

/// Which chunks to fetch for `[start, end]` and how to trim them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub start: u64,
    pub end: u64,
    pub file_size: u64,
    pub chunk_size: u64,
    /// First chunk-aligned byte at or before `start`.
    pub offset: u64,
    /// Bytes dropped from the head of the first chunk.
    pub first_trim: u64,
    /// Bytes kept from the head of the last chunk.
    pub last_keep: u64,
    pub part_count: u64,
}

impl ChunkPlan {
    /// Requires `start <= end < file_size` and a non-zero `chunk_size`.
    pub fn new(start: u64, end: u64, file_size: u64, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk size must be positive".to_string()));
        }
        if start > end || end >= file_size {
            return Err(Error::RangeNotSatisfiable {
                start,
                end,
                file_size,
            });
        }

        let offset = start - (start % chunk_size);
        Ok(Self {
            start,
            end,
            file_size,
            chunk_size,
            offset,
            first_trim: start - offset,
            last_keep: (end % chunk_size) + 1,
            part_count: ((end - offset) / chunk_size) + 1,
        })
    }

    pub fn first_chunk(&self) -> u64 {
        self.offset / self.chunk_size
    }

    pub fn last_chunk(&self) -> u64 {
        self.first_chunk() + self.part_count - 1
    }

    pub fn total_bytes(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Byte range `[from, to)` to keep from the `part`-th fetched chunk.
    pub fn slice_bounds(&self, part: u64) -> (u64, u64) {
        let from = if part == 0 { self.first_trim } else { 0 };
        let to = if part + 1 == self.part_count {
            self.last_keep
        } else {
            self.chunk_size
        };
        (from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CHUNK_SIZE;

    #[test]
    fn test_plan_two_chunks() {
        let plan = ChunkPlan::new(600_000, 1_300_000, 2 * 1024 * 1024, CHUNK_SIZE).unwrap();
        assert_eq!(plan.offset, 524_288);
        assert_eq!(plan.first_trim, 75_712);
        assert_eq!(plan.part_count, 2);
        assert_eq!(plan.last_keep, 1_300_000 % CHUNK_SIZE + 1);
        assert_eq!(plan.total_bytes(), 700_001);
        assert_eq!(plan.first_chunk(), 1);
        assert_eq!(plan.last_chunk(), 2);

        let (a0, b0) = plan.slice_bounds(0);
        let (a1, b1) = plan.slice_bounds(1);
        assert_eq!((b0 - a0) + (b1 - a1), 700_001);
    }

    #[test]
    fn test_plan_single_chunk_applies_both_trims() {
        let plan = ChunkPlan::new(10, 19, 100, 64).unwrap();
        assert_eq!(plan.part_count, 1);
        assert_eq!(plan.slice_bounds(0), (10, 20));
    }

    #[test]
    fn test_plan_aligned_interval() {
        let plan = ChunkPlan::new(0, 127, 128, 64).unwrap();
        assert_eq!(plan.part_count, 2);
        assert_eq!(plan.slice_bounds(0), (0, 64));
        assert_eq!(plan.slice_bounds(1), (0, 64));
    }

    #[test]
    fn test_plan_rejects_out_of_bounds() {
        assert!(matches!(
            ChunkPlan::new(10, 10, 10, 64),
            Err(Error::RangeNotSatisfiable { .. })
        ));
        assert!(matches!(
            ChunkPlan::new(5, 4, 10, 64),
            Err(Error::RangeNotSatisfiable { .. })
        ));
        assert!(ChunkPlan::new(0, 0, 1, 0).is_err());
    }
}
