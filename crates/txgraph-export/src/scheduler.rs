use std::ops::Range;

/// Heights processed together by a single worker.
pub const DEFAULT_CHUNK_SIZE: u32 = 1000;

/// A contiguous span of heights, the unit of parallel work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: u32,
    pub end: u32,
}

impl Chunk {
    pub fn heights(&self) -> Range<u32> {
        self.start..self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Splits a height range into chunks and groups the chunks into batches.
///
/// Batches are run strictly one after the other; the chunks of a batch run concurrently.
#[derive(Debug, Clone)]
pub struct ChunkScheduler {
    chunks: Vec<Chunk>,
}

impl ChunkScheduler {
    /// Partitions `range` into chunks of `chunk_size` heights, the last one possibly shorter.
    pub fn new(range: Range<u32>, chunk_size: u32) -> Self {
        let chunk_size = chunk_size.max(1);

        let chunks = range
            .clone()
            .step_by(chunk_size as usize)
            .map(|start| Chunk {
                start,
                end: start.saturating_add(chunk_size).min(range.end),
            })
            .collect();

        Self { chunks }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Total number of heights covered.
    pub fn heights(&self) -> u64 {
        self.chunks.iter().map(|chunk| u64::from(chunk.len())).sum()
    }

    /// Groups chunks into batches of at most `concurrency` chunks, in height order.
    pub fn batches(&self, concurrency: usize) -> impl Iterator<Item = &[Chunk]> {
        self.chunks.chunks(concurrency.max(1))
    }

    /// Number of batches [`Self::batches`] yields for `concurrency`.
    pub fn batch_count(&self, concurrency: usize) -> usize {
        self.chunks.len().div_ceil(concurrency.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contiguous(scheduler: &ChunkScheduler, range: Range<u32>) {
        let chunks = scheduler.chunks();
        assert_eq!(chunks.first().map(|c| c.start), Some(range.start));
        assert_eq!(chunks.last().map(|c| c.end), Some(range.end));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(scheduler.heights(), u64::from(range.end - range.start));
    }

    #[test]
    fn test_chunks_cover_range_with_short_tail() {
        let scheduler = ChunkScheduler::new(0..2500, 1000);

        assert_eq!(
            scheduler.chunks(),
            &[
                Chunk { start: 0, end: 1000 },
                Chunk {
                    start: 1000,
                    end: 2000
                },
                Chunk {
                    start: 2000,
                    end: 2500
                },
            ]
        );
        assert_contiguous(&scheduler, 0..2500);
    }

    #[test]
    fn test_unaligned_start() {
        let scheduler = ChunkScheduler::new(1234..5000, 1000);

        assert_eq!(scheduler.chunks()[0], Chunk { start: 1234, end: 2234 });
        assert_eq!(scheduler.chunks().len(), 4);
        assert_contiguous(&scheduler, 1234..5000);
    }

    #[test]
    fn test_empty_range_has_no_chunks() {
        let scheduler = ChunkScheduler::new(10..10, 1000);

        assert!(scheduler.chunks().is_empty());
        assert_eq!(scheduler.batches(4).count(), 0);
        assert_eq!(scheduler.batch_count(4), 0);
    }

    #[test]
    fn test_zero_chunk_size_is_treated_as_one() {
        let scheduler = ChunkScheduler::new(0..3, 0);
        assert_eq!(scheduler.chunks().len(), 3);
    }

    #[test]
    fn test_batches_respect_concurrency() {
        let scheduler = ChunkScheduler::new(0..10_500, 1000);

        let sizes = scheduler.batches(4).map(<[Chunk]>::len).collect::<Vec<_>>();
        assert_eq!(sizes, vec![4, 4, 3]);
        assert_eq!(scheduler.batch_count(4), 3);

        let flattened = scheduler.batches(4).flatten().copied().collect::<Vec<_>>();
        assert_eq!(flattened, scheduler.chunks());

        assert_eq!(scheduler.batches(0).count(), 11);
    }
}
