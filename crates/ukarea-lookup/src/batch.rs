use std::num::NonZeroUsize;

/// Largest batch the bulk reverse-geocode endpoint accepts.
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(ukarea_core::MAX_BATCH_SIZE) {
    Some(size) => size,
    None => panic!("MAX_BATCH_SIZE must be non-zero"),
};

/// Splits `items` into contiguous groups of at most `size`, preserving
/// order. Only the last group can be shorter; empty input gives no groups.
#[must_use]
pub fn chunk<T>(items: &[T], size: NonZeroUsize) -> Vec<&[T]> {
    items.chunks(size.get()).collect()
}

/// Lazy counterpart of [`chunk`]: pulls at most `size` items at a time from
/// `items`, so only one group is ever held in memory.
pub fn batches<I: Iterator>(items: I, size: NonZeroUsize) -> Batches<I> {
    Batches {
        items,
        size: size.get(),
    }
}

#[derive(Debug, Clone)]
pub struct Batches<I> {
    items: I,
    size: usize,
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<I::Item> = self.items.by_ref().take(self.size).collect();
        (!batch.is_empty()).then_some(batch)
    }
}
