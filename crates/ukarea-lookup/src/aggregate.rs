//! Folding per-batch lookup results into one deduplicated set.

use std::collections::BTreeSet;

use ukarea_core::PostalCode;

/// Accumulates batch results for a single query.
///
/// Collects present codes into an ordered set and counts matched and empty
/// slots for logging. Dropping the aggregator discards everything, which is
/// how a failed batch throws away the partial result.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    codes: BTreeSet<PostalCode>,
    matched_slots: usize,
    empty_slots: usize,
}

impl ResultAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb<I>(&mut self, batch: I)
    where
        I: IntoIterator<Item = Option<PostalCode>>,
    {
        for slot in batch {
            match slot {
                Some(code) => {
                    self.matched_slots += 1;
                    self.codes.insert(code);
                }
                None => self.empty_slots += 1,
            }
        }
    }

    #[must_use]
    pub fn matched_slots(&self) -> usize {
        self.matched_slots
    }

    #[must_use]
    pub fn empty_slots(&self) -> usize {
        self.empty_slots
    }

    #[must_use]
    pub fn distinct_codes(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn into_codes(self) -> BTreeSet<PostalCode> {
        self.codes
    }
}

/// Flattens all present codes across batches; duplicates collapse.
pub fn aggregate<B, I>(batch_results: B) -> BTreeSet<PostalCode>
where
    B: IntoIterator<Item = I>,
    I: IntoIterator<Item = Option<PostalCode>>,
{
    let mut aggregator = ResultAggregator::new();
    for batch in batch_results {
        aggregator.absorb(batch);
    }
    aggregator.into_codes()
}

/// Outward codes of `codes`, deduplicated and sorted ascending.
pub fn normalize<'a, I>(codes: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a PostalCode>,
{
    codes
        .into_iter()
        .map(|code| code.outward().to_owned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
