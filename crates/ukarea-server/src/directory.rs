//! City directory shared by the request handlers.
//!
//! The configured city list is loaded at startup and resolved to coordinates
//! in a background task, so the server accepts requests immediately. Each
//! city gains its coordinates as soon as its own lookup settles; a search
//! made while resolution is running sees the cities resolved so far.

use std::num::NonZeroUsize;
use std::pin::pin;
use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use ukarea_core::CityRecord;
use ukarea_lookup::{resolve_stream, GeoLookup, ResolveOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Pending,
    Ready,
}

/// How far startup resolution has got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolutionProgress {
    pub state: ResolutionState,
    pub total: usize,
    pub resolved: usize,
    pub no_match: usize,
    pub failed: usize,
}

impl ResolutionProgress {
    fn pending(total: usize) -> Self {
        Self {
            state: ResolutionState::Pending,
            total,
            resolved: 0,
            no_match: 0,
            failed: 0,
        }
    }

    fn tally(&mut self, outcome: &ResolveOutcome) {
        match outcome {
            ResolveOutcome::Resolved(_) => self.resolved += 1,
            ResolveOutcome::NoMatch => self.no_match += 1,
            ResolveOutcome::Failed(_) => self.failed += 1,
        }
    }
}

#[derive(Debug)]
pub struct CityDirectory {
    cities: RwLock<Vec<CityRecord>>,
    progress: RwLock<ResolutionProgress>,
}

impl CityDirectory {
    #[must_use]
    pub fn new(cities: Vec<CityRecord>) -> Self {
        let total = cities.len();
        Self {
            cities: RwLock::new(cities),
            progress: RwLock::new(ResolutionProgress::pending(total)),
        }
    }

    pub async fn snapshot(&self) -> Vec<CityRecord> {
        self.cities.read().await.clone()
    }

    pub async fn progress(&self) -> ResolutionProgress {
        *self.progress.read().await
    }

    /// Applies one settled lookup to the city at `index`.
    pub async fn record(&self, index: usize, outcome: &ResolveOutcome) {
        if let ResolveOutcome::Resolved(point) = outcome {
            if let Some(city) = self.cities.write().await.get_mut(index) {
                city.coordinates = Some(*point);
            }
        }
        self.progress.write().await.tally(outcome);
    }

    /// Marks resolution as finished and returns the final counts.
    pub async fn finish(&self) -> ResolutionProgress {
        let mut progress = self.progress.write().await;
        progress.state = ResolutionState::Ready;
        *progress
    }
}

/// Resolves the directory's cities in the background.
///
/// The returned handle may be dropped; the task keeps running.
pub fn spawn_resolution<L>(
    lookup: Arc<L>,
    directory: Arc<CityDirectory>,
    max_concurrent: NonZeroUsize,
) -> JoinHandle<()>
where
    L: GeoLookup + 'static,
{
    tokio::spawn(async move {
        let pending = directory.snapshot().await;
        tracing::info!(cities = pending.len(), "city resolution: starting");

        let mut outcomes = pin!(resolve_stream(lookup.as_ref(), pending, max_concurrent));
        while let Some((index, outcome)) = outcomes.next().await {
            directory.record(index, &outcome).await;
        }

        let progress = directory.finish().await;
        tracing::info!(
            resolved = progress.resolved,
            no_match = progress.no_match,
            failed = progress.failed,
            "city resolution: complete"
        );
    })
}
