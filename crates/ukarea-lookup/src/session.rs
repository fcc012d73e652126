//! Query session ownership.
//!
//! A session holds the one "current" result of a search front end. Each new
//! search takes a [`QueryTicket`] from [`SessionController::begin`]; the
//! ticket stays valid only until the next `begin` or `reset`, and results
//! delivered with a stale ticket are dropped instead of overwriting newer
//! state. Long-running pipelines also poll the ticket between batches so a
//! superseded search stops issuing requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

/// What the front end should currently show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum QueryState<T> {
    /// Nothing drawn yet, or reset.
    Idle,
    Loading,
    Ready(T),
    /// A search completed and matched nothing.
    Empty,
    /// A search failed; holds the user-facing message.
    Failed(String),
}

/// Handle proving which search generation a result belongs to.
#[derive(Debug, Clone)]
pub struct QueryTicket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl QueryTicket {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once a newer search has begun or the session was reset.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

/// Single-writer owner of the current query state.
#[derive(Debug)]
pub struct SessionController<T> {
    generation: Arc<AtomicU64>,
    state: Mutex<QueryState<T>>,
}

impl<T> Default for SessionController<T> {
    fn default() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            state: Mutex::new(QueryState::Idle),
        }
    }
}

impl<T: Clone> SessionController<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new search, invalidating every earlier ticket.
    pub async fn begin(&self) -> QueryTicket {
        let mut state = self.state.lock().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *state = QueryState::Loading;
        tracing::debug!(generation, "query session started");
        QueryTicket {
            generation,
            current: Arc::clone(&self.generation),
        }
    }

    /// Stores a successful result. Returns `false` and leaves the state
    /// untouched when the ticket is stale.
    pub async fn complete(&self, ticket: &QueryTicket, value: T) -> bool {
        self.replace(ticket, QueryState::Ready(value)).await
    }

    /// Records a search that finished with nothing to show.
    pub async fn complete_empty(&self, ticket: &QueryTicket) -> bool {
        self.replace(ticket, QueryState::Empty).await
    }

    /// Records a failed search with a user-facing message.
    pub async fn fail(&self, ticket: &QueryTicket, message: impl Into<String>) -> bool {
        self.replace(ticket, QueryState::Failed(message.into()))
            .await
    }

    /// Drops any result and invalidates in-flight searches.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *state = QueryState::Idle;
    }

    pub async fn snapshot(&self) -> QueryState<T> {
        self.state.lock().await.clone()
    }

    /// The ready result, if any.
    pub async fn current(&self) -> Option<T> {
        match &*self.state.lock().await {
            QueryState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    async fn replace(&self, ticket: &QueryTicket, next: QueryState<T>) -> bool {
        let mut state = self.state.lock().await;
        if !ticket.is_current() {
            tracing::info!(
                generation = ticket.generation(),
                "discarding result of superseded query"
            );
            return false;
        }
        *state = next;
        true
    }
}
