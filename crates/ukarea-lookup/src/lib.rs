pub mod aggregate;
pub mod batch;
pub mod client;
pub mod containment;
pub mod error;
pub mod grid;
pub mod lookup;
pub mod pipeline;
mod rate_limit;
pub mod resolve;
pub mod session;
pub mod types;

pub use aggregate::{aggregate, normalize, ResultAggregator};
pub use batch::{batches, chunk, Batches, DEFAULT_BATCH_SIZE};
pub use client::PostcodesClient;
pub use containment::{filter_cities, NO_CITIES_MESSAGE};
pub use error::LookupError;
pub use grid::{sample, GridIter, DEFAULT_STEP_DEGREES};
pub use lookup::GeoLookup;
pub use pipeline::{
    sample_shape, search_postcodes, PostcodeSearch, SearchOptions, FETCH_FAILED_MESSAGE,
    NO_POSTCODES_MESSAGE,
};
pub use resolve::{resolve_cities, resolve_stream, ResolveOutcome, ResolveReport};
pub use session::{QueryState, QueryTicket, SessionController};
