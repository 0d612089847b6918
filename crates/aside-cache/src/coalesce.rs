//! Per-key request coalescing.
//!
//! Concurrent loads of one key share a single execution. The first caller
//! registers a flight and spawns the load; later callers for the same key
//! subscribe to that flight and receive a clone of its outcome, value or
//! error. The load runs as its own task, so a caller that stops waiting does
//! not cancel it for the others. The flight removes itself from the map once
//! its outcome is ready; subscribers already holding it still receive it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::context::CallContext;
use crate::error::{CacheError, CacheResult};

type SharedLoad<T> = Shared<BoxFuture<'static, CacheResult<T>>>;

struct Flight<T> {
    id: u64,
    outcome: SharedLoad<T>,
}

/// Map from key to the load currently in flight for it.
pub(crate) struct Coalescer<T> {
    flights: Arc<DashMap<String, Flight<T>>>,
    next_id: AtomicU64,
}

impl<T> Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of keys with a load in flight.
    pub(crate) fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Join the flight for `key`, starting it with `load` if none exists.
    ///
    /// Returns the shared outcome and whether this caller started the flight.
    /// The wait is bounded by `ctx`; the load itself is not.
    pub(crate) async fn run<F>(
        &self,
        ctx: &CallContext,
        key: &str,
        load: F,
    ) -> (CacheResult<T>, bool)
    where
        F: FnOnce() -> BoxFuture<'static, CacheResult<T>>,
    {
        let (outcome, leader) = match self.flights.entry(key.to_string()) {
            Entry::Occupied(entry) => (entry.get().outcome.clone(), false),
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let flights = Arc::clone(&self.flights);
                let owned_key = key.to_string();
                let work = load();
                let task = tokio::spawn(async move {
                    let result = work.await;
                    flights.remove_if(&owned_key, |_, flight| flight.id == id);
                    result
                });
                let outcome = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(e) => {
                            Err(CacheError::upstream("coalesced load did not complete").with_cause(e))
                        }
                    }
                }
                .boxed()
                .shared();
                entry.insert(Flight {
                    id,
                    outcome: outcome.clone(),
                });
                (outcome, true)
            }
        };

        if !leader {
            tracing::debug!(key = %key, "joined in-flight load");
        }
        (ctx.run("waiting for coalesced load", outcome).await, leader)
    }
}
