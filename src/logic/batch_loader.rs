use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::LoadError;
use crate::logic::DesignAtVersionQuery;
use crate::model::{DesignAtVersion, DesignAtVersionId};
use crate::store::DesignAtVersionStore;

pub type LoadResult = Result<Option<DesignAtVersion>, LoadError>;

type Waiter = oneshot::Sender<LoadResult>;

/// Collects design-at-version lookups for one unit of work and answers them
/// all with a single join query when `dispatch` is called.
///
/// Lookups for the same identity share one entry in the batch. Identities
/// with no matching same-issue row resolve to `None`.
pub struct DesignAtVersionLoader<S: ?Sized> {
    store: Arc<S>,
    /// Waiters keyed by canonical identity
    pending: Mutex<HashMap<DesignAtVersionId, Vec<Waiter>>>,
    batches: AtomicUsize,
}

impl<S> DesignAtVersionLoader<S>
where
    S: DesignAtVersionStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            pending: Mutex::new(HashMap::new()),
            batches: AtomicUsize::new(0),
        }
    }

    /// Schedule a lookup; it resolves on the next `dispatch`
    pub fn load(&self, id: DesignAtVersionId) -> PendingLoad {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().entry(id).or_default().push(tx);
        PendingLoad {
            state: PendingState::Waiting(rx),
        }
    }

    /// Schedule a lookup by identity string. Malformed identities are
    /// answered immediately with `None` and never reach the batch.
    pub fn load_identity(&self, identity: &str) -> PendingLoad {
        match DesignAtVersionId::decode(identity) {
            Ok(id) => self.load(id),
            Err(e) => {
                debug!("Not scheduling lookup: {}", e);
                PendingLoad {
                    state: PendingState::Ready(None),
                }
            }
        }
    }

    /// Distinct identities waiting for the next dispatch
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of batches that reached the store
    pub fn batches_dispatched(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }

    /// Run one query for everything scheduled so far and fulfil every waiter.
    ///
    /// Returns the number of distinct identities queried. If the fetch fails,
    /// every waiter in the batch receives the same failure.
    pub async fn dispatch(&self) -> Result<usize, LoadError> {
        let batch = std::mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            return Ok(0);
        }

        let distinct = batch.len();
        let requested: usize = batch.values().map(Vec::len).sum();
        debug!(
            "Dispatching design-at-version batch: {} distinct of {} requested",
            distinct, requested
        );

        self.batches.fetch_add(1, Ordering::Relaxed);
        let query = DesignAtVersionQuery::new().for_ids(batch.keys().copied());

        match query.to_records(&*self.store).await {
            Ok(records) => {
                let mut found: HashMap<DesignAtVersionId, DesignAtVersion> =
                    records.into_iter().map(|dav| (dav.id, dav)).collect();
                debug!("Batch resolved {} of {} identities", found.len(), distinct);

                for (id, waiters) in batch {
                    let value = found.remove(&id);
                    for waiter in waiters {
                        // receiver dropped: nobody is waiting any more
                        let _ = waiter.send(Ok(value.clone()));
                    }
                }
                Ok(distinct)
            }
            Err(e) => {
                warn!("Design-at-version batch of {} failed: {:#}", distinct, e);
                let shared = Arc::new(e);
                for waiter in batch.into_values().flatten() {
                    let _ = waiter.send(Err(LoadError::Fetch(shared.clone())));
                }
                Err(LoadError::Fetch(shared))
            }
        }
    }

    /// Schedule every identity, dispatch once, and collect results in input order
    pub async fn resolve_all<I, T>(&self, identities: I) -> Result<Vec<Option<DesignAtVersion>>, LoadError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let pending: Vec<PendingLoad> = identities
            .into_iter()
            .map(|identity| self.load_identity(identity.as_ref()))
            .collect();

        self.dispatch().await?;

        let mut results = Vec::with_capacity(pending.len());
        for load in pending {
            results.push(load.await?);
        }
        Ok(results)
    }
}

enum PendingState {
    Ready(Option<DesignAtVersion>),
    Waiting(oneshot::Receiver<LoadResult>),
}

/// Handle to a scheduled lookup. Await it after the batch is dispatched.
pub struct PendingLoad {
    state: PendingState,
}

impl PendingLoad {
    pub async fn wait(self) -> LoadResult {
        match self.state {
            PendingState::Ready(value) => Ok(value),
            PendingState::Waiting(rx) => rx.await.unwrap_or(Err(LoadError::Cancelled)),
        }
    }
}

impl IntoFuture for PendingLoad {
    type Output = LoadResult;
    type IntoFuture = Pin<Box<dyn Future<Output = LoadResult> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
