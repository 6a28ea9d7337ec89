//! Optimistic read-modify-write transactions
//!
//! A transaction reads the current document and its version, lets the caller
//! decide what to write, and writes only if the version is unchanged. On a
//! version conflict it backs off (exponential, with jitter) and starts over,
//! up to a bounded number of attempts.
//!
//! [`run`](TransactionRunner::run) merges a patch and creates missing
//! documents. [`replace`](TransactionRunner::replace) and
//! [`remove`](TransactionRunner::remove) require the document to exist and
//! hand the caller exactly the version they overwrite or delete.

use super::{merge_json, Collection, Document, DocumentStore};
use crate::config::StoreConfig;
use crate::error::{ServiceError, StoreError};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Write issued at the end of one attempt
enum Commit {
    Put(Value),
    Delete,
}

/// Runs optimistic transactions against a [`DocumentStore`]
#[derive(Clone)]
pub struct TransactionRunner {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
    base_delay: Duration,
}

impl TransactionRunner {
    pub fn new(store: Arc<dyn DocumentStore>, config: &StoreConfig) -> Self {
        Self {
            store,
            max_attempts: config.max_transaction_attempts.max(1),
            base_delay: config.base_retry_delay(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Atomically update `collection/id`
    ///
    /// `mutation` receives the current document (if any) and returns a merge
    /// patch plus a value handed back to the caller. It may run several
    /// times and must not have side effects outside its return value.
    pub async fn run<T, F>(
        &self,
        collection: Collection,
        id: &str,
        mut mutation: F,
    ) -> Result<T, ServiceError>
    where
        F: FnMut(Option<&Document>) -> Result<(Value, T), ServiceError> + Send,
        T: Send,
    {
        self.commit_loop(collection, id, |current| {
            let (patch, output) = mutation(current)?;
            let data = match current {
                Some(doc) => {
                    let mut data = doc.data.clone();
                    merge_json(&mut data, patch);
                    data
                }
                None => patch,
            };
            Ok((Commit::Put(data), output))
        })
        .await
    }

    /// Overwrite an existing document with the data `mutation` builds from it
    pub async fn replace<T, F>(
        &self,
        collection: Collection,
        id: &str,
        mut mutation: F,
    ) -> Result<T, ServiceError>
    where
        F: FnMut(&Document) -> Result<(Value, T), ServiceError> + Send,
        T: Send,
    {
        self.commit_loop(collection, id, |current| match current {
            Some(doc) => mutation(doc).map(|(data, output)| (Commit::Put(data), output)),
            None => Err(StoreError::not_found(collection, id).into()),
        })
        .await
    }

    /// Delete an existing document, provided it did not change after `inspect` saw it
    pub async fn remove<T, F>(
        &self,
        collection: Collection,
        id: &str,
        mut inspect: F,
    ) -> Result<T, ServiceError>
    where
        F: FnMut(&Document) -> Result<T, ServiceError> + Send,
        T: Send,
    {
        self.commit_loop(collection, id, |current| match current {
            Some(doc) => inspect(doc).map(|output| (Commit::Delete, output)),
            None => Err(StoreError::not_found(collection, id).into()),
        })
        .await
    }

    async fn commit_loop<T, F>(
        &self,
        collection: Collection,
        id: &str,
        mut step: F,
    ) -> Result<T, ServiceError>
    where
        F: FnMut(Option<&Document>) -> Result<(Commit, T), ServiceError> + Send,
        T: Send,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let current = self.store.get(collection, id).await?;
            let (commit, output) = step(current.as_ref())?;
            let expected = current.map(|doc| doc.version);

            let written = match commit {
                Commit::Put(data) => self
                    .store
                    .put(collection, id, data, expected)
                    .await
                    .map(|_| ()),
                Commit::Delete => self.store.delete(collection, id, expected).await,
            };

            match written {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(%collection, id, attempt, "Transaction committed after retry");
                    }
                    return Ok(output);
                }
                Err(err) if err.is_conflict() => {
                    metrics::counter!(
                        "store_transaction_conflicts_total",
                        "collection" => collection.as_str()
                    )
                    .increment(1);

                    if attempt >= self.max_attempts {
                        metrics::counter!(
                            "store_transactions_failed_total",
                            "collection" => collection.as_str()
                        )
                        .increment(1);
                        warn!(
                            %collection,
                            id,
                            attempts = attempt,
                            "Transaction gave up after repeated conflicts"
                        );
                        return Err(ServiceError::TransactionFailed {
                            attempts: attempt,
                            source: err,
                        });
                    }

                    let delay = backoff_delay(self.base_delay, attempt);
                    debug!(
                        %collection,
                        id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transaction conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(store_failure(collection, id, err)),
            }
        }
    }
}

fn store_failure(collection: Collection, id: &str, err: StoreError) -> ServiceError {
    warn!(%collection, id, error = %err, "Transaction write failed");
    ServiceError::Store(err)
}

/// Random delay in `[0, base * 2^attempt]`
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let max_ms = base.saturating_mul(1u32 << attempt.min(10)).as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}
