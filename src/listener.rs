//! Polls the integrator for documents sitting in a given status and hands each one to a
//! [`DocumentHandler`].
//!
//! Every [`Watch`] is polled on its own interval. The same document is delivered again on
//! every poll for as long as it stays in the watched status, so handlers normally move it
//! along (for example with [`IntegratorApi::set_document_status`]).

use std::time::Duration;

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use futures::future::{abortable, join_all, AbortHandle, Aborted};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{info, instrument, warn};

use crate::{
    api::IntegratorApi,
    models::{BatchType, Document, StatusDocument},
};

/// Documents in `status` belonging to batches of `batch_type`, fetched `limit` at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watch {
    pub status: StatusDocument,
    pub batch_type: BatchType,
    pub interval: Duration,
    pub limit: u32,
}

impl Watch {
    pub fn new(status: StatusDocument, batch_type: BatchType) -> Self {
        Self {
            status,
            batch_type,
            interval: Duration::from_secs(4),
            limit: 20,
        }
    }

    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

#[async_trait]
pub trait DocumentHandler: Send + Sync {
    /// Called once per watch before its first poll.
    async fn on_start(&self, _status: StatusDocument) {}

    async fn on_document(&self, status: StatusDocument, document: &Document);
}

pub struct Listener<A> {
    api: A,
    watches: Vec<Watch>,
}

impl<A: IntegratorApi> Listener<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            watches: Vec::new(),
        }
    }

    pub fn add_watch(&mut self, watch: Watch) -> &mut Self {
        self.watches.push(watch);
        self
    }

    pub fn watches(&self) -> &[Watch] {
        &self.watches
    }

    /// Fetches the first page of documents matching `watch`.
    pub async fn poll(&self, watch: &Watch) -> Result<Vec<Document>> {
        let page = self
            .api
            .get_documents_by_status_and_batch_type(watch.status, watch.batch_type, 1, watch.limit)
            .await?;
        Ok(page.documents)
    }

    /// Polls every watch until the returned future is dropped.
    ///
    /// A failed poll is logged and retried on the next tick.
    pub async fn run<H: DocumentHandler>(&self, handler: &H) -> Result<()> {
        ensure!(!self.watches.is_empty(), "listener has no watches");
        for watch in &self.watches {
            ensure!(
                !watch.interval.is_zero(),
                "poll interval for {} must be greater than zero",
                watch.status
            );
        }

        join_all(self.watches.iter().map(|watch| self.watch(watch, handler))).await;
        Ok(())
    }

    #[instrument(skip_all, fields(status = %watch.status, batch_type = %watch.batch_type))]
    async fn watch<H: DocumentHandler>(&self, watch: &Watch, handler: &H) {
        handler.on_start(watch.status).await;
        info!("listener started");

        let mut ticker = interval(watch.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.poll(watch).await {
                Ok(documents) => {
                    for document in &documents {
                        handler.on_document(watch.status, document).await;
                    }
                }
                Err(e) => warn!("listener poll failed: {e:#}"),
            }
        }
    }
}

impl<A: IntegratorApi + 'static> Listener<A> {
    /// Runs the listener on a tokio task.
    pub fn spawn<H: DocumentHandler + 'static>(self, handler: H) -> ListenerHandle {
        let (fut, abort_handle) = abortable(async move { self.run(&handler).await });
        ListenerHandle {
            abort_handle,
            task: tokio::spawn(fut),
        }
    }
}

/// A running listener. Dropping the handle leaves the listener running.
pub struct ListenerHandle {
    abort_handle: AbortHandle,
    task: JoinHandle<std::result::Result<Result<()>, Aborted>>,
}

impl ListenerHandle {
    pub fn stop(&self) {
        self.abort_handle.abort();
    }

    /// Waits for the listener to end. A stopped listener ends with `Ok(())`.
    pub async fn wait(self) -> Result<()> {
        match self.task.await.context("listener task panicked")? {
            Ok(result) => result,
            Err(Aborted) => Ok(()),
        }
    }
}
