use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::hn_client::SearchTransport;
use crate::query_cache::{FetchOutcome, FetchRequest};

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Runs each fetch on its own thread and queues the outcomes for the UI
/// thread to pick up. There is no cancellation; outcomes nobody wants are
/// filtered out by the query cache.
pub struct Fetcher {
    transport: Arc<dyn SearchTransport>,
    tx: Sender<FetchOutcome>,
    rx: Receiver<FetchOutcome>,
    waker: Option<Waker>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn SearchTransport>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            transport,
            tx,
            rx,
            waker: None,
        }
    }

    /// Called from the worker thread after each outcome is queued.
    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Some(Arc::new(waker));
        self
    }

    pub fn spawn(&self, request: FetchRequest) {
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        let waker = self.waker.clone();

        thread::spawn(move || {
            let result = transport.search(&request.term, request.page);
            let id = request.id;
            if tx.send(FetchOutcome { request, result }).is_err() {
                // Receiver is gone once the app has shut down
                debug!(id, "fetch finished after the receiver was dropped");
                return;
            }
            if let Some(waker) = waker {
                waker();
            }
        });
    }

    /// Every outcome that has arrived so far, in arrival order.
    pub fn poll(&self) -> Vec<FetchOutcome> {
        // Never disconnects: `self.tx` keeps the channel open
        self.rx.try_iter().collect()
    }

    #[cfg(test)]
    fn wait(&self, timeout: std::time::Duration) -> Option<FetchOutcome> {
        self.rx.recv_timeout(timeout).ok()
    }
}
