//! Stateless pub-sub for engine events.
//!
//! Components subscribe to engine events through hooks. A hook only sees the event itself, never the engine's internal
//! state. Hooks are async and each event is handled on its own tokio task, so a slow hook never holds up
//! reconciliation.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinHandle};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight hooks to finish.
    pub async fn start_handler(mut self) {
        debug!("🪝️ Starting event handler");
        // Once the last producer goes away, recv() returns None and the loop ends
        drop(self.sender);
        let mut jobs: Vec<JoinHandle<()>> = Vec::new();
        while let Some(ev) = self.listener.recv().await {
            trace!("🪝️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.retain(|j| !j.is_finished());
            jobs.push(tokio::spawn(async move { (handler)(ev).await }));
        }
        debug!("🪝️ All producers have gone away. Waiting for {} hook(s) to complete", jobs.len());
        for job in jobs {
            if let Err(e) = job.await {
                warn!("🪝️ An event hook did not complete cleanly. {e}");
            }
        }
        debug!("🪝️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("🪝️ Failed to publish event: {e}");
        }
    }
}
