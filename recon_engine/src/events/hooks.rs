use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, ReceiptReconciledEvent};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub receipt_reconciled_producer: Vec<EventProducer<ReceiptReconciledEvent>>,
}

impl EventProducers {
    /// Hands `event` to every subscriber of reconciled receipts.
    pub async fn publish_receipt_reconciled(&self, event: ReceiptReconciledEvent) {
        for producer in &self.receipt_reconciled_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_receipt_reconciled: Option<EventHandler<ReceiptReconciledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_receipt_reconciled = hooks.on_receipt_reconciled.map(|f| EventHandler::new(buffer_size, f));
        Self { on_receipt_reconciled }
    }

    pub fn producers(&self) -> EventProducers {
        let receipt_reconciled_producer = self.on_receipt_reconciled.iter().map(|h| h.subscribe()).collect();
        EventProducers { receipt_reconciled_producer }
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_receipt_reconciled {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_receipt_reconciled: Option<Handler<ReceiptReconciledEvent>>,
}

impl EventHooks {
    pub fn on_receipt_reconciled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ReceiptReconciledEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_receipt_reconciled = Some(Arc::new(f));
        self
    }

    /// As [`Self::on_receipt_reconciled`], but `f` only hears about receipts matched by one of `strategies`, e.g.
    /// `["buyer_wallet"]` to review links that were made on the sender's address alone.
    pub fn on_receipt_reconciled_by<F>(&mut self, strategies: &[&str], f: F) -> &mut Self
    where F: (Fn(ReceiptReconciledEvent) -> HookFuture) + Send + Sync + 'static {
        let strategies = strategies.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        self.on_receipt_reconciled(move |ev| {
            if strategies.contains(&ev.strategy) {
                f(ev)
            } else {
                let skip: HookFuture = Box::pin(async {});
                skip
            }
        })
    }
}
