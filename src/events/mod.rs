use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Domain notifications published after a quote-level operation commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    QuoteConfirmed {
        tenant_id: Uuid,
        quote_id: Uuid,
        event_id: Option<Uuid>,
    },
    QuoteDeleted {
        tenant_id: Uuid,
        quote_id: Uuid,
        was_accepted: bool,
    },
    /// A consume or release moved less than was asked for.
    LedgerShortfall {
        tenant_id: Uuid,
        item_id: Uuid,
        quote_id: Option<Uuid>,
        requested: i64,
        applied: i64,
    },
    EventPromoted {
        tenant_id: Uuid,
        event_id: Uuid,
        quote_id: Uuid,
        lines_copied: usize,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::QuoteConfirmed { .. } => "quote_confirmed",
            Event::QuoteDeleted { .. } => "quote_deleted",
            Event::LedgerShortfall { .. } => "ledger_shortfall",
            Event::EventPromoted { .. } => "event_promoted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishing is best effort; a closed channel never fails the caller.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "dropping domain event");
        }
    }
}

/// Background consumer for domain events.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!("gearhouse_events.processed", 1, "event" => event.name());

        match event {
            Event::QuoteConfirmed {
                tenant_id,
                quote_id,
                event_id,
            } => {
                info!(%tenant_id, %quote_id, ?event_id, "quote confirmed");
            }
            Event::QuoteDeleted {
                tenant_id,
                quote_id,
                was_accepted,
            } => {
                info!(%tenant_id, %quote_id, was_accepted, "quote deleted");
            }
            Event::LedgerShortfall {
                tenant_id,
                item_id,
                quote_id,
                requested,
                applied,
            } => {
                error!(
                    %tenant_id,
                    %item_id,
                    ?quote_id,
                    requested,
                    applied,
                    "ledger drift: see ledger_audit for reconciliation"
                );
            }
            Event::EventPromoted {
                tenant_id,
                event_id,
                quote_id,
                lines_copied,
            } => {
                info!(%tenant_id, %event_id, %quote_id, lines_copied, "quote promoted to event");
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let event = Event::QuoteDeleted {
            tenant_id: Uuid::new_v4(),
            quote_id: Uuid::new_v4(),
            was_accepted: true,
        };

        sender.send(event.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn send_or_log_tolerates_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender
            .send(Event::QuoteConfirmed {
                tenant_id: Uuid::new_v4(),
                quote_id: Uuid::new_v4(),
                event_id: None,
            })
            .await
            .is_err());
        sender
            .send_or_log(Event::QuoteConfirmed {
                tenant_id: Uuid::new_v4(),
                quote_id: Uuid::new_v4(),
                event_id: None,
            })
            .await;
    }
}
