use std::fmt;

use async_trait::async_trait;
use scenevault_model::Event;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;

use crate::error::CoreResult;

/// Cross-cutting lifecycle event bus. At-most-once, per-subscriber FIFO
/// delivery with no replay; a lagging subscriber drops events rather than
/// blocking producers.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: Event) -> CoreResult<()>;

    /// Returns a fresh subscription; events published before this call are
    /// never delivered.
    fn subscribe(&self) -> EventSubscription;
}

pub struct InProcEventBus {
    sender: broadcast::Sender<Event>,
    capacity: usize,
}

impl fmt::Debug for InProcEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl InProcEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }
}

impl Default for InProcEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventBus for InProcEventBus {
    async fn publish(&self, event: Event) -> CoreResult<()> {
        // A publish with zero subscribers is not an error — producers never
        // block on, or care about, whether anyone is listening.
        let _ = self.sender.send(event);
        Ok(())
    }

    fn subscribe(&self) -> EventSubscription {
        EventSubscription::new(self.sender.subscribe())
    }
}

/// Per-subscriber stream of events. Wraps `BroadcastStream` and turns a
/// `Lagged` error into a transparent gap: the subscriber keeps receiving
/// subsequent events rather than seeing the stream terminate: a subscriber
/// whose buffer overflows sees a gap but never a rewind.
pub struct EventSubscription {
    inner: BroadcastStream<Event>,
}

impl EventSubscription {
    fn new(receiver: broadcast::Receiver<Event>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }

    /// Pull the next event, silently skipping any lag gap. Returns `None`
    /// only once the underlying bus (and every sender) has been dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        use futures::StreamExt;
        loop {
            match self.inner.next().await {
                Some(Ok(event)) => return Some(event),
                Some(Err(BroadcastStreamRecvError::Lagged(_))) => continue,
                None => return None,
            }
        }
    }
}

impl Stream for EventSubscription {
    type Item = Event;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;
        loop {
            match std::pin::Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(_)))) => continue,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenevault_model::EventPayload;
    use scenevault_model::SceneId;

    fn scene_event(id: i64) -> Event {
        Event::new(
            chrono::Utc::now(),
            EventPayload::SceneAdded {
                scene_id: SceneId(id),
            },
        )
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = InProcEventBus::new(8);
        bus.publish(scene_event(1)).await.unwrap();
    }

    #[tokio::test]
    async fn subscriber_receives_fifo() {
        let bus = InProcEventBus::new(8);
        let mut sub = bus.subscribe();
        bus.publish(scene_event(1)).await.unwrap();
        bus.publish(scene_event(2)).await.unwrap();

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        match (first.payload, second.payload) {
            (EventPayload::SceneAdded { scene_id: a }, EventPayload::SceneAdded { scene_id: b }) => {
                assert_eq!(a, SceneId(1));
                assert_eq!(b, SceneId(2));
            }
            _ => panic!("unexpected payload"),
        }
    }

    #[tokio::test]
    async fn slow_subscriber_sees_gap_not_termination() {
        let bus = InProcEventBus::new(2);
        let mut sub = bus.subscribe();
        for i in 0..10 {
            bus.publish(scene_event(i)).await.unwrap();
        }
        // The subscriber lagged behind the small buffer but must still be
        // able to receive subsequent events instead of observing `None`.
        let event = sub.recv().await;
        assert!(event.is_some());
    }
}
