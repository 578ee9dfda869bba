//! In-process point-to-point queues.

use std::{
    collections::VecDeque,
    pin::pin,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::{sync::Notify, time::Instant};

use super::{MessageId, OutboundMessage, QueueTransport, RawMessage, TransportError};

/// Operation made to fail once by [`MemoryTransport::inject_fault`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The next `send` fails.
    Send,
    /// The next `receive` fails before taking a message.
    Receive,
    /// The next `acknowledge` fails.
    Acknowledge,
}

struct Queued {
    message: RawMessage,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct MemoryQueue {
    messages: Mutex<VecDeque<Queued>>,
    notify: Notify,
}

impl MemoryQueue {
    fn push(&self, queued: Queued) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push_back(queued);
        }
        self.notify.notify_waiters();
    }

    fn pop(&self, correlation_id: Option<&str>) -> Option<RawMessage> {
        let mut messages = self.messages.lock().ok()?;
        let now = Instant::now();
        messages.retain(|queued| queued.expires_at.is_none_or(|at| at > now));
        let index = messages.iter().position(|queued| {
            correlation_id.is_none_or(|id| queued.message.correlation_id() == Some(id))
        })?;
        messages.remove(index).map(|queued| queued.message)
    }

    fn len(&self) -> usize { self.messages.lock().map(|m| m.len()).unwrap_or_default() }

    async fn wait_for(&self, correlation_id: Option<&str>) -> RawMessage {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            if let Some(message) = self.pop(correlation_id) {
                return message;
            }
            notified.await;
        }
    }
}

/// [`QueueTransport`] keeping every queue in memory.
///
/// Receivers waiting on a queue are woken on each send. Messages whose time to
/// live has elapsed are discarded when a receiver next inspects the queue.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use bytes::Bytes;
/// use mqframe::transport::{MemoryTransport, OutboundMessage, QueueTransport};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), mqframe::transport::TransportError> {
/// let transport = MemoryTransport::new().with_queue("REQ");
/// let id = transport
///     .send(OutboundMessage::new("REQ", Bytes::from_static(b"ping")))
///     .await?;
/// let received = transport
///     .receive("REQ", None, Some(Duration::from_millis(10)))
///     .await?
///     .expect("message waiting");
/// assert_eq!(received.message_id(), id);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MemoryTransport {
    queues: DashMap<String, Arc<MemoryQueue>>,
    next_id: AtomicU64,
    auto_create: bool,
    fail_send: AtomicBool,
    fail_receive: AtomicBool,
    fail_acknowledge: AtomicBool,
}

impl MemoryTransport {
    /// Create a transport with no queues; unknown queues are an error.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create a transport that creates queues on first use.
    #[must_use]
    pub fn auto_create() -> Self {
        Self {
            auto_create: true,
            ..Self::default()
        }
    }

    /// Builder-style variant of [`MemoryTransport::create_queue`].
    #[must_use]
    pub fn with_queue(self, name: &str) -> Self {
        self.create_queue(name);
        self
    }

    /// Create `name` if it does not exist yet.
    pub fn create_queue(&self, name: &str) { self.queues.entry(name.to_owned()).or_default(); }

    /// Number of messages waiting on `queue`, expired ones included.
    #[must_use]
    pub fn depth(&self, queue: &str) -> usize { self.queues.get(queue).map_or(0, |q| q.len()) }

    /// Make the next call of the given kind fail.
    pub fn inject_fault(&self, fault: Fault) {
        let flag = match fault {
            Fault::Send => &self.fail_send,
            Fault::Receive => &self.fail_receive,
            Fault::Acknowledge => &self.fail_acknowledge,
        };
        flag.store(true, Ordering::SeqCst);
    }

    fn queue(&self, name: &str) -> Result<Arc<MemoryQueue>, TransportError> {
        if let Some(queue) = self.queues.get(name) {
            return Ok(Arc::clone(queue.value()));
        }
        if !self.auto_create {
            return Err(TransportError::UnknownQueue(name.to_owned()));
        }
        Ok(Arc::clone(self.queues.entry(name.to_owned()).or_default().value()))
    }

    fn fault(flag: &AtomicBool, operation: &str) -> Result<(), TransportError> {
        if flag.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Failure(format!("injected {operation} fault")));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueTransport for MemoryTransport {
    async fn send(&self, message: OutboundMessage) -> Result<MessageId, TransportError> {
        Self::fault(&self.fail_send, "send")?;
        let queue = self.queue(&message.destination)?;
        let id = format!("ID:{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let expires_at = message.time_to_live.map(|ttl| Instant::now() + ttl);
        let raw = RawMessage::new(id.clone(), message.destination, message.body)
            .with_correlation_id(message.correlation_id)
            .with_reply_to(message.reply_to)
            .with_time_to_live(message.time_to_live);
        log::trace!("enqueued message {id} on {}", raw.destination());
        queue.push(Queued {
            message: raw,
            expires_at,
        });
        Ok(id)
    }

    async fn receive(
        &self,
        queue: &str,
        correlation_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Option<RawMessage>, TransportError> {
        Self::fault(&self.fail_receive, "receive")?;
        let queue = self.queue(queue)?;
        let wait = queue.wait_for(correlation_id);
        match timeout {
            Some(limit) => Ok(tokio::time::timeout(limit, wait).await.ok()),
            None => Ok(Some(wait.await)),
        }
    }

    async fn acknowledge(&self, _message: &RawMessage) -> Result<(), TransportError> {
        Self::fault(&self.fail_acknowledge, "acknowledge")
    }
}
