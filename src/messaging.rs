//! Publish/subscribe messaging between game objects.
//!
//! Producers publish a message; every handler subscribed to that message's
//! kind runs synchronously, in subscription order, on the publisher's
//! stack. Meant for occasional gameplay events ("ate a flag", "player
//! died"), not per-pixel traffic.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::error::{EngineError, Result};

/// A closed set of game messages, each carrying a kind tag used for routing.
///
/// ```
/// use arcade_engine::messaging::Message;
///
/// enum GameMessage {
///     AteFlag { count: u32 },
///     PlayerDied,
/// }
///
/// #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// enum GameMessageKind {
///     AteFlag,
///     PlayerDied,
/// }
///
/// impl Message for GameMessage {
///     type Kind = GameMessageKind;
///     fn kind(&self) -> GameMessageKind {
///         match self {
///             GameMessage::AteFlag { .. } => GameMessageKind::AteFlag,
///             GameMessage::PlayerDied => GameMessageKind::PlayerDied,
///         }
///     }
/// }
/// ```
pub trait Message: 'static {
    type Kind: Copy + Eq + Hash + Debug;

    fn kind(&self) -> Self::Kind;
}

/// Messages for games that never publish anything.
impl Message for () {
    type Kind = ();

    fn kind(&self) -> Self::Kind {}
}

/// Opaque handle returned by [`MessageBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<M> = Rc<dyn Fn(&M, &mut MessageBus<M>)>;

pub struct MessageBus<M: Message> {
    subscribers: HashMap<M::Kind, Vec<Handler<M>>>,
    next_id: u64,
}

impl<M: Message> Default for MessageBus<M> {
    fn default() -> Self {
        MessageBus {
            subscribers: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<M: Message> MessageBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every future message of `kind`.
    ///
    /// Handlers get the bus back, so they may publish follow-up messages
    /// (dispatched immediately, nested inside the current one) or add
    /// subscriptions, which take effect from the next publish.
    pub fn subscribe<F>(&mut self, kind: M::Kind, handler: F) -> SubscriptionId
    where
        F: Fn(&M, &mut MessageBus<M>) + 'static,
    {
        self.subscribers
            .entry(kind)
            .or_default()
            .push(Rc::new(handler));
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        debug!(?kind, ?id, "subscribed");
        id
    }

    /// Subscriptions are permanent; this always fails.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Result<()> {
        warn!(?id, "unsubscribe requested but not supported");
        Err(EngineError::UnsubscribeUnsupported)
    }

    /// Deliver `message` to everything subscribed to its kind. A kind with
    /// no subscribers is silently ignored.
    pub fn publish(&mut self, message: &M) {
        let kind = message.kind();
        // Snapshot the list so handlers are free to use the bus.
        let handlers: Vec<Handler<M>> = match self.subscribers.get(&kind) {
            Some(handlers) => handlers.clone(),
            None => return,
        };
        trace!(?kind, handlers = handlers.len(), "publishing");
        for handler in handlers {
            handler(message, self);
        }
    }

    pub fn subscriber_count(&self, kind: M::Kind) -> usize {
        self.subscribers.get(&kind).map_or(0, Vec::len)
    }
}
