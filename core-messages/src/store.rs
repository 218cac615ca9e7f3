//! Message store contract and in-memory implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, trace};

use crate::error::{MessageStoreError, Result};
use crate::models::{ContentFragment, Message, MessageId};

/// Default capacity of the mutation event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Rewrites the content of one message; applied to every message of a batch.
pub type ContentTransform = Box<dyn Fn(&[ContentFragment]) -> Vec<ContentFragment> + Send + Sync>;

/// Produces the next version of a single message from its current state.
pub type MessageTransform = Box<dyn FnOnce(Message) -> Message + Send>;

/// Store mutation notifications
#[derive(Debug, Clone)]
pub enum MessageEvent {
    /// New messages were inserted
    Added(Vec<Message>),
    /// Existing messages changed; `(previous, updated)` pairs
    Updated(Vec<(Message, Message)>),
}

/// Message store interface used by the rich-media sync core
///
/// The store is the single source of truth for message content. Every
/// write goes through a transform applied to the current state inside the
/// store, and every successful write is announced on [`subscribe`].
/// Delivery is at least once; subscribers must tolerate duplicates.
///
/// [`subscribe`]: MessageStore::subscribe
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Find a message by its ID
    ///
    /// # Returns
    /// - `Ok(Some(message))` if found
    /// - `Ok(None)` if not found
    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>>;

    /// Apply `transform` to the content of every listed message as one
    /// atomic batch.
    ///
    /// Unknown ids are skipped. Returns the updated messages.
    async fn update_all_content(
        &self,
        ids: &[MessageId],
        transform: ContentTransform,
    ) -> Result<Vec<Message>>;

    /// Replace one message with the result of `transform`.
    ///
    /// # Returns
    /// - `Ok(Some(updated))` when the message existed
    /// - `Ok(None)` when it did not; `transform` is not called
    async fn update_message(
        &self,
        id: &MessageId,
        transform: MessageTransform,
    ) -> Result<Option<Message>>;

    /// Ids of messages with at least one fragment awaiting sync
    async fn list_pending_sync(&self) -> Result<Vec<MessageId>>;

    /// Subscribe to mutation events
    fn subscribe(&self) -> broadcast::Receiver<MessageEvent>;
}

#[derive(Default)]
struct Inner {
    messages: HashMap<MessageId, Message>,
    /// Insertion order
    order: Vec<MessageId>,
}

/// In-memory message store
///
/// Used by desktop builds and tests. Writes are serialized by a single
/// `RwLock`; events are emitted after the lock is released.
pub struct InMemoryMessageStore {
    inner: RwLock<Inner>,
    events: broadcast::Sender<MessageEvent>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    /// Insert new messages and announce them with [`MessageEvent::Added`].
    ///
    /// # Errors
    ///
    /// Returns [`MessageStoreError::Duplicate`] if any id already exists;
    /// nothing is inserted in that case.
    pub async fn add_messages(&self, messages: Vec<Message>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        {
            let mut inner = self.inner.write().await;
            let mut seen = std::collections::HashSet::new();
            for message in &messages {
                if inner.messages.contains_key(&message.id) || !seen.insert(&message.id) {
                    return Err(MessageStoreError::Duplicate(message.id.to_string()));
                }
            }

            for message in &messages {
                inner.order.push(message.id.clone());
                inner.messages.insert(message.id.clone(), message.clone());
            }
        }

        debug!(count = messages.len(), "Messages added");
        self.emit(MessageEvent::Added(messages));
        Ok(())
    }

    /// Remove a message. No event is emitted.
    pub async fn remove_message(&self, id: &MessageId) -> Option<Message> {
        let mut inner = self.inner.write().await;
        let removed = inner.messages.remove(id);
        if removed.is_some() {
            inner.order.retain(|existing| existing != id);
        }
        removed
    }

    /// All messages in insertion order
    pub async fn all_messages(&self) -> Vec<Message> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.messages.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn emit(&self, event: MessageEvent) {
        // No subscribers is fine
        if self.events.send(event).is_err() {
            trace!("No message event subscribers");
        }
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryMessageStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryMessageStore")
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        Ok(self.inner.read().await.messages.get(id).cloned())
    }

    async fn update_all_content(
        &self,
        ids: &[MessageId],
        transform: ContentTransform,
    ) -> Result<Vec<Message>> {
        let mut changes = Vec::with_capacity(ids.len());

        {
            let mut inner = self.inner.write().await;
            for id in ids {
                let Some(message) = inner.messages.get_mut(id) else {
                    debug!(message_id = %id, "Skipping unknown message in batch update");
                    continue;
                };

                let previous = message.clone();
                message.content = transform(&previous.content);
                changes.push((previous, message.clone()));
            }
        }

        let updated: Vec<Message> = changes.iter().map(|(_, next)| next.clone()).collect();
        if !changes.is_empty() {
            self.emit(MessageEvent::Updated(changes));
        }

        Ok(updated)
    }

    async fn update_message(
        &self,
        id: &MessageId,
        transform: MessageTransform,
    ) -> Result<Option<Message>> {
        let change = {
            let mut inner = self.inner.write().await;
            let Some(slot) = inner.messages.get_mut(id) else {
                return Ok(None);
            };

            let previous = slot.clone();
            let mut next = transform(previous.clone());
            if next.id != previous.id {
                return Err(MessageStoreError::InvalidInput {
                    field: "id".to_string(),
                    message: format!("transform changed id {} to {}", previous.id, next.id),
                });
            }
            next.created_at = previous.created_at;
            *slot = next.clone();
            (previous, next)
        };

        let updated = change.1.clone();
        self.emit(MessageEvent::Updated(vec![change]));
        Ok(Some(updated))
    }

    async fn list_pending_sync(&self) -> Result<Vec<MessageId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter(|id| {
                inner
                    .messages
                    .get(*id)
                    .is_some_and(|message| message.has_pending_sync())
            })
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FragmentKind, MediaProvider, MessageKind};

    fn youtube_message(id: &str) -> Message {
        Message::new(
            "conv-1",
            MessageKind::RichMedia,
            vec![ContentFragment::new(FragmentKind::YouTube, "id1")],
        )
        .with_id(id)
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let store = InMemoryMessageStore::new();
        let mut events = store.subscribe();

        store
            .add_messages(vec![youtube_message("m-1"), youtube_message("m-2")])
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        let found = store.get_message(&"m-1".into()).await.unwrap().unwrap();
        assert_eq!(found.content[0].content, "id1");
        assert!(store.get_message(&"nope".into()).await.unwrap().is_none());

        match events.recv().await.unwrap() {
            MessageEvent::Added(messages) => assert_eq!(messages.len(), 2),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_rejected_atomically() {
        let store = InMemoryMessageStore::new();
        store.add_messages(vec![youtube_message("m-1")]).await.unwrap();

        let err = store
            .add_messages(vec![youtube_message("m-2"), youtube_message("m-1")])
            .await
            .unwrap_err();

        assert_eq!(err, MessageStoreError::Duplicate("m-1".to_string()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_all_content_skips_unknown() {
        let store = InMemoryMessageStore::new();
        store
            .add_messages(vec![youtube_message("m-1"), youtube_message("m-2")])
            .await
            .unwrap();
        let mut events = store.subscribe();

        let updated = store
            .update_all_content(
                &["m-1".into(), "missing".into(), "m-2".into()],
                Box::new(|content: &[ContentFragment]| {
                    content
                        .iter()
                        .cloned()
                        .map(|f| f.with_sync_needed(true))
                        .collect()
                }),
            )
            .await
            .unwrap();

        assert_eq!(updated.len(), 2);
        assert_eq!(store.list_pending_sync().await.unwrap().len(), 2);

        match events.recv().await.unwrap() {
            MessageEvent::Updated(pairs) => {
                assert_eq!(pairs.len(), 2);
                assert!(!pairs[0].0.content[0].sync_needed);
                assert!(pairs[0].1.content[0].sync_needed);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_message() {
        let store = InMemoryMessageStore::new();
        store.add_messages(vec![youtube_message("m-1")]).await.unwrap();

        let updated = store
            .update_message(
                &"m-1".into(),
                Box::new(|mut message| {
                    message.content.push(ContentFragment::media(
                        MediaProvider::Spotify,
                        "spotify:track:1",
                    ));
                    message
                }),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.content.len(), 2);
        assert_eq!(
            store.list_pending_sync().await.unwrap(),
            vec![MessageId::from("m-1")]
        );
    }

    #[tokio::test]
    async fn test_update_missing_message_is_none() {
        let store = InMemoryMessageStore::new();
        let mut events = store.subscribe();

        let result = store
            .update_message(
                &"ghost".into(),
                Box::new(|_| panic!("transform must not run")),
            )
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_rejects_id_change() {
        let store = InMemoryMessageStore::new();
        store.add_messages(vec![youtube_message("m-1")]).await.unwrap();

        let err = store
            .update_message(&"m-1".into(), Box::new(|m| m.with_id("m-2")))
            .await
            .unwrap_err();

        assert!(matches!(err, MessageStoreError::InvalidInput { .. }));
        assert!(store.get_message(&"m-1".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_message() {
        let store = InMemoryMessageStore::new();
        store.add_messages(vec![youtube_message("m-1")]).await.unwrap();

        assert!(store.remove_message(&"m-1".into()).await.is_some());
        assert!(store.is_empty().await);
        assert!(store.all_messages().await.is_empty());
    }
}
