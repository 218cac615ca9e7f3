//! Store behaviour under concurrent writers

use core_messages::{
    ContentFragment, InMemoryMessageStore, Message, MessageEvent, MessageId, MessageKind,
    MessageStore,
};
use std::sync::Arc;

fn message(id: &str, payload: &str) -> Message {
    Message::rich_media("conv", payload).with_id(id)
}

#[tokio::test]
async fn test_concurrent_updates_stay_scoped_to_their_message() {
    let store = Arc::new(InMemoryMessageStore::new());
    store
        .add_messages(vec![
            message("a", "https://youtu.be/aaa"),
            message("b", "https://youtu.be/bbb"),
        ])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for round in 0..20 {
        for id in ["a", "b"] {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .update_message(
                        &MessageId::from(id),
                        Box::new(move |mut m| {
                            m.content
                                .push(ContentFragment::text(format!("{}-{}", id, round)));
                            m
                        }),
                    )
                    .await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for id in ["a", "b"] {
        let stored = store.get_message(&id.into()).await.unwrap().unwrap();
        assert_eq!(stored.content.len(), 21);
        assert!(stored.content[1..]
            .iter()
            .all(|f| f.content.starts_with(&format!("{}-", id))));
    }
}

#[tokio::test]
async fn test_edit_flow_emits_previous_and_updated() {
    let store = InMemoryMessageStore::new();
    let original = message("m", "song https://soundcloud.com/a/b");
    store.add_messages(vec![original.clone()]).await.unwrap();
    let mut events = store.subscribe();

    store
        .update_message(
            &"m".into(),
            Box::new(|m| m.edited("song https://soundcloud.com/a/c")),
        )
        .await
        .unwrap();

    let MessageEvent::Updated(pairs) = events.recv().await.unwrap() else {
        panic!("expected update event");
    };
    let (previous, updated) = &pairs[0];
    assert_eq!(previous.content[1].content, "https://soundcloud.com/a/b");
    assert_eq!(updated.content[1].content, "https://soundcloud.com/a/c");
    assert_eq!(updated.kind, MessageKind::RichMedia);
    assert!(updated.edited_at.is_some());
}
