use std::sync::Arc;

use {
    courier_channels::{EndUser, Messenger, TopicHandle},
    courier_store::LinkStore,
    tracing::info,
};

use crate::{Result, header::topic_name};

/// Lazily opens one operator topic per client.
///
/// Two first messages from the same client racing through here can both see
/// no binding and open two topics. The later `save_topic` wins and the other
/// topic is left orphaned.
pub struct TopicResolver {
    store: Arc<dyn LinkStore>,
    messenger: Arc<dyn Messenger>,
    max_name_len: usize,
}

impl TopicResolver {
    pub fn new(store: Arc<dyn LinkStore>, messenger: Arc<dyn Messenger>, max_name_len: usize) -> Self {
        Self {
            store,
            messenger,
            max_name_len,
        }
    }

    /// Return the client's topic, creating it on first use. Creation errors
    /// are returned as-is and not retried.
    pub async fn ensure_topic(&self, user: &EndUser) -> Result<TopicHandle> {
        if let Some(topic) = self.store.topic_for_user(user.id).await? {
            return Ok(topic);
        }

        let name = topic_name(user, self.max_name_len);
        let topic = self.messenger.create_topic(&name).await?;
        self.store.save_topic(user.id, topic).await?;
        info!(user_id = %user.id, topic_id = %topic, name = %name, "opened operator topic");
        Ok(topic)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        courier_channels::{UserId, recording::RecordingMessenger},
        courier_store::InMemoryLinkStore,
    };

    fn user(id: i64) -> EndUser {
        EndUser {
            id: UserId(id),
            display_name: "Ann".into(),
            username: None,
        }
    }

    fn resolver() -> (Arc<InMemoryLinkStore>, Arc<RecordingMessenger>, TopicResolver) {
        let store = Arc::new(InMemoryLinkStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let resolver = TopicResolver::new(store.clone(), messenger.clone(), 128);
        (store, messenger, resolver)
    }

    #[tokio::test]
    async fn creates_once_then_reuses() {
        let (store, messenger, resolver) = resolver();
        let first = resolver.ensure_topic(&user(1)).await.unwrap();
        let second = resolver.ensure_topic(&user(1)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(messenger.topics(), vec![(first, "Ann · 1".to_string())]);
        assert_eq!(store.topic_for_user(UserId(1)).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn creation_failure_is_returned_and_not_persisted() {
        let (store, messenger, resolver) = resolver();
        messenger.fail_topic_creation(true);

        assert!(resolver.ensure_topic(&user(1)).await.is_err());
        assert_eq!(store.topic_for_user(UserId(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_first_calls_may_open_two_topics() {
        let (store, messenger, resolver) = resolver();
        let client = user(5);

        let (a, b) = tokio::join!(resolver.ensure_topic(&client), resolver.ensure_topic(&client));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a, b);
        assert_eq!(messenger.topics().len(), 2);
        let bound = store.topic_for_user(UserId(5)).await.unwrap().unwrap();
        assert!(bound == a || bound == b);
        assert_eq!(resolver.ensure_topic(&client).await.unwrap(), bound);
        assert_eq!(messenger.topics().len(), 2);
    }
}
