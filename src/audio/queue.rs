use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::sources::TrackSource;

/// Entrada de la cola con su momento de admisión
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub track: TrackSource,
    pub enqueued_at: DateTime<Utc>,
}

/// Cola FIFO de un guild.
///
/// Los productores (comandos) solo agregan al final y nunca bloquean; el loop
/// del player es el único consumidor y solo saca del frente. El orden de
/// admisión es el orden de reproducción.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: Mutex<VecDeque<QueueItem>>,
    notify: Notify,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final; sin límite de tamaño
    pub fn push(&self, track: TrackSource) {
        let mut items = self.items.lock();
        debug!("➕ En cola (posición {}): {}", items.len() + 1, track.title());
        items.push_back(QueueItem {
            track,
            enqueued_at: Utc::now(),
        });
        drop(items);

        self.notify.notify_one();
    }

    /// Espera el siguiente track hasta `timeout`.
    ///
    /// Devuelve `None` solo si la cola siguió vacía durante toda la ventana.
    pub async fn pop_wait(&self, timeout: Duration) -> Option<TrackSource> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(item) = self.items.lock().pop_front() {
                return Some(item.track);
            }

            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                // Un push puede ganarle al vencimiento por un instante
                return self.items.lock().pop_front().map(|item| item.track);
            }
        }
    }

    /// Copia de los próximos `n` sin removerlos, para mostrar el estado
    pub fn upcoming(&self, n: usize) -> Vec<QueueItem> {
        self.items.lock().iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::sync::Arc;

    fn track(title: &str) -> TrackSource {
        TrackSource::new(
            title.to_string(),
            format!("https://example.com/{title}"),
            UserId::new(7),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn pops_in_admission_order() {
        let queue = TrackQueue::new();
        queue.push(track("a"));
        queue.push(track("b"));
        queue.push(track("c"));

        let mut played = Vec::new();
        while let Some(t) = queue.pop_wait(Duration::from_millis(10)).await {
            played.push(t.title());
        }

        assert_eq!(played, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_queue_times_out() {
        let queue = TrackQueue::new();
        assert!(queue.pop_wait(Duration::from_secs(1)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_consumer_wakes_on_push() {
        let queue = Arc::new(TrackQueue::new());

        let producer = Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            producer.push(track("tardío"));
        });

        let popped = queue.pop_wait(Duration::from_secs(10)).await;
        assert_eq!(popped.map(|t| t.title()), Some("tardío".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn upcoming_is_a_snapshot() {
        let queue = TrackQueue::new();
        queue.push(track("a"));
        queue.push(track("b"));
        queue.push(track("c"));

        let preview: Vec<String> = queue
            .upcoming(2)
            .into_iter()
            .map(|item| item.track.title())
            .collect();

        assert_eq!(preview, vec!["a", "b"]);
        assert_eq!(queue.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_wakeup_does_not_shorten_the_wait() {
        let queue = TrackQueue::new();

        // Permiso almacenado sin consumidor esperando
        queue.push(track("a"));
        assert!(queue.pop_wait(Duration::from_millis(10)).await.is_some());

        // El permiso viejo no debe producir un track inexistente
        assert!(queue.pop_wait(Duration::from_millis(10)).await.is_none());
    }
}
