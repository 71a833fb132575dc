//! Colaboradores falsos para los tests del player y el registro. Implementan
//! los mismos traits que las piezas reales de songbird/serenity y registran
//! cada efecto observable para poder afirmarlo.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::all::{ChannelId, GuildId, MessageId, UserId};
use songbird::Call;
use tokio::sync::Notify;

use crate::audio::backend::{MessageRef, Notifier, PlaybackSink, VoiceConnector};
use crate::error::VoiceError;
use crate::sources::{Resolver, SourceError, TrackSource};

pub fn deferred_track(title: &str) -> TrackSource {
    TrackSource::new(
        title.to_string(),
        format!("https://example.com/{title}"),
        UserId::new(7),
    )
}

pub fn resolved_track(title: &str) -> TrackSource {
    deferred_track(title).with_stream_url(format!("https://stream.test/{title}"))
}

/// Sink que anota qué arrancó y con qué volumen. En modo `auto_complete`
/// cada stream "termina" apenas arranca; en modo manual termina cuando el
/// test lo pide o cuando alguien lo detiene.
pub struct FakeSink {
    auto_complete: bool,
    started: Mutex<Vec<(String, f32)>>,
    done: Mutex<Option<Arc<Notify>>>,
    playing: AtomicBool,
    paused: AtomicBool,
}

impl FakeSink {
    pub fn auto_complete() -> Self {
        Self::with_mode(true)
    }

    pub fn manual() -> Self {
        Self::with_mode(false)
    }

    fn with_mode(auto_complete: bool) -> Self {
        Self {
            auto_complete,
            started: Mutex::new(Vec::new()),
            done: Mutex::new(None),
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }

    pub fn started(&self) -> Vec<(String, f32)> {
        self.started.lock().clone()
    }

    pub fn started_titles(&self) -> Vec<String> {
        self.started.lock().iter().map(|(title, _)| title.clone()).collect()
    }

    /// Simula el fin natural del stream en curso
    pub fn complete_current(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        if let Some(done) = self.done.lock().as_ref() {
            done.notify_one();
        }
    }
}

#[async_trait]
impl PlaybackSink for FakeSink {
    async fn start(
        &self,
        track: &TrackSource,
        volume: f32,
        done: Arc<Notify>,
    ) -> Result<(), VoiceError> {
        assert!(
            track.is_resolved(),
            "el sink recibió un descriptor sin resolver"
        );
        self.started.lock().push((track.title(), volume));
        *self.done.lock() = Some(Arc::clone(&done));
        self.playing.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);

        if self.auto_complete {
            done.notify_one();
        }
        Ok(())
    }

    async fn stop(&self) {
        self.complete_current();
    }

    async fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    async fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    async fn set_volume(&self, _volume: f32) {}

    async fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst) && !self.paused.load(Ordering::SeqCst)
    }

    async fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    async fn release(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        *self.done.lock() = None;
    }
}

/// Notifier que cuenta avisos en vez de hablar con Discord
#[derive(Default)]
pub struct FakeNotifier {
    now_playing: Mutex<Vec<String>>,
    failed: Mutex<Vec<String>>,
    deleted: Mutex<Vec<MessageRef>>,
    next_id: AtomicU64,
}

impl FakeNotifier {
    pub fn now_playing_count(&self) -> usize {
        self.now_playing.lock().len()
    }

    pub fn failed_titles(&self) -> Vec<String> {
        self.failed.lock().clone()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.lock().len()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn now_playing(&self, track: &TrackSource) -> Option<MessageRef> {
        self.now_playing.lock().push(track.title());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Some((ChannelId::new(1), MessageId::new(id)))
    }

    async fn resolve_failed(&self, track: &TrackSource, _reason: &str) {
        self.failed.lock().push(track.title());
    }

    async fn delete(&self, message: MessageRef) {
        self.deleted.lock().push(message);
    }
}

/// Resolver determinista: resuelve todo salvo los títulos marcados
#[derive(Default)]
pub struct FakeResolver {
    fail_titles: Vec<String>,
    stream_calls: AtomicUsize,
}

impl FakeResolver {
    pub fn failing_on(title: &str) -> Self {
        Self {
            fail_titles: vec![title.to_string()],
            stream_calls: AtomicUsize::new(0),
        }
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve_metadata(
        &self,
        query: &str,
        requested_by: UserId,
    ) -> Result<TrackSource, SourceError> {
        Ok(TrackSource::new(
            query.to_string(),
            format!("https://example.com/{query}"),
            requested_by,
        ))
    }

    async fn resolve_stream(&self, track: &TrackSource) -> Result<TrackSource, SourceError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_titles.contains(&track.title()) {
            return Err(SourceError::Extractor("fallo simulado".to_string()));
        }
        Ok(track
            .clone()
            .with_stream_url(format!("https://stream.test/{}", track.title())))
    }
}

/// Conector que cuenta desconexiones; en tests nunca hay driver real
#[derive(Default)]
pub struct FakeVoice {
    disconnects: AtomicUsize,
}

impl FakeVoice {
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnector for FakeVoice {
    async fn join(
        &self,
        _guild_id: GuildId,
        _channel_id: ChannelId,
    ) -> Result<Arc<tokio::sync::Mutex<Call>>, VoiceError> {
        Err(VoiceError::Driver("sin driver de voz en tests".to_string()))
    }

    async fn disconnect(&self, _guild_id: GuildId) -> Result<(), VoiceError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
