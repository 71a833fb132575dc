pub mod ytdlp;

use std::time::Duration;

use async_trait::async_trait;
use serenity::model::id::UserId;
use thiserror::Error;

pub use ytdlp::YtDlpResolver;

/// Errores del extractor al resolver metadata o streams
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("sin resultados para: {0}")]
    NoResults(String),

    #[error("URL mal formada: {0}")]
    InvalidUrl(String),

    #[error("el extractor falló: {0}")]
    Extractor(String),

    #[error("respuesta del extractor inválida: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no se pudo ejecutar el extractor: {0}")]
    Io(#[from] std::io::Error),
}

/// Resuelve búsquedas del usuario a tracks reproducibles.
///
/// `resolve_metadata` no descarga nada: produce un descriptor diferido con
/// título y URL web. `resolve_stream` obtiene la URL de audio directa justo
/// antes de reproducir, porque esas URLs expiran si se piden temprano.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve_metadata(
        &self,
        query: &str,
        requested_by: UserId,
    ) -> Result<TrackSource, SourceError>;

    async fn resolve_stream(&self, track: &TrackSource) -> Result<TrackSource, SourceError>;
}

/// Representa un track de música
#[derive(Debug, Clone)]
pub struct TrackSource {
    title: String,
    artist: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    url: String,
    stream_url: Option<String>,
    requested_by: UserId,
}

impl TrackSource {
    pub fn new(title: String, url: String, requested_by: UserId) -> Self {
        Self {
            title,
            artist: None,
            duration: None,
            thumbnail: None,
            url,
            stream_url: None,
            requested_by,
        }
    }

    // Getters
    pub fn title(&self) -> String {
        self.title.clone()
    }
    pub fn artist(&self) -> Option<String> {
        self.artist.clone()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<String> {
        self.thumbnail.clone()
    }
    pub fn url(&self) -> String {
        self.url.clone()
    }
    pub fn stream_url(&self) -> Option<String> {
        self.stream_url.clone()
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    /// `true` una vez que hay un stream reproducible, no solo metadata
    pub fn is_resolved(&self) -> bool {
        self.stream_url.is_some()
    }

    // Setters
    pub fn with_artist(mut self, artist: String) -> Self {
        self.artist = Some(artist);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    pub fn with_stream_url(mut self, stream_url: String) -> Self {
        self.stream_url = Some(stream_url);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deferred_track_is_not_resolved() {
        let track = TrackSource::new(
            "Prueba".into(),
            "https://www.youtube.com/watch?v=abc".into(),
            UserId::new(1),
        );
        assert!(!track.is_resolved());

        let resolved = track.with_stream_url("https://audio.example/abc".into());
        assert!(resolved.is_resolved());
        assert_eq!(resolved.title(), "Prueba");
    }
}
