use thiserror::Error;

/// Errores de conexión y reproducción de voz
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("la conexión al canal de voz tardó demasiado")]
    ConnectionTimedOut,

    #[error("canal de voz inválido, únete a uno primero")]
    InvalidVoiceChannel,

    #[error("el track todavía no tiene un stream resuelto")]
    MissingStream,

    #[error("fallo del driver de voz: {0}")]
    Driver(String),
}
