use thiserror::Error;

/// Categoría de un fallo, usada para decidir cómo se reporta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// La búsqueda o la resolución no devolvió nada utilizable
    Resolution,
    /// La plataforma negó una acción (p. ej. borrar un mensaje)
    Permission,
    /// Estado del reproductor incompatible con la acción pedida
    State,
    /// Conexión de voz o reproducción fallida
    Transport,
}

/// Errores del núcleo de reproducción.
///
/// Ninguno de estos errores termina el proceso: todos se degradan a un
/// mensaje en el chat a través de [`PlaybackError::user_message`].
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no se encontraron resultados para `{0}`")]
    NothingFound(String),

    #[error("`{title}` dura {seconds}s, por encima del límite")]
    TooLong { title: String, seconds: u64 },

    #[error("fallo al resolver el track: {0:#}")]
    Resolution(#[source] anyhow::Error),

    #[error("permiso denegado: {0}")]
    Permission(String),

    #[error("no hay nada que repetir")]
    NothingToRepeat,

    #[error("no hay nada reproduciéndose")]
    NothingPlaying,

    #[error("el bot no está conectado a un canal de voz")]
    NotConnected,

    #[error("fallo de transporte de voz: {0}")]
    Transport(String),
}

impl PlaybackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NothingFound(_) | Self::TooLong { .. } | Self::Resolution(_) => {
                ErrorKind::Resolution
            }
            Self::Permission(_) => ErrorKind::Permission,
            Self::NothingToRepeat | Self::NothingPlaying => ErrorKind::State,
            Self::NotConnected | Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Texto que se muestra al usuario en el canal
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NothingFound(_) => "⚠️ Nothing found.",
            Self::TooLong { .. } | Self::Resolution(_) => "⚠️ Failed to load track.",
            Self::Permission(_) => "⚠️ I don't have permission to do that.",
            Self::NothingToRepeat => "⛔ There is nothing to repeat.",
            Self::NothingPlaying => "📭 Nothing is playing right now.",
            Self::NotConnected => "⚠️ I'm not connected to a voice channel.",
            Self::Transport(_) => "⚠️ Playback failed.",
        }
    }
}
