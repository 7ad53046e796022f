//! Failures surfaced to the pages.
//!
//! Two things can go wrong: input is rejected before any call is made, or the
//! hosted service call fails. Everything except `Validation` is the latter.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Input rejected locally; the message is already user-facing.
    #[error("{0}")]
    Validation(String),

    #[error("Falha de rede: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    Service { status: u16, message: String },

    #[error("Resposta inválida do servidor: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Propriedade não encontrada.")]
    NotFound,

    #[error("Configuração ausente: {0}")]
    MissingConfiguration(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Message as shown in an error banner, e.g.
    /// "Erro ao salvar propriedade: <reason>". Validation and not-found
    /// messages are complete sentences and shown as they are.
    pub fn localized(&self, context: &str) -> String {
        match self {
            Self::Validation(_) | Self::NotFound => self.to_string(),
            other => format!("{}: {}", context, other),
        }
    }

    /// Raw message reported by the service, when there is one.
    pub fn service_message(&self) -> Option<&str> {
        match self {
            Self::Service { message, .. } => Some(message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
