use thiserror::Error;

/// Failure kinds of a generation attempt. Each attempt is atomic: either a
/// full result is produced or one of these is returned. None is retried.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Required credential is absent. Detected before any network attempt.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The remote call failed: network, quota, server error.
    #[error("generation service error: {0}")]
    Service(String),
    /// Structured mode only: the returned payload does not match the
    /// declared shape.
    #[error("unexpected response format: {0}")]
    ResponseFormat(String),
}

impl GenerateError {
    /// Message shown to the user, in the product language.
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerateError::Configuration(_) => {
                "A chave da API do Google Gemini não está configurada."
            }
            GenerateError::Service(_) => {
                "Não foi possível se comunicar com a API do Gemini. Tente novamente."
            }
            GenerateError::ResponseFormat(_) => {
                "A API do Gemini retornou uma resposta em formato inesperado. Tente novamente."
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerateError>;
