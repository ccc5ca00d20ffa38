use serde::Serialize;
use thiserror::Error;

use crate::gemini::GenerationResult;
use crate::image_intake::ImageAsset;

pub const CHAR_LIMIT_MIN: u32 = 50;
pub const CHAR_LIMIT_MAX: u32 = 500;
pub const CHAR_LIMIT_DEFAULT: u32 = 125;

/// Snapshot handed to the generator. Built fresh per attempt, never
/// persisted.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub payload: String,
    pub mime_type: String,
    pub max_chars: u32,
}

#[derive(Debug, Clone, Default)]
pub enum Phase {
    #[default]
    Idle,
    Requesting,
    Succeeded(GenerationResult),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no image selected")]
    NoImage,
    #[error("a generation request is already outstanding")]
    RequestOutstanding,
}

impl SessionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::NoImage => "Por favor, selecione uma imagem primeiro.",
            SessionError::RequestOutstanding => {
                "Uma geração já está em andamento. Aguarde a conclusão."
            }
        }
    }
}

/// Advisory comparison of the generated text against the configured limit.
/// Over-limit is a warning, never a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitCheck {
    pub length: usize,
    pub limit: u32,
    pub within: bool,
}

pub fn check_limit(description: &str, limit: u32) -> LimitCheck {
    let length = description.chars().count();
    LimitCheck {
        length,
        limit,
        within: length <= limit as usize,
    }
}

/// Authoritative model of the UI lifecycle, independent of the web layer:
/// `Idle → Requesting → Succeeded | Failed`, back to `Idle` on the next
/// trigger or image change. At most one request is outstanding.
#[derive(Debug)]
pub struct Session {
    image: Option<ImageAsset>,
    char_limit: u32,
    phase: Phase,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            image: None,
            char_limit: CHAR_LIMIT_DEFAULT,
            phase: Phase::Idle,
        }
    }

    pub fn image(&self) -> Option<&ImageAsset> {
        self.image.as_ref()
    }

    pub fn char_limit(&self) -> u32 {
        self.char_limit
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn can_trigger(&self) -> bool {
        self.image.is_some() && !matches!(self.phase, Phase::Requesting)
    }

    /// Replaces the selected image and discards any prior result or error.
    pub fn select_image(&mut self, asset: ImageAsset) {
        self.image = Some(asset);
        self.phase = Phase::Idle;
    }

    pub fn clear_image(&mut self) {
        self.image = None;
        self.phase = Phase::Idle;
    }

    /// Clamped to the UI bounds. A prior successful result is kept; the
    /// limit check is recomputed against the new limit on display.
    pub fn set_char_limit(&mut self, limit: u32) {
        self.char_limit = limit.clamp(CHAR_LIMIT_MIN, CHAR_LIMIT_MAX);
    }

    /// Transitions to `Requesting` and yields the request snapshot. Refuses
    /// while a request is outstanding or when no image is selected, making
    /// no external call in either case.
    pub fn begin_request(&mut self) -> Result<GenerationRequest, SessionError> {
        if matches!(self.phase, Phase::Requesting) {
            return Err(SessionError::RequestOutstanding);
        }
        let image = self.image.as_ref().ok_or(SessionError::NoImage)?;
        let request = GenerationRequest {
            payload: image.base64_payload(),
            mime_type: image.mime_type.clone(),
            max_chars: self.char_limit,
        };
        self.phase = Phase::Requesting;
        Ok(request)
    }

    pub fn complete(&mut self, result: GenerationResult) {
        if matches!(self.phase, Phase::Requesting) {
            self.phase = Phase::Succeeded(result);
        }
    }

    /// Stores the user-facing message only; no partial result is retained.
    pub fn fail(&mut self, message: impl Into<String>) {
        if matches!(self.phase, Phase::Requesting) {
            self.phase = Phase::Failed(message.into());
        }
    }

    pub fn limit_check(&self, result: &GenerationResult) -> LimitCheck {
        check_limit(&result.description, self.char_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_asset() -> ImageAsset {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 8]);
        ImageAsset::from_bytes(bytes).unwrap()
    }

    fn result(description: &str) -> GenerationResult {
        GenerationResult {
            description: description.to_string(),
            keywords: vec!["a".into(), "b".into(), "c".into()],
        }
    }

    #[test]
    fn starts_idle_with_the_default_limit() {
        let session = Session::new();
        assert_eq!(session.char_limit(), 125);
        assert!(matches!(session.phase(), Phase::Idle));
        assert!(!session.can_trigger());
    }

    #[test]
    fn trigger_without_an_image_is_a_validation_error() {
        let mut session = Session::new();
        let err = session.begin_request().unwrap_err();
        assert_eq!(err, SessionError::NoImage);
        assert!(matches!(session.phase(), Phase::Idle));
    }

    #[test]
    fn begin_request_snapshots_payload_mime_and_limit() {
        let mut session = Session::new();
        session.select_image(png_asset());
        session.set_char_limit(200);
        let request = session.begin_request().unwrap();
        assert_eq!(request.payload, session.image().unwrap().base64_payload());
        assert_eq!(request.mime_type, "image/png");
        assert_eq!(request.max_chars, 200);
        assert!(matches!(session.phase(), Phase::Requesting));
    }

    #[test]
    fn second_trigger_while_outstanding_is_rejected() {
        let mut session = Session::new();
        session.select_image(png_asset());
        session.begin_request().unwrap();
        assert!(!session.can_trigger());
        let err = session.begin_request().unwrap_err();
        assert_eq!(err, SessionError::RequestOutstanding);
    }

    #[test]
    fn complete_holds_the_result_until_the_next_trigger() {
        let mut session = Session::new();
        session.select_image(png_asset());
        session.begin_request().unwrap();
        session.complete(result("Uma praia."));
        assert!(matches!(session.phase(), Phase::Succeeded(_)));
        // next trigger clears the prior result optimistically
        session.begin_request().unwrap();
        assert!(matches!(session.phase(), Phase::Requesting));
    }

    #[test]
    fn fail_holds_the_message_and_no_partial_result() {
        let mut session = Session::new();
        session.select_image(png_asset());
        session.begin_request().unwrap();
        session.fail("Não foi possível se comunicar com a API do Gemini. Tente novamente.");
        match session.phase() {
            Phase::Failed(message) => assert!(message.contains("Gemini")),
            other => panic!("unexpected phase: {other:?}"),
        }
    }

    #[test]
    fn selecting_a_new_image_clears_the_prior_result() {
        let mut session = Session::new();
        session.select_image(png_asset());
        session.begin_request().unwrap();
        session.complete(result("Uma praia."));
        session.select_image(png_asset());
        assert!(matches!(session.phase(), Phase::Idle));
    }

    #[test]
    fn clearing_the_image_resets_to_idle() {
        let mut session = Session::new();
        session.select_image(png_asset());
        session.begin_request().unwrap();
        session.fail("erro");
        session.clear_image();
        assert!(session.image().is_none());
        assert!(matches!(session.phase(), Phase::Idle));
    }

    #[test]
    fn limit_change_keeps_a_prior_successful_result() {
        let mut session = Session::new();
        session.select_image(png_asset());
        session.begin_request().unwrap();
        session.complete(result("Uma praia."));
        session.set_char_limit(300);
        assert!(matches!(session.phase(), Phase::Succeeded(_)));
        assert_eq!(session.char_limit(), 300);
    }

    #[test]
    fn char_limit_is_clamped_to_the_ui_bounds() {
        let mut session = Session::new();
        session.set_char_limit(10);
        assert_eq!(session.char_limit(), CHAR_LIMIT_MIN);
        session.set_char_limit(9999);
        assert_eq!(session.char_limit(), CHAR_LIMIT_MAX);
    }

    #[test]
    fn limit_check_flags_within_and_over() {
        let within = check_limit(&"a".repeat(125), 125);
        assert_eq!(within.length, 125);
        assert_eq!(within.limit, 125);
        assert!(within.within);

        let over = check_limit(&"a".repeat(126), 125);
        assert_eq!(over.length, 126);
        assert!(!over.within);
    }

    #[test]
    fn limit_check_counts_chars_not_bytes() {
        // "pôr" is 3 chars, 4 bytes
        let check = check_limit("pôr", 50);
        assert_eq!(check.length, 3);
    }
}
