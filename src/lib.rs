pub mod error;
pub mod gemini;
pub mod image_intake;
pub mod session;
pub mod web_pages;
