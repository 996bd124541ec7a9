//! Gemini-backed visual description of rendered slides.

pub mod client;
pub mod error;
pub mod models;

pub use client::{GeminiConfig, GeminiDescriber, DEFAULT_ENDPOINT, DEFAULT_MODEL};
pub use error::{Result, VisionError};
