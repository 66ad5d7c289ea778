//! # Parlo Hub
//!
//! Concrete gateway implementations over HTTP (OpenAI-compatible completion,
//! LLM-backed translation, Google Translate speech synthesis, Whisper-style
//! transcription) and the axum REST API exposing the orchestrator.

pub mod api;
pub mod providers;
