pub mod client;

pub use client::{is_valid_session_id, HttpTranscriber, Transcriber, Transcription};
