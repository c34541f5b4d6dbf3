pub mod client;

pub use client::{load_recap_prompt, OllamaSummarizer, Summarizer, DEFAULT_RECAP_PROMPT};
