mod client;

pub use client::{OpenAiModelClient, DEFAULT_BASE_URL};
