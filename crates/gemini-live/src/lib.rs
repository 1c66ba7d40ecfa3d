pub mod client;
pub mod types;

pub use client::{Auth, Config, GeminiLiveClient, Incoming, LiveReader, LiveWriter, connect};
