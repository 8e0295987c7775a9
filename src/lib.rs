//! Clinical translation bridge for doctor-patient messaging.
//!
//! Utterances are translated through Gemini when a credential is configured;
//! whenever the provider is absent or failing, the offline phrase table takes
//! over so that translation and summaries always produce text.

pub mod audio;
pub mod config;
pub mod conversation;
pub mod db;
pub mod gemini;
pub mod offline;
pub mod security;
pub mod server;
pub mod summary;
pub mod translation;
