#![deny(missing_docs)]
//! MCQ Solver Bot
//!
//! A Telegram bot that takes a photographed multiple-choice question, sends it
//! to several hosted AI models at once and streams every model's answer back
//! as soon as it arrives.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// LLM providers and the provider registry
pub mod llm;
/// Scatter/gather orchestration and response cleaning
pub mod solver;
pub mod utils;
