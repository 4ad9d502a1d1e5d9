//! Wellness Chat: an empathetic, scripted wellness check-in.

pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod survey;
