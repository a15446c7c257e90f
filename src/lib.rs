pub mod assistant;
pub mod commands;
pub mod config;
pub mod confluence;
pub mod db;
pub mod doc_processor;
pub mod embedding;
pub mod intent;
pub mod llm;
pub mod models;
pub mod summarizer;

pub use assistant::{Answer, Assistant, Readiness};
