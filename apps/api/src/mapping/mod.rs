pub mod accessor;
pub mod analyzer;
pub mod engine;
pub mod external_fill;
pub mod handlers;
pub mod heuristic;
pub mod models;
pub mod prompts;
pub mod rules;
pub mod service;
pub mod synonyms;
pub mod text;
