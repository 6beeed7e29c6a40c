pub mod analysis;
pub mod batch;
pub mod fusion;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod similarity;
pub mod service;
pub mod store;
