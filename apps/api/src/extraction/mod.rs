pub mod cache;
pub mod credentials;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod preprocess;
pub mod prompts;
pub mod recovery;
pub mod repair;
pub mod service;
pub mod truncation;
