pub mod engine;
pub mod handlers;
pub mod models;
pub mod predicates;
pub mod service;
