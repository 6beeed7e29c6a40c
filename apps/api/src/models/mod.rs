pub mod matching;
pub mod resume;
pub mod screening;
pub mod settings;
pub mod template;
