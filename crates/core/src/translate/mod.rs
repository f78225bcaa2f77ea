pub mod engine;
pub mod tables;
