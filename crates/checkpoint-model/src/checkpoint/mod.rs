pub mod chunk;
pub mod engine;
pub mod table;
