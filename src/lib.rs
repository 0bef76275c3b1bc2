pub mod data;
pub mod environment;
pub mod error;
pub mod structures;
pub mod utils;
