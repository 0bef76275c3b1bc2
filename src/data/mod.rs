pub mod batcher;
pub mod collate;
