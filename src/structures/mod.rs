pub mod keys;
pub mod model;
pub mod token;
pub mod vima;
