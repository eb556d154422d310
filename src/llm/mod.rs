pub mod client;
pub mod predictor;
pub mod types;
