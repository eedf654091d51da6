pub mod config;
pub mod preprocess;
