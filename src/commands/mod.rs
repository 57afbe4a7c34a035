pub mod cache;
pub mod clean;
pub mod config;
pub mod figure;
