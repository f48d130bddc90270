pub mod config;
pub mod qa;
pub mod serve;
