pub mod config;
pub mod flush;
pub mod serve;
