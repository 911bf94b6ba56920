pub mod bump;
pub mod config;
pub mod deploy;
pub mod serve;
