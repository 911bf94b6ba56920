pub mod config;
pub mod credentials;
pub mod error;
pub mod guard;
pub mod io;
pub mod pipeline;
pub mod rewrite;
pub mod version;

pub use error::{CdError, Result};
