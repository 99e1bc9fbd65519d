// crates/core/src/lib.rs
pub mod config;
pub mod discovery;
pub mod error;
pub mod parser;
pub mod paths;
pub mod project;
pub mod types;
pub mod usage;

pub use config::*;
pub use discovery::*;
pub use error::*;
pub use parser::*;
pub use project::*;
pub use types::*;
pub use usage::*;
