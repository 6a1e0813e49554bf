//! posts/crates/posts-core/src/lib.rs
//!
//! The domain model and interface definitions for the posts service.

pub mod context;
pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use context::*;
pub use error::*;
pub use models::*;
pub use traits::*;
