//! Ship Store - Workflow store backends
//!
//! ## Backends
//!
//! - **InMemoryStore**: DashMap-backed, lost on restart (default)
//! - **FileStore**: JSON file rewritten after every mutation, reloaded on open
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ship_core::StoreConfig;
//! use ship_store::open_store;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = open_store(&StoreConfig::File { path: "./workflows.json".into() }).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;

pub use backend::file::FileStore;
pub use backend::memory::InMemoryStore;
pub use backend::open_store;

pub use ship_core::{Mutation, WorkflowFilter, WorkflowStore};
