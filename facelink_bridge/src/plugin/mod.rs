//! Module loading: isolated dependency resolution, entry location, and the
//! lifecycle adapter.
//!
//! Load-time flow: [`ResolutionContext`] builds the per-load scope and
//! preloads plugin-local dependencies, [`locator`] resolves the registry
//! symbol and instantiates the entry module, [`ModuleAdapter`] owns the
//! result and drives initialize/update/teardown.

pub mod adapter;
pub mod locator;
pub mod resolve;

pub use adapter::ModuleAdapter;
pub use resolve::{Resolution, ResolutionContext, HOST_SHARED};
