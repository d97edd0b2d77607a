//! Saga Engine library.
//!
//! Orchestrates the pure progression domain at the boundary: storage,
//! externally owned modifiers, time, and configuration.
//!
//! ## Structure
//!
//! - `use_cases/` - Progression reads, previews, and the single commit path
//! - `infrastructure/` - Ports, in-memory adapters, configuration
//! - `app` - Application composition

pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
