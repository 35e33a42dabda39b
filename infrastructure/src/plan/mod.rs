//! Plan and gate file loading

mod loader;

pub use loader::{PlanFormat, PlanLoadError, PlanLoader};
