/// Adapters layer - interface adapters that convert between external formats and domain
pub mod config;
pub mod process;
pub mod registry;

pub use config::{FileConfigStore, WebConfigEditor};
pub use process::TokioProcessRunner;
pub use registry::RegQuerySiteRegistry;
