pub mod file_store;
pub mod web_config;

pub use file_store::FileConfigStore;
pub use web_config::WebConfigEditor;
