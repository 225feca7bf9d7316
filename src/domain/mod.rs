//! Domain layer - value objects and the ports the managers are built on
//! This layer has no dependencies on adapters or infrastructure

pub mod entities;
pub mod repositories;
pub mod utils;

pub use entities::*;
pub use repositories::*;
pub use utils::*;
