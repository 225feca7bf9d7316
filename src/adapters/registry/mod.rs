pub mod reg_query;

pub use reg_query::RegQuerySiteRegistry;
