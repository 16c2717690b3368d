pub mod config;
pub mod domain;
pub mod error;
pub mod ligand;
pub mod output;
pub mod page;
pub mod phyloxml;
pub mod query;
pub mod schema;
pub mod sift;
pub mod store;
