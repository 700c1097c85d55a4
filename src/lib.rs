pub mod command;
pub mod config;
pub mod git;
pub mod model;
pub mod provider;

mod api;

pub use api::{Fetched, Repofetch, RepofetchBuilder};
