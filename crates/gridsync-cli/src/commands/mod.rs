pub mod cache;
pub mod common;
pub mod completions;
pub mod pending;
pub mod record;
pub mod reset;
pub mod status;
pub mod sync;
