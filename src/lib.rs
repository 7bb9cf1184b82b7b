pub mod api;
pub mod cli;
pub mod core;
pub mod google;
pub mod parse;
pub mod pipeline;
pub mod sync;
