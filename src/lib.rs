pub mod analyzers;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filters;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod report;
