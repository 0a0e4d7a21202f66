mod basic;
mod client;
pub mod pager;

pub use basic::BasicClient;
pub use client::{HttpClient, HttpResponse};
pub use pager::{FetchOutcome, PagedFetcher, StopReason};
