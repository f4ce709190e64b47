pub mod api;
pub mod config;
pub mod fetcher;
pub mod ledger;
pub mod observability;
pub mod worker;
