pub mod account;
pub mod balance;
pub mod client;
pub mod config;
pub mod constants;
pub mod getter;
pub mod ledger;
pub mod processor;
pub mod reindex;
pub mod snapshot;
