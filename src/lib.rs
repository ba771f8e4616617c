pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod output;
pub mod queries;
pub mod retrieval;
pub mod server;
pub mod sparql;
pub mod temporal;
pub mod template;
