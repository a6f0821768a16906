pub mod cli;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod db;
pub mod engine;
pub mod executor;
pub mod fsio;
pub mod hooks;
pub mod ident;
pub mod ledger;
pub mod logging;
pub mod script;
pub mod sqlsplit;
