pub mod app;
pub mod archive;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod hadoop;
pub mod ledger;
pub mod manager;
pub mod output;
pub mod source;
pub mod store;
