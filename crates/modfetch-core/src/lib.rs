pub mod config;
pub mod logging;

pub mod api;
pub mod batch;
pub mod install;
pub mod ledger;
pub mod pipeline;
pub mod resolver;
pub mod select;
pub mod sidecar;
pub mod storage;
pub mod transfer;
