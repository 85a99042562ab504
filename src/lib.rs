pub mod client;
pub mod config;
pub mod errors;
pub mod executor;
pub mod metrics;
pub mod selector;
pub mod services;
pub mod session;
pub mod task;
pub mod utils;
pub mod worker;
pub mod yaml_config;
