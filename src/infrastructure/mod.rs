// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod config_watcher;
pub mod http_client;
