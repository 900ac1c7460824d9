// Infrastructure layer - External dependencies and adapters
pub mod chunked_feed;
pub mod config;
pub mod file_archive;
pub mod http_response;
pub mod ws_channel;
