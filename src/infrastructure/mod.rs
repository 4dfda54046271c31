// Infrastructure layer - External dependencies and adapters
pub mod api_response;
pub mod config;
pub mod event_stream;
pub mod octoprint_client;
