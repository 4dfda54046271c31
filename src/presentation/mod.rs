// Presentation layer - HTTP surface for the host and the front end
pub mod app_state;
pub mod handlers;
