pub mod credentials;
pub mod server;
pub mod service;
