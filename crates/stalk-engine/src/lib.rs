pub mod auth;
pub mod config;
pub mod correlator;
pub mod deadline;
pub mod details;
pub mod fetcher;
pub mod normalizer;
pub mod session;
pub mod site;

pub use stalk_common::error;
pub use stalk_common::protocol;
pub use stalk_common::timestamp;
