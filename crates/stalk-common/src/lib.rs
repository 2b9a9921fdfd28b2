pub mod error;
pub mod protocol;
pub mod timestamp;

pub use error::{ErrorCode, SessionError};
pub use timestamp::{TimestampError, normalize_relative};
