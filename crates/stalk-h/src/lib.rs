//! Chromium-backed [`BrowserSession`](stalk_engine::session::BrowserSession)
//! driven over the DevTools protocol.

pub mod cdp;
pub mod events;
pub mod inject;
pub mod session;

pub use session::{HeadlessSession, LaunchOptions};
