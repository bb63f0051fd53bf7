//! Just enough of the Chrome DevTools Protocol to launch a headless browser,
//! open isolated tabs, navigate with lifecycle waits, and read the DOM back.

pub mod browser;
pub mod connection;
pub mod error;
pub mod page;

pub use browser::{Browser, LaunchOptions};
pub use connection::{CdpConnection, CdpEvent};
pub use error::{CdpError, Result};
pub use page::{Page, WaitUntil};
