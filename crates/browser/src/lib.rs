//! Browser capability surface for crawling
//!
//! Two layers:
//!
//! 1. **Capabilities** (`capability`): the `Browser` and `Page` traits the
//!    crawler is written against. Nothing in them knows about CDP.
//! 2. **Chrome over CDP** (`cdp`, `session`, `page`, `launch`): a single
//!    WebSocket per browser, multiplexed page sessions, page events fanned
//!    out over broadcast channels, and a launcher that owns the process.

pub mod capability;
pub mod cdp;
pub mod error;
pub mod events;
pub mod launch;
pub mod page;
pub mod session;

pub use capability::{Browser, NavigateOptions, Page, PageId, PageMetrics, WaitUntil};
pub use cdp::{CDPClient, CDPSession};
pub use error::{BrowserError, Result};
pub use events::{EventBus, PageEvent};
pub use launch::Launcher;
pub use page::CdpPage;
pub use session::{CdpBrowser, SessionConfig};
