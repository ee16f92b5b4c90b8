pub mod cdp;
pub mod chrome;
pub mod page;
pub mod session;

pub use chrome::{discovery, find_browser_binary, ChromeBrowser, ChromePage, ChromeSettings};
pub use page::{Browser, Page};
pub use session::{ElementHandle, Session, SessionSettings};
