//! Read path: structured search, the service directory and bookmarks.

pub mod bookmark;
pub mod directory;
pub mod executor;

pub use bookmark::BookmarkUpdater;
pub use directory::ServiceDirectory;
pub use executor::{sanitize, SearchExecutor};
