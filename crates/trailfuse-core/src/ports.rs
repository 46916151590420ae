//! Port trait definitions
//!
//! These traits define the seams that adapters plug into: change
//! notification for the rendering layer and map imagery for GPS imports.

pub mod events;
pub mod map;

pub use events::{DataChangeListener, LoggingListener};
pub use map::{MapImage, MapImageProvider};
