pub mod driver;

pub use driver::{EndAction, PlaybackCommand, PlaybackDriver, PlaybackLimit};
