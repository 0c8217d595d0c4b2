//! Media stripping for converted packages.
//!
//! [`MediaFilterEngine`] removes audio, video, images or any file matching
//! an extension or size threshold, leaving an inline placeholder image
//! wherever a removed file was referenced.

pub mod filter;
pub mod placeholder;

pub use filter::{MediaClass, MediaFilter, MediaFilterEngine};
pub use placeholder::placeholder_data_uri;
