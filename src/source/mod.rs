//! Source side: listing input blobs and turning them into lines.

pub mod listing;
pub mod reader;

pub use listing::{DateRange, hour_stamp, list_input_files};
pub use reader::{BlobReader, lines};
