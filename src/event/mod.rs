//! Raw event handling: decoding, classification and path access.

mod decode;
mod kind;
mod path;

pub use decode::{DecodeError, decode, json_type_name, line_context};
pub use kind::{Classified, DropReason, EventKind, classify};
pub use path::{Resolved, dotted, resolve};
