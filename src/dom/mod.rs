//! Document model
//!
//! A small arena-backed DOM used by the anchoring engine. It carries just
//! enough of the browser's node semantics for highlight work:
//!
//! - Element/text/comment nodes with stable [`NodeId`]s
//! - Text splitting and normalization (the mutations painting relies on)
//! - Boundary points and ranges with standard point ordering
//! - A single live selection owned by the document
//!
//! HTML is parsed with html5ever and serialized back by [`to_html`].

mod parse;
mod range;
mod serialize;
mod tree;

pub use parse::parse_html;
pub use range::{BoundaryPoint, DomRange};
pub use serialize::to_html;
pub use tree::{Document, DomError, NodeData, NodeId};
