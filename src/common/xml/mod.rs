//! XML tree, serialization and escaping helpers.

mod escape;

pub mod document;
pub mod serialize;

pub use document::{Attribute, Attributes, NodeId, NodeKind, XmlDocument, local_part, prefix_part};
pub use escape::{escape_attr, escape_text, unescape_xml};
pub use serialize::XML_DECLARATION;
