//! Loquat — a read-only importer for modern Apple iWork documents
//!
//! Modern iWork files (Keynote `.key`, Numbers `.numbers`, Pages `.pages`)
//! are packages of Snappy-compressed archive fragments (`.iwa`) carrying
//! typed objects in a Protocol-Buffers-like wire format. This crate
//! classifies an input, decompresses its fragments, resolves the object
//! index and walks the object graph from the document root, feeding a
//! [`Collector`](collector::Collector) with document events.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use loquat::Document;
//!
//! // Open an iWork document
//! let mut doc = Document::open("presentation.key")?;
//!
//! // Extract the plain text content
//! let text = doc.text();
//! println!("{}", text);
//! # Ok::<(), loquat::Error>(())
//! ```
//!
//! ## Structure of an iWork package
//!
//! - `Index/Metadata.iwa`: the object index (fragment table, file-data
//!   table, color palette)
//! - `Index/Document.iwa` and `Index/*.iwa`: object fragments
//! - `Data/`: embedded media
//! - `Metadata/`: document identifier and properties
//!
//! Some documents wrap the whole `Index/` directory in an inner
//! `Index.zip`; the format detection handles both layouts, directory
//! bundles as well as single-file ZIP packages, and the legacy XML
//! members used for classification.
//!
//! ## Damage tolerance
//!
//! Every parsing layer contains damage to the smallest unit it can: a bad
//! field is dropped from its message, a bad record stops its fragment
//! scan, a bad fragment leaves the rest of the index reachable. The only
//! user-visible failures are an unsupported input and a document whose
//! root object cannot be reached.

// Core parsing modules
pub mod stream;
pub mod varint;
pub mod snappy;
pub mod message;
pub mod object_type;
pub mod package;
pub mod object_index;
pub mod detect;

// Shape, text and style primitives
pub mod geometry;
pub mod path;
pub mod style;
pub mod text;

/// The consumer interface fed by the parser drivers
pub mod collector;

// Parser drivers
pub mod parser;
pub mod keynote;
pub mod numbers;
pub mod pages;

/// High-level document type
pub mod document;

#[cfg(test)]
mod testutil;

/// Re-export commonly used types
pub use collector::{Collector, PlainTextCollector};
pub use detect::{Application, Confidence, Detection, Format};
pub use document::Document;
pub use message::{FieldValues, Message};
pub use object_type::ObjectType;
pub use snappy::SnappyStream;
pub use stream::MemoryStream;

/// Error types for iWork parsing
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of stream")]
    EndOfStream,

    #[error("varint overflows 64 bits")]
    Range,

    #[error("field {0} was accessed with an incompatible type")]
    AccessMismatch(u32),

    #[error("invalid IWA structure: {0}")]
    Format(String),

    #[error("Snappy decompression error: {0}")]
    Snappy(String),

    #[error("package structure error: {0}")]
    Package(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
