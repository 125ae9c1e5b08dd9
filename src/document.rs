//! High-level document type
//!
//! [`Document`] ties detection and parsing together: open an input,
//! ask what it is, and walk it into a [`Collector`].
//!
//! ```rust,no_run
//! use loquat::{Confidence, Document};
//!
//! let mut doc = Document::open("deck.key")?;
//! let (confidence, application) = doc.is_supported();
//! if confidence != Confidence::Unsupported {
//!     println!("{:?}: {}", application, doc.text());
//! }
//! # Ok::<(), loquat::Error>(())
//! ```

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::collector::{Collector, PlainTextCollector};
use crate::detect::{self, Application, Confidence, Detection, Format};
use crate::object_index::ObjectIndex;
use crate::package::{DirPackage, ZipPackage, package_ref};
use crate::{keynote::KeynoteParser, numbers::NumbersParser, pages::PagesParser};

/// An opened iWork document.
pub struct Document {
    detection: Detection,
}

impl Document {
    /// Open a document from a path: a single-file package, a directory
    /// bundle, or a stripped main stream.
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            let package = package_ref(DirPackage::new(path));
            return Ok(Self {
                detection: detect::detect_package(package, None),
            });
        }
        Self::from_bytes(fs::read(path)?)
    }

    /// Open a document held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> crate::Result<Self> {
        let detection = if bytes.starts_with(b"PK") {
            match ZipPackage::new(bytes) {
                Ok(package) => detect::detect_package(package_ref(package), None),
                Err(e) => {
                    debug!("Document::from_bytes: not a readable ZIP: {}", e);
                    return Ok(Self {
                        detection: detect::detect_stream(Vec::new(), None),
                    });
                }
            }
        } else {
            detect::detect_stream(bytes, None)
        };
        Ok(Self { detection })
    }

    /// How well the input is supported, and which application family it
    /// belongs to. Never fails.
    pub fn is_supported(&self) -> (Confidence, Option<Application>) {
        (self.detection.confidence, self.detection.application)
    }

    pub fn confidence(&self) -> Confidence {
        self.detection.confidence
    }

    pub fn application(&self) -> Option<Application> {
        self.detection.application
    }

    pub fn format(&self) -> Option<Format> {
        self.detection.format
    }

    /// Walk the document into the collector. Returns `false` when the
    /// input is unsupported or the root object cannot be reached; damage
    /// past the root is tolerated and does not fail the parse.
    pub fn parse(&mut self, collector: &mut dyn Collector) -> bool {
        match (self.detection.format, self.detection.application) {
            (Some(Format::Binary), Some(application)) => {
                let Some(fragments) = self.detection.fragments.clone() else {
                    debug!("Document::parse: no fragment source, cannot parse");
                    return false;
                };
                let index = ObjectIndex::new(fragments, self.detection.package.clone());
                match application {
                    Application::Keynote => KeynoteParser::new(index, collector).parse(),
                    Application::Numbers => NumbersParser::new(index, collector).parse(),
                    Application::Pages => PagesParser::new(index, collector).parse(),
                }
            }
            (Some(_), _) => {
                // the legacy XML formats are classified only
                debug!("Document::parse: XML formats are not handled by this importer");
                false
            }
            _ => false,
        }
    }

    /// Flatten the document into plain text.
    pub fn text(&mut self) -> String {
        let mut collector = PlainTextCollector::new();
        self.parse(&mut collector);
        collector.into_text()
    }
}
