//! The consumer interface
//!
//! The parser drivers do not build a document model; they emit events into
//! a [`Collector`] supplied by the host. Every method has a no-op default,
//! so a consumer implements only the events it cares about. The drivers
//! guarantee balanced open/close pairs for slides, layers, levels, groups,
//! text blocks, paragraphs and spans.

use std::rc::Rc;

use crate::geometry::{Geometry, Size};
use crate::path::Path;
use crate::stream::MemoryStream;
use crate::style::Style;

/// Receiver for the document events emitted during parsing.
pub trait Collector {
    fn start_document(&mut self) {}
    fn end_document(&mut self) {}

    fn collect_presentation_size(&mut self, _size: Size) {}

    fn start_slide(&mut self) {}
    fn end_slide(&mut self) {}
    fn set_slide_style(&mut self, _style: Option<&Rc<Style>>) {}

    fn start_layer(&mut self) {}
    fn end_layer(&mut self) {}

    /// A nesting level groups a shape with its transform and text.
    fn start_level(&mut self) {}
    fn end_level(&mut self) {}

    fn start_group(&mut self) {}
    fn end_group(&mut self) {}

    fn start_sheet(&mut self, _name: Option<&str>) {}
    fn end_sheet(&mut self) {}

    fn start_text(&mut self) {}
    fn end_text(&mut self) {}

    fn open_paragraph(&mut self, _style: Option<&Rc<Style>>) {}
    fn close_paragraph(&mut self) {}
    fn open_span(&mut self, _style: Option<&Rc<Style>>) {}
    fn close_span(&mut self) {}

    fn set_list_style(&mut self, _style: Option<&Rc<Style>>) {}
    fn set_list_level(&mut self, _level: u32) {}

    fn insert_text(&mut self, _text: &str) {}
    fn insert_tab(&mut self) {}
    fn insert_space(&mut self) {}
    fn insert_line_break(&mut self) {}
    fn insert_page_break(&mut self) {}

    fn collect_geometry(&mut self, _geometry: &Geometry) {}
    fn collect_path(&mut self, _path: &Path) {}
    fn collect_shape(&mut self) {}
    fn collect_image(&mut self, _data: Option<&MemoryStream>) {}

    fn collect_note(&mut self) {}
    fn collect_sticky_note(&mut self) {}
    /// A placeholder finished decoding; `title` distinguishes the title
    /// placeholder from the body one.
    fn collect_placeholder(&mut self, _title: bool) {}
}

/// A collector that flattens everything into plain text.
///
/// Paragraphs end with a newline; tabs, spaces and breaks map to their
/// plain-text equivalents. Geometry and styling are ignored.
#[derive(Debug, Default)]
pub struct PlainTextCollector {
    text: String,
}

impl PlainTextCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The text collected so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the collector and return the text.
    pub fn into_text(self) -> String {
        self.text
    }
}

impl Collector for PlainTextCollector {
    fn insert_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn insert_tab(&mut self) {
        self.text.push('\t');
    }

    fn insert_space(&mut self) {
        self.text.push(' ');
    }

    fn insert_line_break(&mut self) {
        self.text.push('\n');
    }

    fn insert_page_break(&mut self) {
        self.text.push('\n');
    }

    fn close_paragraph(&mut self) {
        if !self.text.ends_with('\n') {
            self.text.push('\n');
        }
    }
}
