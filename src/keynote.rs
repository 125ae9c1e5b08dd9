//! The Keynote driver
//!
//! Walks document → presentation → slide lists → slides. A slide pulls
//! in its master slide's content (field 17), its slide style (field 1),
//! the title and body placeholders (fields 5 and 6), its shapes
//! (field 7) and the presenter notes (field 27).

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::collector::Collector;
use crate::geometry::Size;
use crate::object_index::ObjectIndex;
use crate::object_type::ObjectType;
use crate::parser::{IwaParser, StyleRef, first_message, read_color, read_ref, read_refs};
use crate::style::{Properties, Style};

pub struct KeynoteParser<'a> {
    core: IwaParser<'a>,
    slide_styles: HashMap<u32, StyleRef>,
}

impl<'a> KeynoteParser<'a> {
    pub fn new(index: ObjectIndex, collector: &'a mut dyn Collector) -> Self {
        Self {
            core: IwaParser::new(index, collector),
            slide_styles: HashMap::new(),
        }
    }

    /// Walk the document from the root object. Returns `false` only when
    /// the root or the presentation cannot be reached.
    pub fn parse(&mut self) -> bool {
        let Some(object) = self.core.object(1, Some(ObjectType::Document)) else {
            return false;
        };
        let msg = object.message().clone();

        match read_ref(&msg, 2) {
            Some(presentation_ref) => self.parse_presentation(presentation_ref),
            None => false,
        }
    }

    fn parse_presentation(&mut self, id: u32) -> bool {
        let Some(object) = self.core.object(id, Some(ObjectType::Presentation)) else {
            return false;
        };
        let msg = object.message().clone();

        self.core.collector().start_document();

        if let Some(size) = first_message(&msg, 4) {
            let width = size.float_(1).ok().and_then(|f| f.optional());
            let height = size.float_(2).ok().and_then(|f| f.optional());
            if let (Some(width), Some(height)) = (width, height) {
                self.core
                    .collector()
                    .collect_presentation_size(Size::new(f64::from(width), f64::from(height)));
            }
        }

        let mut success = true;
        if let Some(slide_lists) = first_message(&msg, 3) {
            match read_ref(&slide_lists, 1) {
                Some(list_ref) => {
                    success = self.parse_slide_list(list_ref);
                }
                None => {
                    for list_ref in read_refs(&slide_lists, 2) {
                        self.parse_slide_list(list_ref);
                    }
                }
            }
        }

        self.core.collector().end_document();
        success
    }

    fn parse_slide_list(&mut self, id: u32) -> bool {
        let Some(object) = self.core.object(id, Some(ObjectType::SlideList)) else {
            return false;
        };
        let msg = object.message().clone();

        for nested_ref in read_refs(&msg, 1) {
            self.parse_slide_list(nested_ref);
        }
        for slide_ref in read_refs(&msg, 2) {
            self.parse_slide(slide_ref, false);
        }
        true
    }

    /// Decode one slide. A master slide expands inline into the slide
    /// that uses it: its style and shapes are emitted first, without
    /// placeholders or notes of its own. The visited set keeps master
    /// chains from recursing.
    fn parse_slide(&mut self, id: u32, master: bool) -> bool {
        let Some(object) = self.core.object(id, Some(ObjectType::Slide)) else {
            return false;
        };
        let msg = object.message().clone();

        if !master {
            self.core.collector().start_slide();
            self.core.collector().start_layer();

            if let Some(master_ref) = read_ref(&msg, 17) {
                self.parse_slide(master_ref, true);
            }
        }

        let style = read_ref(&msg, 1).and_then(|style_ref| self.query_slide_style(style_ref));
        self.core.collector().set_slide_style(style.as_ref());

        if !master {
            if let Some(title_ref) = read_ref(&msg, 5) {
                self.parse_placeholder(title_ref);
            }
            if let Some(body_ref) = read_ref(&msg, 6) {
                self.parse_placeholder(body_ref);
            }
        }

        for shape_ref in read_refs(&msg, 7) {
            self.core.dispatch_shape(shape_ref);
        }

        if !master
            && let Some(notes_ref) = read_ref(&msg, 27)
        {
            self.parse_notes(notes_ref);
        }

        if !master {
            self.core.collector().end_layer();
            self.core.collector().end_slide();
        }
        true
    }

    /// A placeholder wraps a drawable whose text the master's geometry
    /// places. Type 2 is the title, type 3 the body.
    fn parse_placeholder(&mut self, id: u32) -> bool {
        let Some(object) = self.core.object(id, Some(ObjectType::Placeholder)) else {
            return false;
        };
        let msg = object.message().clone();

        let Some(placeholder_type) = msg.uint32(2).ok().and_then(|f| f.optional()) else {
            return true;
        };
        match placeholder_type {
            2 | 3 => {
                if let Some(drawable) = first_message(&msg, 1) {
                    let shape = first_message(&drawable, 1);
                    let text_ref = read_ref(&drawable, 2);
                    if let (Some(shape), Some(text_ref)) = (shape, text_ref) {
                        self.core.collector().start_level();
                        if let Some(placement) = first_message(&shape, 1) {
                            self.core.parse_shape_placement(&placement);
                        }
                        self.core.collector().start_text();
                        self.core.parse_text(text_ref);
                        self.core.collector().end_text();
                        self.core.collector().collect_placeholder(placeholder_type == 2);
                        self.core.collector().end_level();
                    }
                }
            }
            other => {
                debug!(
                    "KeynoteParser::parse_placeholder: unhandled placeholder type {}",
                    other
                );
            }
        }
        true
    }

    fn parse_notes(&mut self, id: u32) {
        let Some(object) = self.core.object(id, Some(ObjectType::Notes)) else {
            return;
        };
        let msg = object.message().clone();

        if let Some(text_ref) = read_ref(&msg, 1) {
            self.core.collector().start_text();
            self.core.parse_text(text_ref);
            self.core.collector().end_text();
            self.core.collector().collect_note();
        }
    }

    fn query_slide_style(&mut self, id: u32) -> StyleRef {
        if let Some(style) = self.slide_styles.get(&id) {
            return style.clone();
        }
        let style = self.parse_slide_style(id);
        self.slide_styles.insert(id, style.clone());
        style
    }

    fn parse_slide_style(&mut self, id: u32) -> StyleRef {
        let object = self.core.object(id, Some(ObjectType::SlideStyle))?;
        let msg = object.message().clone();

        let mut name = None;
        let mut parent = None;
        if let Some(info) = first_message(&msg, 1) {
            name = info.string(2).ok().and_then(|f| f.optional());
            parent = read_ref(&info, 3).and_then(|parent_ref| self.query_slide_style(parent_ref));
        }

        let mut props = Properties::default();
        if let Some(properties) = first_message(&msg, 11)
            && let Some(fill) = first_message(&properties, 1)
        {
            props.fill = read_color(&fill, 1);
        }

        Some(Rc::new(Style::new(props, name, parent)))
    }
}
