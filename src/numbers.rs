//! The Numbers driver
//!
//! Walks document → sheets. Each sheet carries its name in field 1 and
//! the drawables placed on it (tables, shapes, text boxes) in field 2;
//! the drawables go through the shared shape dispatch.

use crate::collector::Collector;
use crate::object_index::ObjectIndex;
use crate::object_type::ObjectType;
use crate::parser::{IwaParser, read_refs};

pub struct NumbersParser<'a> {
    core: IwaParser<'a>,
}

impl<'a> NumbersParser<'a> {
    pub fn new(index: ObjectIndex, collector: &'a mut dyn Collector) -> Self {
        Self {
            core: IwaParser::new(index, collector),
        }
    }

    /// Walk the document from the root object. Returns `false` only when
    /// the root cannot be reached.
    pub fn parse(&mut self) -> bool {
        let Some(object) = self.core.object(1, Some(ObjectType::Document)) else {
            return false;
        };
        let msg = object.message().clone();

        self.core.collector().start_document();
        for sheet_ref in read_refs(&msg, 1) {
            self.parse_sheet(sheet_ref);
        }
        self.core.collector().end_document();
        true
    }

    fn parse_sheet(&mut self, id: u32) -> bool {
        let Some(object) = self.core.object(id, Some(ObjectType::Sheet)) else {
            return false;
        };
        let msg = object.message().clone();

        let name = msg.string(1).ok().and_then(|f| f.optional());
        self.core.collector().start_sheet(name.as_deref());
        for drawable_ref in read_refs(&msg, 2) {
            self.core.dispatch_shape(drawable_ref);
        }
        self.core.collector().end_sheet();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{field_payload, field_string, index_with, record, reference};

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Collector for Recorder {
        fn start_document(&mut self) {
            self.events.push("document-open".to_string());
        }

        fn end_document(&mut self) {
            self.events.push("document-close".to_string());
        }

        fn start_sheet(&mut self, name: Option<&str>) {
            self.events
                .push(format!("sheet-open({})", name.unwrap_or("-")));
        }

        fn end_sheet(&mut self) {
            self.events.push("sheet-close".to_string());
        }

        fn start_text(&mut self) {
            self.events.push("text-open".to_string());
        }

        fn end_text(&mut self) {
            self.events.push("text-close".to_string());
        }

        fn insert_text(&mut self, text: &str) {
            self.events.push(format!("text({})", text));
        }
    }

    fn parse(ids: &[u32], records: &[Vec<u8>]) -> (bool, Recorder) {
        let mut recorder = Recorder::default();
        let ok = {
            let mut parser = NumbersParser::new(index_with(ids, records), &mut recorder);
            parser.parse()
        };
        (ok, recorder)
    }

    #[test]
    fn test_sheet_walk_with_name_and_text() {
        let document = record(1, 1, &reference(1, 10));
        let mut sheet_body = field_string(1, "Budget");
        sheet_body.extend(reference(2, 20));
        let sheet = record(10, 2, &sheet_body);
        let text = record(20, 2001, &field_payload(3, b"cell notes"));

        let (ok, recorder) = parse(&[10, 20], &[document, sheet, text]);
        assert!(ok);
        assert_eq!(
            recorder.events,
            vec![
                "document-open",
                "sheet-open(Budget)",
                "text-open",
                "text(cell notes)",
                "text-close",
                "sheet-close",
                "document-close",
            ]
        );
    }

    #[test]
    fn test_sheet_without_a_name() {
        let document = record(1, 1, &reference(1, 10));
        let sheet = record(10, 2, &[]);

        let (ok, recorder) = parse(&[10], &[document, sheet]);
        assert!(ok);
        assert_eq!(
            recorder.events,
            vec![
                "document-open",
                "sheet-open(-)",
                "sheet-close",
                "document-close",
            ]
        );
    }

    #[test]
    fn test_missing_root_fails() {
        let (ok, recorder) = parse(&[], &[]);
        assert!(!ok);
        assert!(recorder.events.is_empty());
    }
}
