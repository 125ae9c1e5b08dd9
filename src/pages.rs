//! The Pages driver
//!
//! Walks the word-processing document root (type tag 10000) to its body
//! text storage. A document without a resolvable body succeeds with an
//! empty body.

use crate::collector::Collector;
use crate::object_index::ObjectIndex;
use crate::object_type::ObjectType;
use crate::parser::{IwaParser, read_ref};

pub struct PagesParser<'a> {
    core: IwaParser<'a>,
}

impl<'a> PagesParser<'a> {
    pub fn new(index: ObjectIndex, collector: &'a mut dyn Collector) -> Self {
        Self {
            core: IwaParser::new(index, collector),
        }
    }

    /// Walk the document from the root object. Returns `false` only when
    /// the root cannot be reached.
    pub fn parse(&mut self) -> bool {
        let Some(object) = self.core.object(1, Some(ObjectType::PagesDocument)) else {
            return false;
        };
        let msg = object.message().clone();

        self.core.collector().start_document();
        if let Some(body_ref) = read_ref(&msg, 4) {
            self.core.collector().start_text();
            self.core.parse_text(body_ref);
            self.core.collector().end_text();
        }
        self.core.collector().end_document();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{field_payload, index_with, record, reference};

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
            let mut parser = PagesParser::new(index_with(ids, records), &mut recorder);
            parser.parse()
        };
        (ok, recorder)
    }

    #[test]
    fn test_body_text_is_walked() {
        let document = record(1, 10000, &reference(4, 30));
        let text = record(30, 2001, &field_payload(3, b"Dear reader"));

        let (ok, recorder) = parse(&[30], &[document, text]);
        assert!(ok);
        assert_eq!(
            recorder.events,
            vec![
                "document-open",
                "text-open",
                "text(Dear reader)",
                "text-close",
                "document-close",
            ]
        );
    }

    #[test]
    fn test_document_without_body_succeeds_empty() {
        let document = record(1, 10000, &[]);

        let (ok, recorder) = parse(&[], &[document]);
        assert!(ok);
        assert_eq!(recorder.events, vec!["document-open", "document-close"]);
    }

    #[test]
    fn test_wrong_root_type_fails() {
        // a Keynote document root is not a word-processing root
        let document = record(1, 1, &[]);

        let (ok, recorder) = parse(&[], &[document]);
        assert!(!ok);
        assert!(recorder.events.is_empty());
    }
}
