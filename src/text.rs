//! Text payloads and style ranges
//!
//! A text object carries one UTF-8 payload and up to five parallel maps
//! from character offset to: paragraph style, span style, language tag,
//! list style and list level. The offsets partition the text; a final
//! boundary at the text length terminates every run.
//!
//! [`TextBody::parse`] merges the maps into one ordered boundary set and
//! walks the text, opening a paragraph wherever a paragraph entry is in
//! effect and a span at every boundary, translating the byte-value
//! escapes on the way. The span style and language in effect persist
//! across boundaries the other maps introduce; only an explicit entry of
//! their own map changes them.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::collector::Collector;
use crate::style::{Properties, Style};

type StyleRef = Option<Rc<Style>>;

/// Everything that changes at one character offset.
#[derive(Default)]
struct Boundary {
    para: Option<StyleRef>,
    span: Option<StyleRef>,
    lang: Option<String>,
    list: Option<StyleRef>,
    list_level: Option<u32>,
}

/// A text payload with its style range maps.
#[derive(Default)]
pub struct TextBody {
    text: String,
    paras: BTreeMap<u32, StyleRef>,
    spans: BTreeMap<u32, StyleRef>,
    langs: BTreeMap<u32, String>,
    lists: BTreeMap<u32, StyleRef>,
    list_levels: BTreeMap<u32, u32>,
}

impl TextBody {
    pub fn new(text: String) -> Self {
        Self {
            text,
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_paragraphs(&mut self, paras: BTreeMap<u32, StyleRef>) {
        self.paras = paras;
    }

    pub fn set_spans(&mut self, spans: BTreeMap<u32, StyleRef>) {
        self.spans = spans;
    }

    pub fn set_languages(&mut self, langs: BTreeMap<u32, String>) {
        self.langs = langs;
    }

    pub fn set_lists(&mut self, lists: BTreeMap<u32, StyleRef>) {
        self.lists = lists;
    }

    pub fn set_list_levels(&mut self, levels: BTreeMap<u32, u32>) {
        self.list_levels = levels;
    }

    /// Walk the text and feed the collector.
    pub fn parse(&self, collector: &mut dyn Collector) {
        let chars: Vec<char> = self.text.chars().collect();
        let boundaries = self.merge_boundaries(chars.len() as u32);

        let mut was_space = false;
        // the span style and language in effect; a boundary carrying no
        // entry of its own leaves them unchanged
        let mut current_span: StyleRef = None;
        let mut current_lang: Option<String> = None;
        let entries: Vec<(u32, &Boundary)> = boundaries.iter().map(|(&k, v)| (k, v)).collect();
        for (i, &(start, boundary)) in entries.iter().enumerate() {
            if let Some(list) = &boundary.list {
                collector.set_list_style(list.as_ref());
            }
            if let Some(level) = boundary.list_level {
                collector.set_list_level(level + 1);
            }

            if let Some(span) = &boundary.span {
                current_span = span.clone();
            }
            if let Some(lang) = &boundary.lang {
                // an empty tag clears the language
                current_lang = (!lang.is_empty()).then(|| lang.clone());
            }

            if let Some(para) = &boundary.para {
                collector.open_paragraph(para.as_ref());
            }
            let span_style = effective_span_style(current_span.clone(), current_lang.as_deref());
            collector.open_span(span_style.as_ref());

            match entries.get(i + 1) {
                None => {
                    self.write_text(
                        &chars,
                        start as usize,
                        chars.len(),
                        true,
                        &mut was_space,
                        collector,
                    );
                    collector.close_span();
                    collector.close_paragraph();
                }
                Some(&(next_start, next)) => {
                    let ends_para = next.para.is_some();
                    self.write_text(
                        &chars,
                        start as usize,
                        next_start as usize,
                        ends_para,
                        &mut was_space,
                        collector,
                    );
                    collector.close_span();
                    if ends_para {
                        collector.close_paragraph();
                    }
                }
            }
        }
    }

    /// Merge the five maps into one ordered boundary set with a
    /// guaranteed entry at offset 0. Offsets at or past the text length
    /// are document damage and are skipped.
    fn merge_boundaries(&self, length: u32) -> BTreeMap<u32, Boundary> {
        let mut merged: BTreeMap<u32, Boundary> = BTreeMap::new();
        merged.entry(0).or_default();

        let in_range = |pos: u32| pos == 0 || pos < length;
        for (&pos, style) in &self.paras {
            if in_range(pos) {
                merged.entry(pos).or_default().para = Some(style.clone());
            }
        }
        for (&pos, style) in &self.spans {
            if in_range(pos) {
                merged.entry(pos).or_default().span = Some(style.clone());
            }
        }
        for (&pos, lang) in &self.langs {
            if in_range(pos) {
                merged.entry(pos).or_default().lang = Some(lang.clone());
            }
        }
        for (&pos, style) in &self.lists {
            if in_range(pos) {
                merged.entry(pos).or_default().list = Some(style.clone());
            }
        }
        for (&pos, &level) in &self.list_levels {
            if in_range(pos) {
                merged.entry(pos).or_default().list_level = Some(level);
            }
        }
        merged
    }

    /// Emit the characters of `[start, end)`, translating escapes.
    ///
    /// A `\n` terminating the paragraph is the paragraph terminator and
    /// emits nothing; elsewhere it becomes a line break. Runs of spaces
    /// collapse into space events after the first literal one.
    fn write_text(
        &self,
        chars: &[char],
        start: usize,
        end: usize,
        end_para: bool,
        was_space: &mut bool,
        collector: &mut dyn Collector,
    ) {
        let mut buf = String::new();
        let flush = |buf: &mut String, collector: &mut dyn Collector| {
            if !buf.is_empty() {
                collector.insert_text(buf);
                buf.clear();
            }
        };

        for i in start..end {
            let c = chars[i];
            match c {
                '\u{5}' => {
                    flush(&mut buf, collector);
                    collector.insert_page_break();
                }
                '\t' => {
                    flush(&mut buf, collector);
                    collector.insert_tab();
                }
                '\r' => {
                    flush(&mut buf, collector);
                    collector.insert_line_break();
                }
                '\n' => {
                    flush(&mut buf, collector);
                    // ignore the newline that ends the paragraph
                    if end_para && i + 1 != end {
                        collector.insert_line_break();
                    }
                }
                ' ' => {
                    if *was_space {
                        flush(&mut buf, collector);
                        collector.insert_space();
                    } else {
                        buf.push(' ');
                    }
                }
                c if (c as u32) <= 0x1F => {
                    debug!("TextBody::write_text: dropping control character {}", c as u32);
                }
                c => buf.push(c),
            }
            *was_space = c == ' ';
        }

        flush(&mut buf, collector);
    }
}

/// The span style in effect at a boundary. A language in effect wraps
/// the span style in a language-only child style.
fn effective_span_style(span: StyleRef, lang: Option<&str>) -> StyleRef {
    match lang {
        None => span,
        Some(lang) => {
            let props = Properties {
                language: Some(lang.to_string()),
                ..Properties::default()
            };
            Some(Rc::new(Style::new(props, None, span)))
        }
    }
}
