//! Object type tags
//!
//! Every object record carries a 32-bit type tag taken from a fixed
//! enumeration. The parser dispatches on the tag; tags it does not know
//! are preserved in an [`ObjectType::Unknown`] arm so diagnostics can name
//! them.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Type tag of a persisted object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Document,
    Presentation,
    SlideList,
    Slide,
    Placeholder,
    SlideStyle,
    StickyNote,
    Notes,
    Text,
    DrawableShape,
    CharacterStyle,
    ParagraphStyle,
    ListStyle,
    Image,
    Group,
    /// Numbers worksheet. App-specific tags overlap: raw tag 2 is a
    /// presentation in Keynote and a sheet in Numbers, so `from_tag`
    /// yields `Presentation` and type expectations compare raw tags.
    Sheet,
    PagesDocument,
    Unknown(u32),
}

impl ObjectType {
    /// Map a raw tag to its type.
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            1 => Self::Document,
            2 => Self::Presentation,
            4 => Self::SlideList,
            5 => Self::Slide,
            7 => Self::Placeholder,
            9 => Self::SlideStyle,
            10 => Self::StickyNote,
            15 => Self::Notes,
            2001 => Self::Text,
            2011 => Self::DrawableShape,
            2021 => Self::CharacterStyle,
            2022 => Self::ParagraphStyle,
            2023 => Self::ListStyle,
            3005 => Self::Image,
            3008 => Self::Group,
            10000 => Self::PagesDocument,
            other => Self::Unknown(other),
        }
    }

    /// The raw tag value.
    pub fn tag(self) -> u32 {
        match self {
            Self::Document => 1,
            Self::Presentation => 2,
            Self::SlideList => 4,
            Self::Slide => 5,
            Self::Placeholder => 7,
            Self::SlideStyle => 9,
            Self::StickyNote => 10,
            Self::Notes => 15,
            Self::Text => 2001,
            Self::DrawableShape => 2011,
            Self::CharacterStyle => 2021,
            Self::ParagraphStyle => 2022,
            Self::ListStyle => 2023,
            Self::Image => 3005,
            Self::Group => 3008,
            Self::Sheet => 2,
            Self::PagesDocument => 10000,
            Self::Unknown(tag) => tag,
        }
    }

    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown(tag) => TAG_NAMES.get(&tag).copied().unwrap_or("unknown"),
            Self::Document => "document",
            Self::Presentation => "presentation",
            Self::SlideList => "slide list",
            Self::Slide => "slide",
            Self::Placeholder => "placeholder",
            Self::SlideStyle => "slide style",
            Self::StickyNote => "sticky note",
            Self::Notes => "notes",
            Self::Text => "text",
            Self::DrawableShape => "drawable shape",
            Self::CharacterStyle => "character style",
            Self::ParagraphStyle => "paragraph style",
            Self::ListStyle => "list style",
            Self::Image => "image",
            Self::Group => "group",
            Self::Sheet => "sheet",
            Self::PagesDocument => "word-processing document",
        }
    }
}

/// Names for tags the dispatcher does not handle, kept for debug notes.
static TAG_NAMES: Lazy<HashMap<u32, &'static str>> = Lazy::new(|| {
    let mut names = HashMap::new();
    names.insert(3u32, "theme");
    names.insert(6, "master slide list");
    names.insert(2002, "text storage");
    names.insert(2024, "stylesheet");
    names.insert(3002, "drawable");
    names.insert(3006, "mask");
    names.insert(3007, "movie");
    names.insert(6000, "table model");
    names.insert(6201, "table data list");
    names
});
