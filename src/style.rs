//! Styles
//!
//! Character, paragraph, list and slide styles are objects of their own,
//! referenced by ID and chained through a parent reference. A style keeps
//! the properties it sets; lookups walk the parent chain.

use std::rc::Rc;

use crate::geometry::Color;

/// Vertical baseline placement of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Baseline {
    Super,
    Sub,
}

impl Baseline {
    /// Convert the persisted number, if it names a known placement.
    pub fn convert(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Super),
            2 => Some(Self::Sub),
            _ => None,
        }
    }
}

/// Capitalization of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capitalization {
    None,
    AllCaps,
    SmallCaps,
    Title,
}

impl Capitalization {
    pub fn convert(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::AllCaps),
            2 => Some(Self::SmallCaps),
            3 => Some(Self::Title),
            _ => None,
        }
    }
}

/// Properties a single style sets. Unset properties defer to the parent.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub font_size: Option<f32>,
    pub font_name: Option<String>,
    pub font_color: Option<Color>,
    pub baseline: Option<Baseline>,
    pub underline: Option<bool>,
    pub strikethru: Option<bool>,
    pub capitalization: Option<Capitalization>,
    pub baseline_shift: Option<f32>,
    pub outline: Option<f32>,
    pub tracking: Option<f32>,
    pub language: Option<String>,
    /// Background fill, used by slide styles.
    pub fill: Option<Color>,
}

/// A named style with an optional parent.
#[derive(Debug, Clone, Default)]
pub struct Style {
    pub name: Option<String>,
    pub parent: Option<Rc<Style>>,
    pub props: Properties,
}

impl Style {
    pub fn new(props: Properties, name: Option<String>, parent: Option<Rc<Style>>) -> Self {
        Self {
            name,
            parent,
            props,
        }
    }

    pub fn bold(&self) -> Option<bool> {
        self.props
            .bold
            .or_else(|| self.parent.as_ref().and_then(|p| p.bold()))
    }

    pub fn italic(&self) -> Option<bool> {
        self.props
            .italic
            .or_else(|| self.parent.as_ref().and_then(|p| p.italic()))
    }

    pub fn font_size(&self) -> Option<f32> {
        self.props
            .font_size
            .or_else(|| self.parent.as_ref().and_then(|p| p.font_size()))
    }

    pub fn font_name(&self) -> Option<String> {
        self.props
            .font_name
            .clone()
            .or_else(|| self.parent.as_ref().and_then(|p| p.font_name()))
    }

    pub fn font_color(&self) -> Option<Color> {
        self.props
            .font_color
            .or_else(|| self.parent.as_ref().and_then(|p| p.font_color()))
    }

    pub fn language(&self) -> Option<String> {
        self.props
            .language
            .clone()
            .or_else(|| self.parent.as_ref().and_then(|p| p.language()))
    }
}
