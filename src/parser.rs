//! The parser driver core
//!
//! The driver walks the object graph from the document root, resolving
//! references through the object index and dispatching on object type
//! tags. Application drivers (Keynote, Numbers, Pages) build on the
//! shared pieces here: reference helpers, shape dispatch, drawable
//! decoding, text decoding and style queries.
//!
//! Acquiring an object for parsing pushes its ID onto the visited set and
//! releases it when the returned handle drops. A reference that would
//! re-enter an object currently being decoded yields nothing, so cyclic
//! documents terminate.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::collector::Collector;
use crate::geometry::{Color, Geometry, Position, Size};
use crate::message::Message;
use crate::object_index::ObjectIndex;
use crate::object_type::ObjectType;
use crate::path::{
    Path, make_arrow_path, make_callout_path, make_double_arrow_path, make_polygon_path,
    make_rounded_rectangle_path, make_star_path,
};
use crate::style::{Baseline, Capitalization, Properties, Style};
use crate::text::TextBody;

pub(crate) type StyleRef = Option<Rc<Style>>;
type StyleMap = HashMap<u32, StyleRef>;

/// Read an object reference: a nested message whose field 1 is the ID.
pub(crate) fn read_ref(msg: &Message, field: u32) -> Option<u32> {
    msg.message(field).ok()?.uint32(1).ok()?.optional()
}

/// Read a repeated object reference field, skipping damaged entries.
pub(crate) fn read_refs(msg: &Message, field: u32) -> Vec<u32> {
    match msg.message(field) {
        Ok(refs) => refs
            .iter()
            .filter_map(|m| m.uint32(1).ok().and_then(|f| f.optional()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// The first occurrence of a nested message field.
pub(crate) fn first_message(msg: &Message, field: u32) -> Option<Message> {
    msg.message(field).ok().and_then(|f| f.first().cloned())
}

/// Read a point: a nested message with float x in field 1, y in field 2.
pub(crate) fn read_position(msg: &Message, field: u32) -> Option<Position> {
    let nested = first_message(msg, field)?;
    let x = nested.float_(1).ok().and_then(|f| f.optional());
    let y = nested.float_(2).ok().and_then(|f| f.optional());
    Some(Position::new(
        f64::from(x.unwrap_or(0.0)),
        f64::from(y.unwrap_or(0.0)),
    ))
}

/// Read a size: a nested message with float width in field 1, height in
/// field 2.
pub(crate) fn read_size(msg: &Message, field: u32) -> Option<Size> {
    let nested = first_message(msg, field)?;
    let width = nested.float_(1).ok().and_then(|f| f.optional());
    let height = nested.float_(2).ok().and_then(|f| f.optional());
    Some(Size::new(
        f64::from(width.unwrap_or(0.0)),
        f64::from(height.unwrap_or(0.0)),
    ))
}

/// Read a color: gated on the presence of the nested message, with the
/// components as floats 3 to 6 of the carrying message.
pub(crate) fn read_color(msg: &Message, field: u32) -> Option<Color> {
    msg.message(field).ok()?.first()?;
    let red = msg.float_(3).ok()?.optional()?;
    let green = msg.float_(4).ok()?.optional()?;
    let blue = msg.float_(5).ok()?.optional()?;
    let alpha = msg.float_(6).ok()?.optional()?;
    Some(Color::new(red, green, blue, alpha))
}

/// Scope guard removing an ID from the visited set on drop.
struct VisitGuard {
    visited: Rc<RefCell<HashSet<u32>>>,
    id: u32,
}

impl Drop for VisitGuard {
    fn drop(&mut self) {
        self.visited.borrow_mut().remove(&self.id);
    }
}

/// An object acquired for parsing. While the handle lives, the object's
/// ID stays on the visited set.
pub(crate) struct ObjectHandle {
    message: Message,
    object_type: u32,
    _guard: VisitGuard,
}

impl ObjectHandle {
    pub(crate) fn message(&self) -> &Message {
        &self.message
    }

    pub(crate) fn object_type(&self) -> ObjectType {
        ObjectType::from_tag(self.object_type)
    }
}

/// Shared state of the binary-format drivers.
pub struct IwaParser<'a> {
    index: ObjectIndex,
    collector: &'a mut dyn Collector,
    visited: Rc<RefCell<HashSet<u32>>>,
    char_styles: StyleMap,
    para_styles: StyleMap,
    list_styles: StyleMap,
}

impl<'a> IwaParser<'a> {
    pub fn new(mut index: ObjectIndex, collector: &'a mut dyn Collector) -> Self {
        index.parse();
        Self {
            index,
            collector,
            visited: Rc::new(RefCell::new(HashSet::new())),
            char_styles: StyleMap::new(),
            para_styles: StyleMap::new(),
            list_styles: StyleMap::new(),
        }
    }

    pub(crate) fn collector(&mut self) -> &mut dyn Collector {
        &mut *self.collector
    }

    /// Acquire an object for parsing. Yields nothing when the ID cannot
    /// be resolved, when the object is already being decoded (a cycle),
    /// or when its type does not match the caller's expectation.
    pub(crate) fn object(
        &mut self,
        id: u32,
        expected: Option<ObjectType>,
    ) -> Option<ObjectHandle> {
        if self.visited.borrow().contains(&id) {
            return None;
        }

        let (object_type, message) = self.index.query_object(id)?;
        if let Some(expected) = expected
            && object_type != expected.tag()
        {
            debug!(
                "IwaParser::object: type mismatch for object {}: expected {}, got {}",
                id,
                expected.tag(),
                object_type
            );
            return None;
        }

        self.visited.borrow_mut().insert(id);
        Some(ObjectHandle {
            message,
            object_type,
            _guard: VisitGuard {
                visited: self.visited.clone(),
                id,
            },
        })
    }

    /// Decode the shape referenced by `id`, dispatching on its type tag.
    pub(crate) fn dispatch_shape(&mut self, id: u32) -> bool {
        let Some(object) = self.object(id, None) else {
            return false;
        };
        let msg = object.message().clone();

        match object.object_type() {
            ObjectType::DrawableShape => self.parse_drawable_shape(&msg),
            ObjectType::Group => self.parse_group(&msg),
            ObjectType::Image => self.parse_image(&msg),
            ObjectType::StickyNote => self.parse_sticky_note(&msg),
            ObjectType::Text => {
                // a bare text block placed directly on the container
                self.collector.start_level();
                self.collector.start_text();
                let ok = self.parse_text_body(&msg);
                self.collector.end_text();
                self.collector.end_level();
                ok
            }
            other => {
                debug!(
                    "IwaParser::dispatch_shape: unhandled object type {} ({})",
                    other.tag(),
                    other.name()
                );
                false
            }
        }
    }

    /// Decode a drawable shape: placement, the figure (one of the five
    /// path kinds) and the attached text.
    pub(crate) fn parse_drawable_shape(&mut self, msg: &Message) -> bool {
        self.collector.start_level();
        self.collector.start_text();

        let shape = first_message(msg, 1);
        if let Some(shape) = &shape {
            if let Some(placement) = first_message(shape, 1) {
                self.parse_shape_placement(&placement);
            }

            if let Some(path_msg) = first_message(shape, 3) {
                if let Some(point_path) = first_message(&path_msg, 3) {
                    self.parse_point_path(&point_path);
                } else if let Some(scalar_path) = first_message(&path_msg, 4) {
                    self.parse_scalar_path(&scalar_path);
                } else if let Some(bezier_holder) = first_message(&path_msg, 5) {
                    self.parse_bezier_path(&bezier_holder);
                } else if let Some(callout_path) = first_message(&path_msg, 6) {
                    self.parse_callout_path(&callout_path);
                } else if first_message(&path_msg, 7).is_some() {
                    debug!("IwaParser::parse_drawable_shape: connection path is not supported yet");
                } else if let Some(editable_path) = first_message(&path_msg, 8) {
                    self.parse_editable_path(&editable_path);
                }
            }
        }

        let text_ref = read_ref(msg, 2);
        if let Some(text_ref) = text_ref {
            self.parse_text(text_ref);
        }

        if shape.is_some() || text_ref.is_some() {
            self.collector.collect_shape();
        }

        self.collector.end_text();
        self.collector.end_level();
        true
    }

    /// Arrow, double arrow and star figures: a type tag, an anchor point
    /// carrying the figure parameters, and the bounding size.
    fn parse_point_path(&mut self, msg: &Message) {
        let path_type = msg.uint32(1).ok().and_then(|f| f.optional());
        let point = read_position(msg, 2);
        let size = read_size(msg, 3);
        let (Some(path_type), Some(point), Some(size)) = (path_type, point, size) else {
            return;
        };

        let path = match path_type {
            1 => make_arrow_path(size, point.x, point.y),
            10 => make_double_arrow_path(size, point.x, point.y),
            100 => make_star_path(size, point.x.round().max(3.0) as u32, point.y),
            other => {
                debug!(
                    "IwaParser::parse_drawable_shape: unknown point path type {}",
                    other
                );
                None
            }
        };
        if let Some(path) = path {
            self.collector.collect_path(&path);
        }
    }

    /// Rounded rectangle and regular polygon figures: a type tag, one
    /// scalar parameter and the bounding size.
    fn parse_scalar_path(&mut self, msg: &Message) {
        let path_type = msg.uint32(1).ok().and_then(|f| f.optional());
        let value = msg.float_(2).ok().and_then(|f| f.optional());
        let size = read_size(msg, 3);
        let (Some(path_type), Some(value), Some(size)) = (path_type, value, size) else {
            return;
        };

        let path = match path_type {
            0 => make_rounded_rectangle_path(size, f64::from(value)),
            1 => make_polygon_path(size, value.round().max(3.0) as u32),
            other => {
                debug!(
                    "IwaParser::parse_drawable_shape: unknown scalar path type {}",
                    other
                );
                None
            }
        };
        if let Some(path) = path {
            self.collector.collect_path(&path);
        }
    }

    /// An explicit bezier path: a list of typed elements. After a Close,
    /// one trailing MoveTo is ignored silently; anything else is dropped
    /// with a note.
    fn parse_bezier_path(&mut self, holder: &Message) {
        let Some(bezier) = first_message(holder, 3) else {
            return;
        };
        let Ok(elements) = bezier.message(1) else {
            return;
        };

        let mut path = Path::new();
        let mut closed = false;
        let mut closing_move = false;
        for element in &elements {
            let Some(element_type) = element.uint32(1).ok().and_then(|f| f.optional()) else {
                continue;
            };

            if closed {
                if element_type == 1 && !closing_move {
                    closing_move = true;
                } else {
                    debug!(
                        "IwaParser::parse_drawable_shape: unexpected bezier path element {} after close",
                        element_type
                    );
                }
                continue;
            }

            match element_type {
                1 | 2 => {
                    let Some(coords) = read_position(element, 2) else {
                        debug!(
                            "IwaParser::parse_drawable_shape: missing coordinates for {} element",
                            if element_type == 1 { "M" } else { "L" }
                        );
                        continue;
                    };
                    if element_type == 1 {
                        path.append_move_to(coords.x, coords.y);
                    } else {
                        path.append_line_to(coords.x, coords.y);
                    }
                }
                4 => {
                    let Ok(positions) = element.message(2) else {
                        continue;
                    };
                    if positions.len() < 3 {
                        debug!(
                            "IwaParser::parse_drawable_shape: {} is not enough coords for a curve",
                            positions.len()
                        );
                        continue;
                    }
                    if positions.len() > 3 {
                        debug!(
                            "IwaParser::parse_drawable_shape: a curve has got {} control coords",
                            positions.len()
                        );
                    }
                    let coord = |i: usize, field: u32| -> f64 {
                        positions
                            .get(i)
                            .and_then(|p| p.float_(field).ok())
                            .and_then(|f| f.optional())
                            .map_or(0.0, f64::from)
                    };
                    path.append_curve_to(
                        coord(0, 1),
                        coord(0, 2),
                        coord(1, 1),
                        coord(1, 2),
                        coord(2, 1),
                        coord(2, 2),
                    );
                }
                5 => {
                    path.append_close();
                    closed = true;
                }
                other => {
                    debug!(
                        "IwaParser::parse_drawable_shape: unknown bezier path element type {}",
                        other
                    );
                }
            }
        }

        self.collector.collect_path(&path);
    }

    /// A callout figure: bounding size, tail position and size, optional
    /// corner radius.
    fn parse_callout_path(&mut self, msg: &Message) {
        let size = read_size(msg, 1);
        let tail_position = read_position(msg, 2);
        let tail_size = msg.float_(3).ok().and_then(|f| f.optional());
        let (Some(size), Some(tail_position), Some(tail_size)) = (size, tail_position, tail_size)
        else {
            return;
        };

        let corner_radius = msg
            .float_(4)
            .ok()
            .and_then(|f| f.optional())
            .unwrap_or(0.0);
        // the tail-at-center flag travels with the figure but does not
        // change its outline
        let _tail_at_center = msg
            .bool_(5)
            .ok()
            .and_then(|f| f.optional())
            .unwrap_or(false);

        if let Some(path) = make_callout_path(
            size,
            f64::from(corner_radius),
            f64::from(tail_size),
            tail_position.x,
            tail_position.y,
        ) {
            self.collector.collect_path(&path);
        }
    }

    /// An editable path: nodes of three control points each. Nodes whose
    /// control points coincide contribute straight segments; the others
    /// contribute cubic segments through the neighbouring handles.
    fn parse_editable_path(&mut self, msg: &Message) {
        let Some(path_points) = first_message(msg, 1) else {
            return;
        };
        let Ok(nodes) = path_points.message(1) else {
            return;
        };
        if nodes.is_empty() {
            return;
        }

        let mut path = Path::new();
        let mut prev: Option<(Position, Position)> = None;
        for (i, node) in nodes.iter().enumerate() {
            let point1 = read_position(node, 1);
            let point2 = read_position(node, 2);
            let point3 = read_position(node, 3);
            if point1.is_none() && point2.is_none() && point3.is_none() {
                debug!(
                    "IwaParser::parse_drawable_shape: no control points for point {}",
                    i
                );
                continue;
            }

            let anchor = point2.or(point1).or(point3).unwrap_or_default();
            let degenerate = same_point(point1, point2) && same_point(point2, point3);

            match prev {
                None => path.append_move_to(anchor.x, anchor.y),
                Some((_, prev_out)) => {
                    if degenerate {
                        path.append_line_to(anchor.x, anchor.y);
                    } else {
                        let incoming = point1.unwrap_or(anchor);
                        path.append_curve_to(
                            prev_out.x,
                            prev_out.y,
                            incoming.x,
                            incoming.y,
                            anchor.x,
                            anchor.y,
                        );
                    }
                }
            }
            prev = Some((anchor, point3.unwrap_or(anchor)));
        }

        if path_points
            .bool_(2)
            .ok()
            .and_then(|f| f.optional())
            .unwrap_or(false)
        {
            path.append_close();
        }
        self.collector.collect_path(&path);
    }

    /// Decode a group: its placement and its member shapes.
    pub(crate) fn parse_group(&mut self, msg: &Message) -> bool {
        if let Some(placement) = first_message(msg, 1) {
            self.parse_shape_placement(&placement);
        }

        let children = read_refs(msg, 2);
        if !children.is_empty() {
            self.collector.start_level();
            self.collector.start_group();
            for child in children {
                self.dispatch_shape(child);
            }
            self.collector.end_group();
            self.collector.end_level();
        }

        true
    }

    /// Decode an image drawable: placement and the media stream resolved
    /// through the file-data table.
    pub(crate) fn parse_image(&mut self, msg: &Message) -> bool {
        self.collector.start_level();

        if let Some(placement) = first_message(msg, 1) {
            self.parse_shape_placement(&placement);
        }

        let data = read_ref(msg, 3).and_then(|file_id| self.index.query_file(file_id));
        self.collector.collect_image(data.as_ref());

        self.collector.end_level();
        true
    }

    /// Decode a sticky note: a text or comment reference wrapped in a
    /// level of its own.
    pub(crate) fn parse_sticky_note(&mut self, msg: &Message) -> bool {
        self.collector.start_level();

        if let Some(inner) = first_message(msg, 1) {
            if let Some(text_ref) = read_ref(&inner, 2) {
                self.collector.start_text();
                self.parse_text(text_ref);
                self.collector.end_text();
            }
        } else if let Some(comment_ref) = read_ref(msg, 2) {
            self.collector.start_text();
            self.parse_comment(comment_ref);
            self.collector.end_text();
        }

        self.collector.collect_sticky_note();
        self.collector.end_level();
        true
    }

    fn parse_comment(&mut self, id: u32) -> bool {
        let Some(object) = self.object(id, None) else {
            return false;
        };
        let msg = object.message().clone();
        match read_ref(&msg, 1) {
            Some(text_ref) => self.parse_text(text_ref),
            None => false,
        }
    }

    /// Decode shape placement: geometry in the nested message 1
    /// (position, size, transformation flags, rotation angle), the
    /// aspect-ratio lock on the carrying message.
    pub(crate) fn parse_shape_placement(&mut self, msg: &Message) -> Geometry {
        let mut geometry = Geometry::default();

        if let Some(g) = first_message(msg, 1) {
            if let Some(position) = read_position(&g, 1) {
                geometry.position = position;
            }
            if let Some(size) = read_size(&g, 2) {
                geometry.natural_size = size;
                geometry.size = size;
            }

            if let Some(flags) = g.uint32(3).ok().and_then(|f| f.optional()) {
                match flags {
                    3 => {} // normal
                    7 => geometry.horizontal_flip = Some(true),
                    other => {
                        debug!(
                            "IwaParser::parse_shape_placement: unknown transformation {}",
                            other
                        );
                    }
                }
            }
            if let Some(angle) = g.float_(4).ok().and_then(|f| f.optional()) {
                geometry.angle = Some(f64::from(angle).to_radians());
            }
        }
        geometry.aspect_ratio_locked = msg.bool_(7).ok().and_then(|f| f.optional());

        self.collector.collect_geometry(&geometry);
        geometry
    }

    /// Decode a text object: the UTF-8 payload in field 3 and the five
    /// style range maps.
    pub(crate) fn parse_text(&mut self, id: u32) -> bool {
        let Some(object) = self.object(id, Some(ObjectType::Text)) else {
            return false;
        };
        let msg = object.message().clone();
        self.parse_text_body(&msg)
    }

    fn parse_text_body(&mut self, msg: &Message) -> bool {
        let Some(text) = msg.string(3).ok().and_then(|f| f.optional()) else {
            return true;
        };
        let length = text.chars().count() as u32;
        let mut body = TextBody::new(text);

        let mut paras = BTreeMap::new();
        for (offset, style_ref) in range_entries(msg, 5, length) {
            let style = style_ref.and_then(|style_ref| self.query_paragraph_style(style_ref));
            paras.insert(offset, style);
        }
        body.set_paragraphs(paras);

        let mut spans = BTreeMap::new();
        for (offset, style_ref) in range_entries(msg, 8, length) {
            let style = style_ref.and_then(|style_ref| self.query_character_style(style_ref));
            spans.insert(offset, style);
        }
        body.set_spans(spans);

        let mut langs = BTreeMap::new();
        if let Ok(table) = msg.message(19) {
            if let Ok(entries) = table.message(1) {
                for entry in &entries {
                    let offset = entry.uint32(1).ok().and_then(|f| f.optional());
                    if let Some(offset) = offset
                        && offset < length
                    {
                        let lang = entry
                            .string(2)
                            .ok()
                            .and_then(|f| f.optional())
                            .unwrap_or_default();
                        langs.insert(offset, lang);
                    }
                }
            }
        }
        body.set_languages(langs);

        let mut lists = BTreeMap::new();
        for (offset, style_ref) in range_entries(msg, 11, length) {
            let style = style_ref.and_then(|style_ref| self.query_list_style(style_ref));
            lists.insert(offset, style);
        }
        body.set_lists(lists);

        let mut levels = BTreeMap::new();
        if let Ok(table) = msg.message(16) {
            if let Ok(entries) = table.message(1) {
                for entry in &entries {
                    let offset = entry.uint32(1).ok().and_then(|f| f.optional());
                    let level = entry.uint32(2).ok().and_then(|f| f.optional());
                    if let (Some(offset), Some(level)) = (offset, level)
                        && offset < length
                    {
                        levels.insert(offset, level);
                    }
                }
            }
        }
        body.set_list_levels(levels);

        body.parse(self.collector);
        true
    }

    pub(crate) fn query_character_style(&mut self, id: u32) -> StyleRef {
        if let Some(style) = self.char_styles.get(&id) {
            return style.clone();
        }
        let style = self.parse_character_style(id);
        self.char_styles.insert(id, style.clone());
        style
    }

    pub(crate) fn query_paragraph_style(&mut self, id: u32) -> StyleRef {
        if let Some(style) = self.para_styles.get(&id) {
            return style.clone();
        }
        let style = self.parse_paragraph_style(id);
        self.para_styles.insert(id, style.clone());
        style
    }

    pub(crate) fn query_list_style(&mut self, id: u32) -> StyleRef {
        if let Some(style) = self.list_styles.get(&id) {
            return style.clone();
        }
        let style = self.parse_list_style(id);
        self.list_styles.insert(id, style.clone());
        style
    }

    fn parse_character_style(&mut self, id: u32) -> StyleRef {
        let object = self.object(id, Some(ObjectType::CharacterStyle))?;
        let msg = object.message().clone();

        let (name, parent) = self.parse_style_info(&msg, Self::query_character_style);

        let mut props = Properties::default();
        if let Some(properties) = first_message(&msg, 11) {
            parse_character_properties(&properties, &mut props);
        }

        Some(Rc::new(Style::new(props, name, parent)))
    }

    fn parse_paragraph_style(&mut self, id: u32) -> StyleRef {
        let object = self.object(id, Some(ObjectType::ParagraphStyle))?;
        let msg = object.message().clone();

        let (name, parent) = self.parse_style_info(&msg, Self::query_paragraph_style);

        let mut props = Properties::default();
        if let Some(properties) = first_message(&msg, 11) {
            parse_character_properties(&properties, &mut props);
        }
        // TODO: decode the paragraph property block (message 12:
        // alignment, spacing, margins) once a consumer asks for it

        Some(Rc::new(Style::new(props, name, parent)))
    }

    fn parse_list_style(&mut self, id: u32) -> StyleRef {
        let object = self.object(id, Some(ObjectType::ListStyle))?;
        let msg = object.message().clone();

        let (name, parent) = self.parse_style_info(&msg, Self::query_list_style);
        Some(Rc::new(Style::new(Properties::default(), name, parent)))
    }

    /// Name and parent reference from the common style-info message.
    fn parse_style_info(
        &mut self,
        msg: &Message,
        query_parent: fn(&mut Self, u32) -> StyleRef,
    ) -> (Option<String>, StyleRef) {
        let Some(info) = first_message(msg, 1) else {
            return (None, None);
        };
        let name = info.string(2).ok().and_then(|f| f.optional());
        let parent = read_ref(&info, 3).and_then(|parent_ref| query_parent(self, parent_ref));
        (name, parent)
    }
}

/// Collect (offset, style reference) pairs from a style range table: a
/// message whose field 1 repeats entries of offset (field 1) and style
/// reference (field 2). Offsets past the text length are dropped.
fn range_entries(msg: &Message, field: u32, length: u32) -> Vec<(u32, Option<u32>)> {
    let Ok(table) = msg.message(field) else {
        return Vec::new();
    };
    let Ok(entries) = table.message(1) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let offset = entry.uint32(1).ok().and_then(|f| f.optional())?;
            if offset >= length && offset != 0 {
                return None;
            }
            Some((offset, read_ref(entry, 2)))
        })
        .collect()
}

fn same_point(left: Option<Position>, right: Option<Position>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => {
            crate::geometry::approx_equal(left.x, right.x)
                && crate::geometry::approx_equal(left.y, right.y)
        }
        _ => true,
    }
}

/// Decode the character property block shared by character and paragraph
/// styles.
fn parse_character_properties(msg: &Message, props: &mut Properties) {
    let get_bool = |field: u32| msg.bool_(field).ok().and_then(|f| f.optional());
    let get_float = |field: u32| msg.float_(field).ok().and_then(|f| f.optional());
    let get_u32 = |field: u32| msg.uint32(field).ok().and_then(|f| f.optional());

    if let Some(bold) = get_bool(1) {
        props.bold = Some(bold);
    }
    if let Some(italic) = get_bool(2) {
        props.italic = Some(italic);
    }
    if let Some(size) = get_float(3) {
        props.font_size = Some(size);
    }
    if let Some(name) = msg.string(5).ok().and_then(|f| f.optional()) {
        props.font_name = Some(name);
    }
    if let Some(color) = read_color(msg, 7) {
        props.font_color = Some(color);
    }
    if let Some(baseline) = get_u32(10) {
        props.baseline = Baseline::convert(baseline);
    }
    if let Some(underline) = get_bool(11) {
        props.underline = Some(underline);
    }
    if let Some(strikethru) = get_bool(12) {
        props.strikethru = Some(strikethru);
    }
    if let Some(capitalization) = get_u32(13) {
        props.capitalization = Capitalization::convert(capitalization);
    }
    if let Some(shift) = get_float(14) {
        props.baseline_shift = Some(shift);
    }
    if let Some(outline) = get_float(19) {
        props.outline = Some(outline);
    }
    if let Some(tracking) = get_float(27) {
        props.tracking = Some(tracking);
    }
}
