//! The object index
//!
//! Objects reference each other by a document-wide numeric ID. The index
//! maps every ID to the fragment file holding it and to the byte range of
//! its record there. It is bootstrapped from `Index/Metadata.iwa`, whose
//! object #2 lists the fragment files, the embedded file data and an
//! optional color palette indirection.
//!
//! Fragments are decompressed and scanned lazily on the first lookup that
//! needs them. Damage inside a record stops the scan of that fragment;
//! objects already scanned, and objects in other fragments, stay
//! reachable.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::debug;

use crate::geometry::Color;
use crate::message::Message;
use crate::package::PackageRef;
use crate::parser::{read_color, read_ref};
use crate::snappy::SnappyStream;
use crate::stream::{MemoryStream, SeekWhence};
use crate::varint::read_uvar;

/// Location of one object inside a scanned fragment.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    /// The decompressed fragment holding the record.
    pub stream: MemoryStream,
    /// Raw type tag declared by the first data-info entry.
    pub object_type: u32,
    pub header_range: (usize, usize),
    pub data_range: (usize, usize),
}

impl ObjectRecord {
    fn new(
        stream: MemoryStream,
        object_type: u32,
        pos: usize,
        header_len: usize,
        data_len: usize,
    ) -> Self {
        let header_range = (pos, pos + header_len);
        let data_range = (header_range.1, header_range.1 + data_len);
        Self {
            stream,
            object_type,
            header_range,
            data_range,
        }
    }
}

/// The document-wide object, file and color tables.
pub struct ObjectIndex {
    fragments: PackageRef,
    package: Option<PackageRef>,
    /// Fragment files registered but not scanned yet, by fragment ID.
    unparsed_fragments: HashMap<u32, String>,
    /// Object ID to (resident fragment ID, record once scanned).
    fragment_object_map: HashMap<u32, (u32, Option<ObjectRecord>)>,
    /// File data ID to (package path, lazily opened stream).
    file_map: HashMap<u32, (String, Option<MemoryStream>)>,
    file_color_map: HashMap<u32, Color>,
    /// The palette object named by the root index, scanned on first use.
    color_map_root: Option<u32>,
    color_map_scanned: bool,
}

const METADATA_FRAGMENT: u32 = 2;

impl ObjectIndex {
    pub fn new(fragments: PackageRef, package: Option<PackageRef>) -> Self {
        Self {
            fragments,
            package,
            unparsed_fragments: HashMap::new(),
            fragment_object_map: HashMap::new(),
            file_map: HashMap::new(),
            file_color_map: HashMap::new(),
            color_map_root: None,
            color_map_scanned: false,
        }
    }

    /// Bootstrap the index from `Index/Metadata.iwa`.
    pub fn parse(&mut self) {
        self.unparsed_fragments
            .insert(METADATA_FRAGMENT, "Index/Metadata.iwa".to_string());
        self.fragment_object_map
            .insert(METADATA_FRAGMENT, (METADATA_FRAGMENT, None));
        self.scan_fragment(METADATA_FRAGMENT);

        let record = match self.fragment_object_map.get(&METADATA_FRAGMENT) {
            Some((_, Some(record))) => record.clone(),
            _ => {
                debug!("ObjectIndex::parse: object index is broken, nothing will be parsed");
                return;
            }
        };

        let object_index =
            Message::from_range(&record.stream, record.data_range.0, record.data_range.1);

        if let Ok(fragments) = object_index.message(3) {
            for fragment in &fragments {
                let id = fragment.uint32(1).ok().and_then(|f| f.optional());
                let name = fragment
                    .string(3)
                    .ok()
                    .and_then(|f| f.optional())
                    .or_else(|| fragment.string(2).ok().and_then(|f| f.optional()));
                if let (Some(id), Some(name)) = (id, name) {
                    self.unparsed_fragments
                        .insert(id, format!("Index/{}.iwa", name));
                    self.fragment_object_map.entry(id).or_insert((id, None));
                }

                if let Ok(refs) = fragment.message(6) {
                    for foreign in &refs {
                        let fragment_id = foreign.uint32(1).ok().and_then(|f| f.optional());
                        let object_id = foreign.uint32(2).ok().and_then(|f| f.optional());
                        if let (Some(fragment_id), Some(object_id)) = (fragment_id, object_id) {
                            self.fragment_object_map
                                .entry(object_id)
                                .or_insert((fragment_id, None));
                        }
                    }
                }
            }
        }

        if self.package.is_some()
            && let Ok(files) = object_index.message(4)
        {
            for file in &files {
                let Some(id) = file.uint32(1).ok().and_then(|f| f.optional()) else {
                    continue;
                };
                let virtual_path = file
                    .string(3)
                    .ok()
                    .and_then(|f| f.optional())
                    .map(|name| format!("Data/{}", name));
                let internal_path = file
                    .string(4)
                    .ok()
                    .and_then(|f| f.optional())
                    .map(|name| format!("Data/{}", name));

                let path = [internal_path, virtual_path]
                    .into_iter()
                    .flatten()
                    .find(|path| self.package_member_exists(path));
                if let Some(path) = path {
                    self.file_map.insert(id, (path, None));
                }
            }
        }

        // the color palette indirection
        let replace_id = object_index.uint32(1).ok().and_then(|f| f.optional());
        let replace_ref = object_index
            .message(10)
            .ok()
            .and_then(|f| f.uint32(1).ok())
            .and_then(|f| f.optional());
        if let (Some(id), Some(reference)) = (replace_id, replace_ref)
            && id != reference
        {
            debug!(
                "ObjectIndex::parse: replace id {} is different from replace ref {}",
                id, reference
            );
        }
        self.color_map_root = replace_ref.or(replace_id);
    }

    /// Look up an object, scanning its resident fragment if needed.
    /// Returns the raw type tag and a message view of the object body.
    pub fn query_object(&mut self, id: u32) -> Option<(u32, Message)> {
        let pending_fragment = match self.fragment_object_map.get(&id) {
            None => {
                debug!("ObjectIndex::query_object: object {} not found", id);
                return None;
            }
            Some((fragment_id, record)) => record.is_none().then_some(*fragment_id),
        };
        if let Some(fragment_id) = pending_fragment {
            self.scan_fragment(fragment_id);
        }

        match self.fragment_object_map.get(&id) {
            Some((_, Some(record))) => Some((
                record.object_type,
                Message::from_range(&record.stream, record.data_range.0, record.data_range.1),
            )),
            _ => None,
        }
    }

    /// The raw type tag of an object, if it can be resolved.
    pub fn object_type(&mut self, id: u32) -> Option<u32> {
        self.query_object(id).map(|(object_type, _)| object_type)
    }

    /// Open the embedded file with the given file-data ID. The stream is
    /// opened on first use and cached.
    pub fn query_file(&mut self, id: u32) -> Option<MemoryStream> {
        let Some((path, cached)) = self.file_map.get_mut(&id) else {
            debug!("ObjectIndex::query_file: file {} not found", id);
            return None;
        };

        if cached.is_none() {
            let package = self.package.as_ref()?;
            match package.borrow_mut().open(path) {
                Ok(data) => *cached = Some(MemoryStream::new(data)),
                Err(e) => {
                    debug!("ObjectIndex::query_file: cannot open {}: {}", path, e);
                    return None;
                }
            }
        }

        cached.clone()
    }

    /// Resolve a palette reference to a color. The palette object is
    /// scanned on the first call.
    pub fn query_file_color(&mut self, id: u32) -> Option<Color> {
        if !self.color_map_scanned {
            self.color_map_scanned = true;
            if let Some(root) = self.color_map_root {
                self.scan_color_file_map(root);
            }
        }

        let color = self.file_color_map.get(&id).copied();
        if color.is_none() {
            debug!("ObjectIndex::query_file_color: cannot find color for {}", id);
        }
        color
    }

    fn package_member_exists(&self, path: &str) -> bool {
        self.package
            .as_ref()
            .is_some_and(|package| package.borrow().exists(path))
    }

    /// Decompress and scan a registered fragment file.
    fn scan_fragment(&mut self, id: u32) {
        let Some(path) = self.unparsed_fragments.remove(&id) else {
            return;
        };

        let data = match self.fragments.borrow_mut().open(&path) {
            Ok(data) => data,
            Err(_) => {
                debug!("ObjectIndex::scan_fragment: file {} does not exist", path);
                return;
            }
        };

        match SnappyStream::decompress(&data) {
            Ok(stream) => self.scan_fragment_stream(id, &stream.into_stream()),
            Err(e) => {
                debug!("ObjectIndex::scan_fragment: cannot decompress {}: {}", path, e);
            }
        }
    }

    /// Scan the object records of a decompressed fragment. Each record is
    /// a varint header length, the header message, and the data bytes
    /// whose total length the header declares.
    fn scan_fragment_stream(&mut self, id: u32, stream: &MemoryStream) {
        let mut cursor = stream.clone();

        while !cursor.is_end() {
            let Ok(header_len) = read_uvar(&mut cursor) else {
                break;
            };
            let start = cursor.tell();
            if header_len > (stream.len() - start) as u64 {
                break;
            }
            let header = Message::from_range(stream, start, start + header_len as usize);

            let Ok(infos) = header.message(2) else {
                break;
            };
            let mut data_len: u64 = 0;
            let mut object_type = None;
            let mut ok = true;
            for info in &infos {
                match info.uint64(3).ok().and_then(|f| f.optional()) {
                    None => {
                        ok = false;
                        break;
                    }
                    Some(length) => data_len += length,
                }
                if object_type.is_none() {
                    // normally, all data infos declare the same type
                    object_type = info.uint32(1).ok().and_then(|f| f.optional());
                }
            }
            if !ok {
                break;
            }

            if let Some(object_id) = header.uint32(1).ok().and_then(|f| f.optional()) {
                let record = ObjectRecord::new(
                    stream.clone(),
                    object_type.unwrap_or(0),
                    start,
                    header_len as usize,
                    data_len as usize,
                );
                match self.fragment_object_map.entry(object_id) {
                    Entry::Occupied(mut entry) => {
                        if entry.get().1.is_some() {
                            debug!(
                                "ObjectIndex::scan_fragment: duplicate record for object {} ignored",
                                object_id
                            );
                        } else {
                            *entry.get_mut() = (id, Some(record));
                        }
                    }
                    Entry::Vacant(entry) => {
                        entry.insert((id, Some(record)));
                    }
                }
            }

            let Some(next) = (start as u64)
                .checked_add(header_len)
                .and_then(|pos| pos.checked_add(data_len))
            else {
                break;
            };
            if cursor.seek(next as i64, SeekWhence::Set).is_err() {
                break;
            }
        }

        // remove all objects from the fragment that have not been found
        self.fragment_object_map.retain(|object_id, entry| {
            let missing = entry.0 == id && entry.1.is_none();
            if missing {
                debug!(
                    "ObjectIndex::scan_fragment: object with ID {} was not found",
                    object_id
                );
            }
            !missing
        });
    }

    /// Read the palette object: a repeated correspondence in field 1,
    /// each carrying the palette ID and a reference to a color object.
    fn scan_color_file_map(&mut self, id: u32) {
        let Some((_, msg)) = self.query_object(id) else {
            debug!("ObjectIndex::scan_color_file_map: cannot find object {}", id);
            return;
        };

        let Ok(correspondences) = msg.message(1) else {
            return;
        };
        for correspondence in &correspondences {
            let palette_id = correspondence.uint32(1).ok().and_then(|f| f.optional());
            let color_ref = read_ref(correspondence, 2);
            let (Some(palette_id), Some(color_ref)) = (palette_id, color_ref) else {
                debug!("ObjectIndex::scan_color_file_map: cannot parse some correspondences");
                continue;
            };
            if let Some(color) = self.scan_color_correspondence(color_ref) {
                self.file_color_map.insert(palette_id, color);
            }
        }
    }

    fn scan_color_correspondence(&mut self, id: u32) -> Option<Color> {
        let (_, msg) = self.query_object(id)?;
        read_color(&msg, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Package, package_ref};
    use crate::varint::encode_uvar;
    use std::collections::HashMap as Map;

    /// A package backed by a name → bytes map.
    struct MapPackage {
        members: Map<String, Vec<u8>>,
    }

    impl MapPackage {
        fn new(members: &[(&str, Vec<u8>)]) -> Self {
            Self {
                members: members
                    .iter()
                    .map(|(name, data)| (name.to_string(), data.clone()))
                    .collect(),
            }
        }
    }

    impl Package for MapPackage {
        fn exists(&self, name: &str) -> bool {
            self.members.contains_key(name)
        }

        fn open(&mut self, name: &str) -> crate::Result<Vec<u8>> {
            self.members
                .get(name)
                .cloned()
                .ok_or_else(|| crate::Error::Package(format!("no member {}", name)))
        }
    }

    fn field_varint(field: u32, value: u64) -> Vec<u8> {
        let mut out = encode_uvar(u64::from(field) << 3);
        out.extend(encode_uvar(value));
        out
    }

    fn field_payload(field: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = encode_uvar(u64::from(field) << 3 | 2);
        out.extend(encode_uvar(payload.len() as u64));
        out.extend_from_slice(payload);
        out
    }

    fn field_string(field: u32, value: &str) -> Vec<u8> {
        field_payload(field, value.as_bytes())
    }

    /// One object record: varint header length, header message, data.
    fn object_record(id: u32, object_type: u32, body: &[u8]) -> Vec<u8> {
        let mut info = field_varint(1, u64::from(object_type));
        info.extend(field_varint(3, body.len() as u64));

        let mut header = field_varint(1, u64::from(id));
        header.extend(field_payload(2, &info));

        let mut out = encode_uvar(header.len() as u64);
        out.extend(header);
        out.extend_from_slice(body);
        out
    }

    /// Wrap raw fragment bytes in the stored-verbatim Snappy framing.
    fn stored_fragment(records: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0x78, 0x00];
        for record in records {
            out.extend_from_slice(record);
        }
        out
    }

    /// A metadata fragment whose index object registers the given
    /// fragments and files.
    fn metadata(index_body: &[u8]) -> Vec<u8> {
        stored_fragment(&[object_record(2, 0, index_body)])
    }

    fn fragment_entry(id: u32, name: &str) -> Vec<u8> {
        let mut entry = field_varint(1, u64::from(id));
        entry.extend(field_string(3, name));
        field_payload(3, &entry)
    }

    #[test]
    fn test_bootstrap_and_lazy_fragment_scan() {
        let index_body = fragment_entry(1, "Document");
        let doc_fragment = stored_fragment(&[
            object_record(1, 1, &field_varint(7, 42)),
            object_record(8, 2011, &[]),
        ]);

        let fragments = package_ref(MapPackage::new(&[
            ("Index/Metadata.iwa", metadata(&index_body)),
            ("Index/Document.iwa", doc_fragment),
        ]));
        let mut index = ObjectIndex::new(fragments, None);
        index.parse();

        let (object_type, msg) = index.query_object(1).unwrap();
        assert_eq!(object_type, 1);
        assert_eq!(msg.uint64(7).unwrap().optional(), Some(42));

        assert_eq!(index.object_type(8), Some(2011));
        assert!(index.query_object(99).is_none());
    }

    #[test]
    fn test_foreign_references_resolve_across_fragments() {
        // fragment 4 lists object 8 as resident in fragment 5
        let mut frag4 = fragment_entry(4, "Document");
        let mut foreign = field_varint(1, 5);
        foreign.extend(field_varint(2, 8));
        let mut entry5 = field_varint(1, 5);
        entry5.extend(field_string(3, "Slide"));
        entry5.extend(field_payload(6, &foreign));
        frag4.extend(field_payload(3, &entry5));

        let slide_fragment = stored_fragment(&[object_record(8, 5, &[])]);

        let fragments = package_ref(MapPackage::new(&[
            ("Index/Metadata.iwa", metadata(&frag4)),
            ("Index/Document.iwa", stored_fragment(&[])),
            ("Index/Slide.iwa", slide_fragment),
        ]));
        let mut index = ObjectIndex::new(fragments, None);
        index.parse();

        assert_eq!(index.object_type(8), Some(5));
    }

    #[test]
    fn test_duplicate_record_is_ignored() {
        let index_body = fragment_entry(1, "Document");
        let doc_fragment = stored_fragment(&[
            object_record(1, 1, &field_varint(2, 10)),
            object_record(1, 2011, &field_varint(2, 20)),
        ]);

        let fragments = package_ref(MapPackage::new(&[
            ("Index/Metadata.iwa", metadata(&index_body)),
            ("Index/Document.iwa", doc_fragment),
        ]));
        let mut index = ObjectIndex::new(fragments, None);
        index.parse();

        // the first record wins
        let (object_type, msg) = index.query_object(1).unwrap();
        assert_eq!(object_type, 1);
        assert_eq!(msg.uint32(2).unwrap().optional(), Some(10));
    }

    #[test]
    fn test_damaged_record_stops_scan_but_keeps_earlier_objects() {
        let good = object_record(1, 1, &[]);
        // a record whose header length runs past the fragment end
        let mut bad = encode_uvar(1000);
        bad.extend_from_slice(&[0x08]);
        let doc_fragment = stored_fragment(&[good, bad]);

        let fragments = package_ref(MapPackage::new(&[
            ("Index/Metadata.iwa", metadata(&fragment_entry(1, "Document"))),
            ("Index/Document.iwa", doc_fragment),
        ]));
        let mut index = ObjectIndex::new(fragments, None);
        index.parse();

        assert_eq!(index.object_type(1), Some(1));
    }

    #[test]
    fn test_file_map_prefers_internal_path() {
        let mut file_both = field_varint(1, 11);
        file_both.extend(field_string(3, "virtual.png"));
        file_both.extend(field_string(4, "internal.png"));
        let mut file_virtual_only = field_varint(1, 12);
        file_virtual_only.extend(field_string(3, "only.png"));

        let mut index_body = fragment_entry(4, "Document");
        index_body.extend(field_payload(4, &file_both));
        index_body.extend(field_payload(4, &file_virtual_only));

        let fragments = package_ref(MapPackage::new(&[
            ("Index/Metadata.iwa", metadata(&index_body)),
            ("Index/Document.iwa", stored_fragment(&[])),
        ]));
        let package = package_ref(MapPackage::new(&[
            ("Data/virtual.png", b"virtual".to_vec()),
            ("Data/internal.png", b"internal".to_vec()),
            ("Data/only.png", b"only".to_vec()),
        ]));

        let mut index = ObjectIndex::new(fragments, Some(package));
        index.parse();

        assert_eq!(index.query_file(11).unwrap().as_slice(), b"internal");
        assert_eq!(index.query_file(12).unwrap().as_slice(), b"only");
        assert!(index.query_file(13).is_none());
    }

    #[test]
    fn test_color_palette_indirection() {
        // the index names object 20 as the palette; its entry 1 maps
        // palette ID 3 to color object 21
        let mut correspondence = field_varint(1, 3);
        correspondence.extend(field_payload(2, &field_varint(1, 21)));

        let mut index_body = fragment_entry(4, "Document");
        index_body.extend(field_payload(10, &field_varint(1, 20)));

        let palette_body = field_payload(1, &correspondence);

        // a color object: gate message in field 1, components in 3..6
        let mut color_body = field_payload(1, &[]);
        for (field, value) in [(3u32, 1.0f32), (4, 0.5), (5, 0.25), (6, 1.0)] {
            color_body.extend(encode_uvar(u64::from(field) << 3 | 5));
            color_body.extend(value.to_le_bytes());
        }

        // the palette and its colors reside in the metadata fragment
        let metadata_fragment = stored_fragment(&[
            object_record(2, 0, &index_body),
            object_record(20, 0, &palette_body),
            object_record(21, 0, &color_body),
        ]);

        let fragments = package_ref(MapPackage::new(&[
            ("Index/Metadata.iwa", metadata_fragment),
            ("Index/Document.iwa", stored_fragment(&[])),
        ]));
        let mut index = ObjectIndex::new(fragments, None);
        index.parse();

        let color = index.query_file_color(3).unwrap();
        assert_eq!(color.red, 1.0);
        assert_eq!(color.green, 0.5);
        assert_eq!(color.blue, 0.25);
        assert_eq!(color.alpha, 1.0);

        assert!(index.query_file_color(9).is_none());
    }
}
