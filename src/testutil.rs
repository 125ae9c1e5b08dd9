//! Shared fixtures for the driver tests: wire-format field emitters, a
//! map-backed package and an index builder over a single synthetic
//! Document fragment.

use std::collections::HashMap;

use crate::object_index::ObjectIndex;
use crate::package::{Package, package_ref};
use crate::varint::encode_uvar;

/// A package backed by a name → bytes map.
pub(crate) struct MapPackage {
    members: HashMap<String, Vec<u8>>,
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

pub(crate) fn field_varint(field: u32, value: u64) -> Vec<u8> {
    let mut out = encode_uvar(u64::from(field) << 3);
    out.extend(encode_uvar(value));
    out
}

pub(crate) fn field_payload(field: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = encode_uvar(u64::from(field) << 3 | 2);
    out.extend(encode_uvar(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

pub(crate) fn field_string(field: u32, value: &str) -> Vec<u8> {
    field_payload(field, value.as_bytes())
}

pub(crate) fn field_float(field: u32, value: f32) -> Vec<u8> {
    let mut out = encode_uvar(u64::from(field) << 3 | 5);
    out.extend(value.to_le_bytes());
    out
}

/// An object reference: a nested message with the ID in field 1.
pub(crate) fn reference(field: u32, id: u32) -> Vec<u8> {
    field_payload(field, &field_varint(1, u64::from(id)))
}

/// One object record: varint header length, header message, data bytes.
pub(crate) fn record(id: u32, object_type: u32, body: &[u8]) -> Vec<u8> {
    let mut info = field_varint(1, u64::from(object_type));
    info.extend(field_varint(3, body.len() as u64));

    let mut header = field_varint(1, u64::from(id));
    header.extend(field_payload(2, &info));

    let mut out = encode_uvar(header.len() as u64);
    out.extend(header);
    out.extend_from_slice(body);
    out
}

/// Build an index whose Document fragment (fragment ID 1) holds the
/// given records. The `ids` are registered as residents of the fragment
/// so lookups trigger its scan.
pub(crate) fn index_with(ids: &[u32], records: &[Vec<u8>]) -> ObjectIndex {
    let mut fragment_entry = field_varint(1, 1);
    fragment_entry.extend(field_string(3, "Document"));
    for &id in ids {
        let mut foreign = field_varint(1, 1);
        foreign.extend(field_varint(2, u64::from(id)));
        fragment_entry.extend(field_payload(6, &foreign));
    }
    let index_body = field_payload(3, &fragment_entry);

    // stored-verbatim Snappy framing
    let mut metadata = vec![0x78, 0x00];
    metadata.extend(record(2, 0, &index_body));

    let mut document = vec![0x78, 0x00];
    for r in records {
        document.extend_from_slice(r);
    }

    let mut members = HashMap::new();
    members.insert("Index/Metadata.iwa".to_string(), metadata);
    members.insert("Index/Document.iwa".to_string(), document);
    ObjectIndex::new(package_ref(MapPackage { members }), None)
}
