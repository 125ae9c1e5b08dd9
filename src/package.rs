//! Package access
//!
//! An iWork document is a package: a set of named member streams. Packages
//! come in three shapes — a single ZIP file, an on-disk directory bundle
//! (`Index.zip` + `Metadata/` + `Data/`), and an inner ZIP wrapped inside
//! another package (`Index.zip`). The [`Package`] trait abstracts over all
//! of them; member names always use `/` separators.

use std::cell::RefCell;
use std::fs;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::rc::Rc;

use flate2::read::{GzDecoder, ZlibDecoder};
use zip::ZipArchive;

use crate::{Error, Result};

/// A read-only package of named member streams.
pub trait Package {
    /// Whether the input has named members at all. Raw streams handed
    /// directly to the importer are not structured.
    fn is_structured(&self) -> bool {
        true
    }

    /// Whether a member of that name exists.
    fn exists(&self, name: &str) -> bool;

    /// Read a member completely.
    fn open(&mut self, name: &str) -> Result<Vec<u8>>;
}

/// Shared handle to a package.
///
/// Detection hands the same underlying package to both the fragment source
/// and the media resolver, so packages are reference-counted.
pub type PackageRef = Rc<RefCell<dyn Package>>;

/// Wrap a concrete package into a shared handle.
pub fn package_ref<P: Package + 'static>(package: P) -> PackageRef {
    Rc::new(RefCell::new(package))
}

/// A ZIP archive held in memory.
pub struct ZipPackage {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl ZipPackage {
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::Package(format!("not a ZIP archive: {}", e)))?;
        Ok(Self { archive })
    }
}

impl Package for ZipPackage {
    fn exists(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    fn open(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(name)
            .map_err(|e| Error::Package(format!("cannot open member {}: {}", name, e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// An on-disk directory bundle.
pub struct DirPackage {
    root: PathBuf,
}

impl DirPackage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn member_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in name.split('/') {
            path.push(part);
        }
        path
    }
}

impl Package for DirPackage {
    fn exists(&self, name: &str) -> bool {
        self.member_path(name).is_file()
    }

    fn open(&mut self, name: &str) -> Result<Vec<u8>> {
        fs::read(self.member_path(name)).map_err(Error::Io)
    }
}

/// A view of a package rooted at a sub-path. Lookups delegate to the
/// parent with the root prefixed.
pub struct SubPackage {
    parent: PackageRef,
    root: String,
}

impl SubPackage {
    pub fn new(parent: PackageRef, root: &str) -> Self {
        let root = if root.is_empty() || root.ends_with('/') {
            root.to_string()
        } else {
            format!("{}/", root)
        };
        Self { parent, root }
    }
}

impl Package for SubPackage {
    fn exists(&self, name: &str) -> bool {
        self.parent.borrow().exists(&format!("{}{}", self.root, name))
    }

    fn open(&mut self, name: &str) -> Result<Vec<u8>> {
        self.parent
            .borrow_mut()
            .open(&format!("{}{}", self.root, name))
    }
}

/// Decompress a gzip member (`index.apxl.gz` and friends).
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Package(format!("gzip member damaged: {}", e)))?;
    Ok(out)
}

/// Inflate a zlib-wrapped stream, used when probing unstructured inputs.
pub fn zlib_inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Package(format!("not a zlib stream: {}", e)))?;
    Ok(out)
}

/// Read the application name recorded in `Metadata/Properties.plist`,
/// when the package carries one.
pub fn application_hint(package: &mut dyn Package) -> Option<String> {
    const PROPERTIES: &str = "Metadata/Properties.plist";
    if !package.exists(PROPERTIES) {
        return None;
    }
    let data = package.open(PROPERTIES).ok()?;
    let value = plist::Value::from_reader(Cursor::new(data)).ok()?;
    let dict = value.as_dictionary()?;
    dict.get("Application")
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in members {
            writer.start_file(name.to_string(), options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_zip_package() {
        let bytes = zip_bytes(&[("Index/Document.iwa", b"abc"), ("Data/image.png", b"png")]);
        let mut package = ZipPackage::new(bytes).unwrap();

        assert!(package.is_structured());
        assert!(package.exists("Index/Document.iwa"));
        assert!(!package.exists("Index/Missing.iwa"));
        assert_eq!(package.open("Index/Document.iwa").unwrap(), b"abc");
        assert!(package.open("nope").is_err());
    }

    #[test]
    fn test_dir_package() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Metadata")).unwrap();
        fs::write(dir.path().join("Metadata/DocumentIdentifier"), b"id").unwrap();

        let mut package = DirPackage::new(dir.path());
        assert!(package.exists("Metadata/DocumentIdentifier"));
        assert!(!package.exists("Metadata/Other"));
        assert_eq!(package.open("Metadata/DocumentIdentifier").unwrap(), b"id");
    }

    #[test]
    fn test_sub_package_prefixes_lookups() {
        let bytes = zip_bytes(&[("Index/Document.iwa", b"abc")]);
        let parent = package_ref(ZipPackage::new(bytes).unwrap());
        let mut sub = SubPackage::new(parent, "Index");

        assert!(sub.exists("Document.iwa"));
        assert!(!sub.exists("Index/Document.iwa"));
        assert_eq!(sub.open("Document.iwa").unwrap(), b"abc");
    }

    #[test]
    fn test_gunzip_round_trip() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"<presentation/>").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(gunzip(&compressed).unwrap(), b"<presentation/>");
        assert!(gunzip(b"not gzip").is_err());
    }

    #[test]
    fn test_zlib_round_trip() {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"payload").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(zlib_inflate(&compressed).unwrap(), b"payload");
        assert!(zlib_inflate(b"raw").is_err());
    }

    #[test]
    fn test_application_hint() {
        let plist = br#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0"><dict>
<key>Application</key><string>Keynote</string>
</dict></plist>"#;
        let bytes = zip_bytes(&[("Metadata/Properties.plist", plist)]);
        let mut package = ZipPackage::new(bytes).unwrap();
        assert_eq!(
            application_hint(&mut package).as_deref(),
            Some("Keynote")
        );
    }
}
