//! Format detection
//!
//! An input is classified along two axes: the container format (legacy
//! XML v1, XML v2, or the binary IWA format) and the application family
//! (Keynote, Numbers, Pages). Structured inputs are probed by member
//! name; unstructured inputs are optionally unwrapped from a zlib stream
//! and sniffed.
//!
//! Detection never fails: an unrecognized input yields
//! [`Confidence::Unsupported`].

use tracing::debug;

use crate::message::Message;
use crate::package::{self, PackageRef, SubPackage, ZipPackage, package_ref};
use crate::snappy::SnappyStream;
use crate::stream::{MemoryStream, SeekWhence};
use crate::varint::read_uvar;

/// Container format of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// The Keynote 1.x XML format
    Xml1,
    /// The XML format of Keynote 2-5, Numbers 1-2 and Pages 1-4
    Xml2,
    /// The binary IWA format of the 2013+ applications
    Binary,
}

/// Application family a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Application {
    Keynote,
    Numbers,
    Pages,
}

impl Application {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Keynote" => Some(Self::Keynote),
            "Numbers" => Some(Self::Numbers),
            "Pages" => Some(Self::Pages),
            _ => None,
        }
    }
}

/// How well the importer can handle the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Unsupported,
    /// Only the main stream is available; embedded media cannot be
    /// resolved.
    Partial,
    /// The complete package is available.
    Excellent,
}

/// The outcome of format detection, carrying the handles the parser
/// drivers need.
pub struct Detection {
    pub format: Option<Format>,
    pub application: Option<Application>,
    pub confidence: Confidence,
    /// The uncompressed main stream (`Index/Document.iwa` or the XML
    /// index member).
    pub(crate) input: Option<MemoryStream>,
    /// The package the fragment files are read from.
    pub(crate) fragments: Option<PackageRef>,
    /// The complete package, when available (media resolution).
    pub(crate) package: Option<PackageRef>,
}

impl Detection {
    fn unsupported(application: Option<Application>) -> Self {
        Self {
            format: None,
            application,
            confidence: Confidence::Unsupported,
            input: None,
            fragments: None,
            package: None,
        }
    }
}

/// Classify a structured package.
pub fn detect_package(package: PackageRef, type_hint: Option<Application>) -> Detection {
    let mut info = Detection::unsupported(type_hint);
    info.package = Some(package.clone());

    probe_structured_binary(&package, &mut info);

    if info.format.is_none() {
        probe_structured_xml(&package, &mut info);
    }

    finish_probe(&mut info);
    info
}

/// Classify a raw, unstructured stream (a stripped main file).
pub fn detect_stream(data: Vec<u8>, type_hint: Option<Application>) -> Detection {
    let mut info = Detection::unsupported(type_hint);

    // the main file may be wrapped in a zlib stream
    let data = package::zlib_inflate(&data).unwrap_or(data);

    let stream = MemoryStream::new(data);
    if probe_binary(&stream, &mut info) {
        info.format = Some(Format::Binary);
        info.input = Some(stream);
    } else if let Some((application, format)) = probe_xml(stream.as_slice()) {
        if info.application.is_none() || info.application == Some(application) {
            info.format = Some(format);
            info.application = Some(application);
            info.input = Some(stream);
        }
    }

    if info.format.is_some() && info.application.is_some() {
        info.confidence = Confidence::Partial;
    }
    info
}

fn probe_structured_binary(package: &PackageRef, info: &mut Detection) {
    let is_package = package.borrow().exists("Metadata/DocumentIdentifier");

    // Index/ may itself be zipped
    let fragments: PackageRef = if package.borrow().exists("Index.zip") {
        let inner = package.borrow_mut().open("Index.zip");
        match inner.and_then(ZipPackage::new) {
            Ok(inner) => package_ref(inner),
            Err(e) => {
                debug!("detect: cannot open Index.zip: {}", e);
                package_ref(SubPackage::new(package.clone(), ""))
            }
        }
    } else {
        package.clone()
    };

    if !fragments.borrow().exists("Index/Document.iwa") {
        return;
    }

    let compressed = match fragments.borrow_mut().open("Index/Document.iwa") {
        Ok(data) => data,
        Err(e) => {
            debug!("detect: cannot open Index/Document.iwa: {}", e);
            return;
        }
    };
    let input = match SnappyStream::decompress(&compressed) {
        Ok(stream) => stream.into_stream(),
        Err(e) => {
            debug!("detect: Index/Document.iwa is not a Snappy stream: {}", e);
            return;
        }
    };

    info.format = Some(Format::Binary);
    info.input = Some(input);
    info.fragments = Some(fragments.clone());
    if !is_package {
        // a bare Index tree: media will not resolve
        info.package = None;
    }

    if info.application.is_none() {
        if fragments.borrow().exists("Index/MasterSlide.iwa") {
            info.application = Some(Application::Keynote);
        } else if fragments.borrow().exists("Index/Tables/DataList.iwa") {
            info.application = Some(Application::Numbers);
        } else if let Some(name) = package::application_hint(&mut *package.borrow_mut()) {
            info.application = Application::from_name(&name);
        }
    }
}

fn probe_structured_xml(package: &PackageRef, info: &mut Detection) {
    let open = |name: &str| package.borrow_mut().open(name).ok();
    let open_gz = |name: &str| {
        package
            .borrow_mut()
            .open(name)
            .ok()
            .and_then(|data| package::gunzip(&data).ok())
    };

    if matches!(info.application, None | Some(Application::Keynote)) {
        let member = if package.borrow().exists("index.apxl") {
            open("index.apxl")
        } else if package.borrow().exists("index.apxl.gz") {
            open_gz("index.apxl.gz")
        } else {
            None
        };
        if let Some(data) = member {
            info.format = Some(Format::Xml2);
            info.application = Some(Application::Keynote);
            info.input = Some(MemoryStream::new(data));
            return;
        }
    }

    if matches!(
        info.application,
        None | Some(Application::Numbers) | Some(Application::Pages)
    ) {
        let member = if package.borrow().exists("index.xml") {
            open("index.xml")
        } else if package.borrow().exists("index.xml.gz") {
            open_gz("index.xml.gz")
        } else {
            None
        };
        if let Some(data) = member {
            info.format = Some(Format::Xml2);
            info.input = Some(MemoryStream::new(data));
            return;
        }
    }

    let member = if package.borrow().exists("presentation.apxl") {
        open("presentation.apxl")
    } else if package.borrow().exists("presentation.apxl.gz") {
        open_gz("presentation.apxl.gz")
    } else {
        None
    };
    if let Some(data) = member {
        info.format = Some(Format::Xml1);
        info.application = Some(Application::Keynote);
        info.input = Some(MemoryStream::new(data));
    }
}

/// Run the content probe matching the detected format and settle the
/// confidence.
fn finish_probe(info: &mut Detection) {
    let Some(input) = info.input.clone() else {
        return;
    };

    let supported = match info.format {
        Some(Format::Binary) => probe_binary(&input, info),
        Some(_) => match probe_xml(input.as_slice()) {
            Some((application, _)) => {
                if info.application.is_none() || info.application == Some(application) {
                    info.application = Some(application);
                    true
                } else {
                    false
                }
            }
            None => false,
        },
        None => false,
    };

    if supported && info.application.is_some() {
        info.confidence = if info.package.is_some() {
            Confidence::Excellent
        } else {
            Confidence::Partial
        };
    } else {
        info.confidence = Confidence::Unsupported;
    }
}

/// Check that the stream opens with a plausible document root record and
/// classify by its declared type tag.
fn probe_binary(input: &MemoryStream, info: &mut Detection) -> bool {
    let mut stream = input.clone();
    if stream.seek(0, SeekWhence::Set).is_err() {
        return false;
    }
    let Ok(header_len) = read_uvar(&mut stream) else {
        return false;
    };
    if header_len < 8 || header_len > stream.remaining() as u64 {
        return false;
    }

    let start = stream.tell();
    let header = Message::from_range(&stream, start, start + header_len as usize);

    let object_id = header.uint32(1).ok().and_then(|f| f.optional());
    let data_type = header
        .message(2)
        .ok()
        .and_then(|f| f.uint32(1).ok())
        .and_then(|f| f.optional());

    let detected = match (object_id, data_type) {
        (Some(1), Some(1)) => {
            // The app-specific object types for Keynote and Numbers
            // overlap, so an earlier structure check settles the split.
            if info.application == Some(Application::Keynote) {
                Some(Application::Keynote)
            } else {
                Some(Application::Numbers)
            }
        }
        (Some(1), Some(10000)) => Some(Application::Pages),
        _ => None,
    };

    match detected {
        Some(detected) => {
            if info.application.is_none() || info.application == Some(detected) {
                info.application = Some(detected);
                true
            } else {
                false
            }
        }
        None => false,
    }
}

/// Sniff the root element of an XML stream.
fn probe_xml(data: &[u8]) -> Option<(Application, Format)> {
    let mut reader = quick_xml::Reader::from_reader(data);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(start)) => {
                let local = start.local_name().as_ref().to_vec();
                let mut namespaces = String::new();
                for attribute in start.attributes().flatten() {
                    if attribute.key.as_ref().starts_with(b"xmlns") {
                        namespaces.push_str(&String::from_utf8_lossy(&attribute.value));
                        namespaces.push(' ');
                    }
                }

                return match local.as_slice() {
                    b"presentation" => {
                        let format = if namespaces.contains("keynote2") {
                            Format::Xml2
                        } else {
                            Format::Xml1
                        };
                        Some((Application::Keynote, format))
                    }
                    b"document" => {
                        if namespaces.contains("/ls") {
                            Some((Application::Numbers, Format::Xml2))
                        } else if namespaces.contains("/sl") {
                            Some((Application::Pages, Format::Xml2))
                        } else {
                            None
                        }
                    }
                    _ => None,
                };
            }
            Ok(quick_xml::events::Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
        buf.clear();
    }
}
