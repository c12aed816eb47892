//! Structured-markup (tag-based) format detector.
//!
//! Validates well-formedness with a streaming parse, extracts the root
//! element and namespace declarations (hashed for provenance, never stored
//! raw), and recognises transform payloads, build descriptors, and resource
//! bundles as variants of the same markup family.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::score::Signals;
use super::{DetectContext, Detection, FormatDetector, PREVIEW_LIMIT, provenance_hash};
use crate::sample::Sample;

/// Namespace URI marking a config-transform payload.
const XDT_NAMESPACE: &str = "http://schemas.microsoft.com/XML-Document-Transform";

/// Root element names that corroborate a configuration payload.
const KNOWN_ROOTS: &[&str] = &["configuration", "Project", "root", "plist", "appSettings", "settings"];

/// Extensions that corroborate (but never establish) a markup detection.
const MARKUP_EXTENSIONS: &[&str] = &[
    "xml", "config", "csproj", "vbproj", "fsproj", "props", "targets", "resx", "xsl", "xslt", "svg", "xaml", "nuspec",
];

/// Parsing stops after this many elements; classification samples structure,
/// it does not build a full tree.
const ELEMENT_SCAN_LIMIT: usize = 2048;

/// Detector for the structured-markup format family.
#[derive(Debug, Clone, Copy)]
pub struct XmlDetector;

#[derive(Default)]
struct MarkupScan {
    root: Option<String>,
    root_has_sdk_attr: bool,
    element_count: usize,
    has_declaration: bool,
    namespace_hashes: Vec<String>,
    has_xdt_namespace: bool,
    transform_stages: Vec<String>,
    child_elements: Vec<String>,
    resource_keys: Vec<String>,
    recovered: bool,
}

impl FormatDetector for XmlDetector {
    fn format(&self) -> &'static str {
        "xml"
    }

    fn version(&self) -> &'static str {
        "xml-detector/3"
    }

    fn detect(&self, sample: &Sample, ctx: &DetectContext<'_>) -> Option<Detection> {
        let text = sample.text()?;
        if !text.trim_start().starts_with('<') {
            return None;
        }

        let scan = scan_markup(&text)?;
        let root = scan.root.clone()?;

        let mut detection = Detection::new(classify_variant(&scan));
        detection.signals = Signals {
            structural_parse: true,
            corroborating: 0,
            recovered_parse: scan.recovered,
        };
        detection.reason(format!("root element '{root}'"));

        if scan.recovered {
            detection.reason("partial parse recovered");
        }

        if scan.has_declaration {
            detection.signals.corroborate();
            detection.reason("xml declaration present");
        }

        if !scan.namespace_hashes.is_empty() {
            detection.signals.corroborate();
            detection.reason("namespace declarations present");
        }

        if KNOWN_ROOTS.contains(&root.as_str()) {
            detection.signals.corroborate();
            detection.reason("known configuration root");
        }

        if let Some(ext) = ctx.extension()
            && MARKUP_EXTENSIONS.contains(&ext.as_str())
        {
            detection.signals.corroborate();
            detection.reason(format!("extension hint '.{ext}'"));
        }

        detection.insert("root_element", root.as_str());
        detection.insert(
            "element_count",
            i64::try_from(scan.element_count).unwrap_or(i64::MAX),
        );
        detection.insert("has_xml_declaration", scan.has_declaration);

        if !scan.namespace_hashes.is_empty() {
            detection.insert("namespace_hashes", scan.namespace_hashes.clone());
        }
        if !scan.transform_stages.is_empty() {
            detection.insert("transform_stages", scan.transform_stages.clone());
        }
        if !scan.child_elements.is_empty() {
            detection.insert("child_elements", scan.child_elements.clone());
        }
        if !scan.resource_keys.is_empty() {
            detection.insert("resource_key_preview", scan.resource_keys.clone());
        }

        Some(detection)
    }
}

fn classify_variant(scan: &MarkupScan) -> &'static str {
    let root = scan.root.as_deref().unwrap_or_default();

    if scan.has_xdt_namespace {
        return "web-config-transform";
    }
    if root == "Project" && (scan.root_has_sdk_attr || scan.child_elements.iter().any(|c| c == "Import")) {
        return "msbuild-project";
    }
    if root == "root" && !scan.resource_keys.is_empty() {
        return "resource-bundle";
    }
    if root == "configuration" {
        return "app-config";
    }
    "generic"
}

/// Streams events from the sample, collecting structural evidence.
///
/// Returns `None` when the content fails before producing a single element;
/// an error after at least one element is treated as a recoverable partial
/// parse (capped samples routinely end mid-document).
fn scan_markup(text: &str) -> Option<MarkupScan> {
    let mut reader = Reader::from_str(text);
    let mut scan = MarkupScan::default();
    let mut depth = 0usize;

    loop {
        if scan.element_count >= ELEMENT_SCAN_LIMIT {
            break;
        }

        match reader.read_event() {
            Ok(Event::Decl(_)) => scan.has_declaration = true,
            Ok(Event::Start(e)) => {
                record_element(&mut scan, &e, depth);
                depth += 1;
            }
            Ok(Event::Empty(e)) => record_element(&mut scan, &e, depth),
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => {
                if scan.element_count == 0 {
                    return None;
                }
                scan.recovered = true;
                break;
            }
        }
    }

    Some(scan)
}

fn record_element(scan: &mut MarkupScan, element: &BytesStart<'_>, depth: usize) {
    scan.element_count += 1;
    let name = local_name(element);

    if depth == 0 && scan.root.is_none() {
        scan.root = Some(name.clone());
    } else if depth == 1 && scan.child_elements.len() < PREVIEW_LIMIT && !scan.child_elements.contains(&name) {
        scan.child_elements.push(name.clone());
    }

    for attr in element.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = String::from_utf8_lossy(&attr.value).into_owned();

        if key == "xmlns" || key.starts_with("xmlns:") {
            if value == XDT_NAMESPACE {
                scan.has_xdt_namespace = true;
            }
            if scan.namespace_hashes.len() < PREVIEW_LIMIT {
                scan.namespace_hashes.push(provenance_hash("xmlns", &value));
            }
        } else if key.ends_with(":Transform") {
            if scan.transform_stages.len() < PREVIEW_LIMIT && !scan.transform_stages.contains(&value) {
                scan.transform_stages.push(value);
            }
        } else if depth == 0 && key == "Sdk" {
            scan.root_has_sdk_attr = true;
        } else if name == "data" && key == "name" && scan.resource_keys.len() < PREVIEW_LIMIT {
            scan.resource_keys.push(value);
        }
    }
}

fn local_name(element: &BytesStart<'_>) -> String {
    let raw = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    raw.rsplit(':').next().unwrap_or(&raw).to_string()
}
