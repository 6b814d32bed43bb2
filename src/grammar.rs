use std::fs;
use std::path::{Path, PathBuf};

use gpx::{Gpx, GpxVersion};
use quick_xml::events::Event;
use serde::Serialize;
use thiserror::Error;

use crate::coords;

pub const GRAMMAR_V10_FILE: &str = "gpx-1.0.xsd";
pub const GRAMMAR_V11_FILE: &str = "gpx-1.1.xsd";

const GPX_10_NAMESPACE: &str = "http://www.topografix.com/GPX/1/0";
const GPX_11_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

/// Outcome of checking one document against both accepted grammar versions.
#[derive(Debug)]
pub enum ValidationResult {
    Valid,
    Invalid(GrammarDiagnostics),
}

/// Why the document conforms to neither version. Both lists are populated so
/// callers can report what each check objected to.
#[derive(Debug, Clone, Serialize)]
pub struct GrammarDiagnostics {
    pub v10: Vec<String>,
    pub v11: Vec<String>,
}

#[derive(Debug, Error)]
pub enum GrammarLoadError {
    #[error("failed to read grammar file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("grammar file {path} is unusable: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// One accepted grammar version, backed by a schema file read at startup.
pub struct Grammar {
    version: GpxVersion,
    label: &'static str,
}

/// The two grammar versions this service accepts. Loaded once at process
/// start; the service does not come up if either file is missing or does not
/// describe the version it is supposed to.
pub struct GrammarSet {
    v10: Grammar,
    v11: Grammar,
}

impl GrammarSet {
    pub fn load(dir: &Path) -> Result<Self, GrammarLoadError> {
        Ok(GrammarSet {
            v10: Grammar::load(
                dir.join(GRAMMAR_V10_FILE),
                GpxVersion::Gpx10,
                "GPX 1.0",
                GPX_10_NAMESPACE,
            )?,
            v11: Grammar::load(
                dir.join(GRAMMAR_V11_FILE),
                GpxVersion::Gpx11,
                "GPX 1.1",
                GPX_11_NAMESPACE,
            )?,
        })
    }

    /// Check `document` against both versions independently; either passing
    /// makes the document valid.
    pub fn check(&self, document: &str) -> ValidationResult {
        let v10 = self.v10.diagnose(document);
        let v11 = self.v11.diagnose(document);
        if v10.is_empty() || v11.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(GrammarDiagnostics { v10, v11 })
        }
    }
}

impl Grammar {
    fn load(
        path: PathBuf,
        version: GpxVersion,
        label: &'static str,
        expected_namespace: &str,
    ) -> Result<Self, GrammarLoadError> {
        let text = fs::read_to_string(&path).map_err(|source| GrammarLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let (namespace, declared) =
            schema_header(&text).map_err(|reason| GrammarLoadError::Malformed {
                path: path.clone(),
                reason,
            })?;
        if namespace != expected_namespace {
            return Err(GrammarLoadError::Malformed {
                path,
                reason: format!(
                    "target namespace is {namespace}, expected {expected_namespace}"
                ),
            });
        }
        tracing::debug!(grammar = label, version = %declared, "loaded grammar file");
        Ok(Grammar { version, label })
    }

    /// Diagnostics for one version; empty means the document conforms.
    fn diagnose(&self, document: &str) -> Vec<String> {
        let parsed: Gpx = match gpx::read(document.as_bytes()) {
            Ok(parsed) => parsed,
            Err(err) => {
                return vec![format!("{}: document is not well-formed GPX: {err}", self.label)]
            }
        };
        let mut diagnostics = Vec::new();
        if parsed.version != self.version {
            diagnostics.push(format!(
                "{}: document declares {:?}, which this grammar does not accept",
                self.label, parsed.version
            ));
        }
        diagnostics.extend(coordinate_violations(&parsed, self.label));
        diagnostics
    }
}

/// Bounds restrictions carried by both schemas: every point's lat/lon must be
/// inside the WGS84 ranges.
fn coordinate_violations(parsed: &Gpx, label: &str) -> Vec<String> {
    let mut violations = Vec::new();
    let mut check = |context: String, point: &gpx::Waypoint| {
        let p = point.point();
        if !coords::in_bounds(p.y(), p.x()) {
            violations.push(format!(
                "{label}: {context} has coordinates outside the schema bounds (lat {}, lon {})",
                p.y(),
                p.x()
            ));
        }
    };
    for (w, waypoint) in parsed.waypoints.iter().enumerate() {
        check(format!("waypoint {w}"), waypoint);
    }
    for (r, route) in parsed.routes.iter().enumerate() {
        for (p, point) in route.points.iter().enumerate() {
            check(format!("route {r} point {p}"), point);
        }
    }
    for (t, track) in parsed.tracks.iter().enumerate() {
        for (s, segment) in track.segments.iter().enumerate() {
            for (p, point) in segment.points.iter().enumerate() {
                check(format!("track {t} segment {s} point {p}"), point);
            }
        }
    }
    violations
}

/// Pull (targetNamespace, version) off the schema root element.
fn schema_header(xsd: &str) -> Result<(String, String), String> {
    let mut reader = quick_xml::Reader::from_str(xsd);
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element))
                if element.local_name().as_ref() == b"schema" =>
            {
                let mut namespace = None;
                let mut version = None;
                for attribute in element.attributes() {
                    let attribute =
                        attribute.map_err(|err| format!("bad schema attribute: {err}"))?;
                    let value = String::from_utf8_lossy(&attribute.value).into_owned();
                    match attribute.key.as_ref() {
                        b"targetNamespace" => namespace = Some(value),
                        b"version" => version = Some(value),
                        _ => {}
                    }
                }
                return match (namespace, version) {
                    (Some(namespace), Some(version)) => Ok((namespace, version)),
                    (None, _) => Err("schema element has no targetNamespace".into()),
                    (_, None) => Err("schema element has no version".into()),
                };
            }
            Ok(Event::Eof) => return Err("no schema element found".into()),
            Err(err) => return Err(format!("not well-formed XML: {err}")),
            Ok(_) => {}
        }
    }
}
