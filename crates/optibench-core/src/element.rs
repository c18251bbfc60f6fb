//! Optical element records.
//!
//! An [`ElementRecord`] is one entry on the optical axis: a name, an axial
//! distance, and a kind-specific [`ElementPayload`]. Records are pure data;
//! ordering and naming rules live in [`crate::sequence`] and
//! [`crate::naming`].
//!
//! The persisted form is [`ElementDocument`], a flat `type`-tagged object.
//! [`ElementDocument::from_value`] also accepts the legacy key names older
//! workspace files used (`distance_mm`, `aperture_path`, `f`,
//! `range_end_mm`, ...) and ignores unknown keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ElementDefaults;

/// Errors converting between records and their serialised form.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Malformed element record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown element type '{0}'")]
    UnknownKind(String),
}

/// Discriminant of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    Aperture,
    Lens,
    Screen,
    ApertureResult,
    TargetIntensity,
}

impl ElementKind {
    pub const ALL: [ElementKind; 5] = [
        ElementKind::Aperture,
        ElementKind::Lens,
        ElementKind::Screen,
        ElementKind::ApertureResult,
        ElementKind::TargetIntensity,
    ];

    /// Serialised type tag, e.g. `"ApertureResult"`.
    pub fn tag(self) -> &'static str {
        match self {
            ElementKind::Aperture => "Aperture",
            ElementKind::Lens => "Lens",
            ElementKind::Screen => "Screen",
            ElementKind::ApertureResult => "ApertureResult",
            ElementKind::TargetIntensity => "TargetIntensity",
        }
    }

    /// Human-facing name used for generated element names, e.g. `"Aperture Result"`.
    pub fn display_name(self) -> &'static str {
        match self {
            ElementKind::Aperture => "Aperture",
            ElementKind::Lens => "Lens",
            ElementKind::Screen => "Screen",
            ElementKind::ApertureResult => "Aperture Result",
            ElementKind::TargetIntensity => "Target Intensity",
        }
    }

    /// Whether the element carries a bitmap (aperture-like input).
    pub fn has_image(self) -> bool {
        matches!(self, ElementKind::Aperture | ElementKind::TargetIntensity)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ElementKind {
    type Err = RecordError;

    /// Parse a tag or display name, ignoring case and whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        ElementKind::ALL
            .into_iter()
            .find(|kind| kind.tag().to_ascii_lowercase() == key)
            .ok_or_else(|| RecordError::UnknownKind(s.to_string()))
    }
}

/// Phase-retrieval algorithm used for an inverse solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetrievalMethod {
    #[default]
    #[serde(alias = "gs", alias = "Gerchberg-Saxton")]
    GerchbergSaxton,
    #[serde(alias = "cg", alias = "Conjugate Gradient")]
    ConjugateGradient,
}

/// Bitmap aperture placed on the axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApertureParams {
    /// Path to the transmission bitmap. Empty means fully transparent.
    pub image_path: String,
    /// Physical width of the bitmap (mm).
    pub width_mm: f64,
    /// Physical height of the bitmap (mm).
    pub height_mm: f64,
    pub is_inverted: bool,
    /// Interpret the bitmap as a phase mask instead of an amplitude mask.
    pub is_phasemask: bool,
}

/// Thin lens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensParams {
    /// Focal length (mm).
    pub focal_length_mm: f64,
}

/// Observation screen, optionally sweeping a distance range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenParams {
    pub is_range: bool,
    /// End of the sweep (mm). Never below the screen's own distance.
    pub range_end_mm: f64,
    /// Number of samples across the sweep (>= 1).
    pub steps: u32,
}

impl ScreenParams {
    /// Re-establish the screen invariants for a screen placed at `distance_mm`.
    ///
    /// - `steps >= 1`
    /// - without a range, the end tracks the start and `steps == 1`
    /// - with a range, the end is clamped up to the start, and a collapsed
    ///   range has exactly one step
    pub fn normalize(&mut self, distance_mm: f64) {
        self.steps = self.steps.max(1);
        if !self.is_range {
            self.range_end_mm = distance_mm;
            self.steps = 1;
            return;
        }
        if self.range_end_mm < distance_mm {
            self.range_end_mm = distance_mm;
        }
        if self.range_end_mm == distance_mm {
            self.steps = 1;
        }
    }
}

/// Output plane of an inverse (phase-retrieval) solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApertureResultParams {
    /// Support width (mm).
    pub width_mm: f64,
    /// Support height (mm).
    pub height_mm: f64,
    pub maxiter: u32,
    /// Zero padding added on every side of the grid during retrieval (px).
    pub padding: u32,
    pub method: RetrievalMethod,
}

/// Desired intensity for an inverse solve, given as a bitmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetIntensityParams {
    pub image_path: String,
    pub width_mm: f64,
    pub height_mm: f64,
    pub is_inverted: bool,
}

/// Kind-specific part of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ElementPayload {
    Aperture(ApertureParams),
    Lens(LensParams),
    Screen(ScreenParams),
    ApertureResult(ApertureResultParams),
    TargetIntensity(TargetIntensityParams),
}

impl ElementPayload {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementPayload::Aperture(_) => ElementKind::Aperture,
            ElementPayload::Lens(_) => ElementKind::Lens,
            ElementPayload::Screen(_) => ElementKind::Screen,
            ElementPayload::ApertureResult(_) => ElementKind::ApertureResult,
            ElementPayload::TargetIntensity(_) => ElementKind::TargetIntensity,
        }
    }

    /// Fresh payload of `kind` for an element at `distance_mm`.
    pub fn default_for(kind: ElementKind, distance_mm: f64, defaults: &ElementDefaults) -> Self {
        match kind {
            ElementKind::Aperture => ElementPayload::Aperture(ApertureParams {
                image_path: defaults.image_path.clone(),
                width_mm: defaults.aperture_width_mm,
                height_mm: defaults.aperture_height_mm,
                is_inverted: false,
                is_phasemask: false,
            }),
            ElementKind::Lens => ElementPayload::Lens(LensParams {
                focal_length_mm: defaults.lens_focal_length_mm,
            }),
            ElementKind::Screen => ElementPayload::Screen(ScreenParams {
                is_range: false,
                range_end_mm: distance_mm,
                steps: 1,
            }),
            ElementKind::ApertureResult => ElementPayload::ApertureResult(ApertureResultParams {
                width_mm: defaults.aperture_width_mm,
                height_mm: defaults.aperture_height_mm,
                maxiter: defaults.retrieval_maxiter,
                padding: defaults.retrieval_padding,
                method: defaults.retrieval_method,
            }),
            ElementKind::TargetIntensity => ElementPayload::TargetIntensity(TargetIntensityParams {
                image_path: defaults.image_path.clone(),
                width_mm: defaults.aperture_width_mm,
                height_mm: defaults.aperture_height_mm,
                is_inverted: false,
            }),
        }
    }
}

/// One optical element on the axis.
///
/// Besides the active payload, a record remembers the payloads it carried
/// under earlier kinds, so that switching Lens -> Screen -> Lens restores the
/// focal length that was entered before.
#[derive(Debug, Clone)]
pub struct ElementRecord {
    pub name: String,
    /// Axial position (mm) relative to the source.
    pub distance_mm: f64,
    pub payload: ElementPayload,
    retained: Vec<ElementPayload>,
}

impl PartialEq for ElementRecord {
    /// Records compare by their visible state; remembered payloads of other
    /// kinds do not take part.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.distance_mm == other.distance_mm
            && self.payload == other.payload
    }
}

impl ElementRecord {
    pub fn new(name: impl Into<String>, distance_mm: f64, payload: ElementPayload) -> Self {
        let mut record = Self {
            name: name.into(),
            distance_mm,
            payload,
            retained: Vec::new(),
        };
        record.normalize();
        record
    }

    pub fn kind(&self) -> ElementKind {
        self.payload.kind()
    }

    pub fn screen(&self) -> Option<&ScreenParams> {
        match &self.payload {
            ElementPayload::Screen(screen) => Some(screen),
            _ => None,
        }
    }

    /// Re-apply payload invariants that depend on the distance.
    pub(crate) fn normalize(&mut self) {
        let distance = self.distance_mm;
        if let ElementPayload::Screen(screen) = &mut self.payload {
            screen.normalize(distance);
        }
    }

    /// Switch to `kind`, restoring a remembered payload of that kind or
    /// building a default one. The outgoing payload is remembered.
    pub(crate) fn change_kind(&mut self, kind: ElementKind, defaults: &ElementDefaults) {
        if self.kind() == kind {
            return;
        }
        let incoming = match self.retained.iter().position(|p| p.kind() == kind) {
            Some(idx) => self.retained.remove(idx),
            None => ElementPayload::default_for(kind, self.distance_mm, defaults),
        };
        let outgoing = std::mem::replace(&mut self.payload, incoming);
        self.retained.push(outgoing);
        self.normalize();
    }

    /// Persisted form of this record.
    pub fn export(&self) -> ElementDocument {
        let name = Some(self.name.clone());
        let distance = self.distance_mm;
        match &self.payload {
            ElementPayload::Aperture(p) => ElementDocument::Aperture {
                name,
                distance,
                image_path: p.image_path.clone(),
                width_mm: p.width_mm,
                height_mm: p.height_mm,
                is_inverted: p.is_inverted,
                is_phasemask: p.is_phasemask,
            },
            ElementPayload::Lens(p) => ElementDocument::Lens {
                name,
                distance,
                focal_length: p.focal_length_mm,
            },
            ElementPayload::Screen(p) => ElementDocument::Screen {
                name,
                distance,
                is_range: p.is_range,
                range_end: Some(p.range_end_mm),
                steps: p.steps,
            },
            ElementPayload::ApertureResult(p) => ElementDocument::ApertureResult {
                name,
                distance,
                width_mm: p.width_mm,
                height_mm: p.height_mm,
                maxiter: p.maxiter,
                padding: p.padding,
                method: p.method,
            },
            ElementPayload::TargetIntensity(p) => ElementDocument::TargetIntensity {
                name,
                distance,
                image_path: p.image_path.clone(),
                width_mm: p.width_mm,
                height_mm: p.height_mm,
                is_inverted: p.is_inverted,
            },
        }
    }

    /// Build a record from its persisted form. A missing name becomes empty;
    /// callers that insert into a sequence assign a generated name.
    pub fn from_document(doc: ElementDocument) -> Self {
        match doc {
            ElementDocument::Aperture {
                name,
                distance,
                image_path,
                width_mm,
                height_mm,
                is_inverted,
                is_phasemask,
            } => Self::new(
                name.unwrap_or_default(),
                distance,
                ElementPayload::Aperture(ApertureParams {
                    image_path,
                    width_mm,
                    height_mm,
                    is_inverted,
                    is_phasemask,
                }),
            ),
            ElementDocument::Lens {
                name,
                distance,
                focal_length,
            } => Self::new(
                name.unwrap_or_default(),
                distance,
                ElementPayload::Lens(LensParams {
                    focal_length_mm: focal_length,
                }),
            ),
            ElementDocument::Screen {
                name,
                distance,
                is_range,
                range_end,
                steps,
            } => Self::new(
                name.unwrap_or_default(),
                distance,
                ElementPayload::Screen(ScreenParams {
                    is_range,
                    range_end_mm: range_end.unwrap_or(distance),
                    steps,
                }),
            ),
            ElementDocument::ApertureResult {
                name,
                distance,
                width_mm,
                height_mm,
                maxiter,
                padding,
                method,
            } => Self::new(
                name.unwrap_or_default(),
                distance,
                ElementPayload::ApertureResult(ApertureResultParams {
                    width_mm,
                    height_mm,
                    maxiter,
                    padding,
                    method,
                }),
            ),
            ElementDocument::TargetIntensity {
                name,
                distance,
                image_path,
                width_mm,
                height_mm,
                is_inverted,
            } => Self::new(
                name.unwrap_or_default(),
                distance,
                ElementPayload::TargetIntensity(TargetIntensityParams {
                    image_path,
                    width_mm,
                    height_mm,
                    is_inverted,
                }),
            ),
        }
    }

    /// Export as a JSON object.
    pub fn export_value(&self) -> serde_json::Value {
        // Serialising a plain enum of numbers, strings and bools cannot fail.
        serde_json::to_value(self.export()).unwrap_or(serde_json::Value::Null)
    }

    /// Parse a JSON object produced by [`export_value`](Self::export_value)
    /// or by an older workspace file.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RecordError> {
        Ok(Self::from_document(ElementDocument::from_value(value)?))
    }
}

/// Legacy key and the current key it stands for. A key listed earlier wins
/// when several map to the same current key.
const LEGACY_KEYS: [(&str, &str); 10] = [
    ("distance_mm", "distance"),
    ("aperture_path", "image_path"),
    ("aperture_width_mm", "width_mm"),
    ("aperture_height_mm", "height_mm"),
    ("inverted", "is_inverted"),
    ("phasemask", "is_phasemask"),
    ("focal_length_mm", "focal_length"),
    ("f", "focal_length"),
    ("range_end_mm", "range_end"),
    ("step", "steps"),
];

/// Rewrite legacy keys in place. The current key always wins over its
/// legacy spelling, and the legacy key is dropped either way.
fn rename_legacy_keys(object: &mut serde_json::Map<String, serde_json::Value>) {
    for (legacy, current) in LEGACY_KEYS {
        if let Some(value) = object.remove(legacy) {
            object.entry(current).or_insert(value);
        }
    }
}

/// Deserialize a list of element documents through
/// [`ElementDocument::from_value`].
pub(crate) fn deserialize_documents<'de, D>(deserializer: D) -> Result<Vec<ElementDocument>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Vec::<serde_json::Value>::deserialize(deserializer)?
        .into_iter()
        .map(|value| ElementDocument::from_value(value).map_err(serde::de::Error::custom))
        .collect()
}

fn default_size_mm() -> f64 {
    1.0
}
fn default_focal_length() -> f64 {
    1000.0
}
fn default_steps() -> u32 {
    10
}
fn default_maxiter() -> u32 {
    200
}

/// Flat serialised form of an [`ElementRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementDocument {
    #[serde(alias = "aperture")]
    Aperture {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        distance: f64,
        #[serde(default)]
        image_path: String,
        #[serde(default = "default_size_mm")]
        width_mm: f64,
        #[serde(default = "default_size_mm")]
        height_mm: f64,
        #[serde(default)]
        is_inverted: bool,
        #[serde(default)]
        is_phasemask: bool,
    },
    #[serde(alias = "lens")]
    Lens {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        distance: f64,
        #[serde(default = "default_focal_length")]
        focal_length: f64,
    },
    #[serde(alias = "screen")]
    Screen {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        distance: f64,
        #[serde(default)]
        is_range: bool,
        #[serde(default)]
        range_end: Option<f64>,
        #[serde(default = "default_steps")]
        steps: u32,
    },
    #[serde(alias = "Aperture Result", alias = "apertureresult")]
    ApertureResult {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        distance: f64,
        #[serde(default = "default_size_mm")]
        width_mm: f64,
        #[serde(default = "default_size_mm")]
        height_mm: f64,
        #[serde(default = "default_maxiter")]
        maxiter: u32,
        #[serde(default)]
        padding: u32,
        #[serde(default)]
        method: RetrievalMethod,
    },
    #[serde(alias = "Target Intensity", alias = "targetintensity")]
    TargetIntensity {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        distance: f64,
        #[serde(default)]
        image_path: String,
        #[serde(default = "default_size_mm")]
        width_mm: f64,
        #[serde(default = "default_size_mm")]
        height_mm: f64,
        #[serde(default)]
        is_inverted: bool,
    },
}

impl ElementDocument {
    /// Parse a JSON object in the current or a legacy layout.
    pub fn from_value(mut value: serde_json::Value) -> Result<Self, RecordError> {
        let kind = match value.get("type").and_then(|t| t.as_str()) {
            Some(tag) => Some(tag.parse::<ElementKind>()?),
            None => None,
        };
        if let Some(object) = value.as_object_mut() {
            // Normalise the tag so "Aperture Result" and "aperture" load too.
            if let Some(kind) = kind {
                object.insert("type".into(), serde_json::Value::String(kind.tag().to_string()));
            }
            rename_legacy_keys(object);
        }
        Ok(serde_json::from_value(value)?)
    }
}
