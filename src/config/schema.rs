use crate::image::WriteMode;
use crate::scan::{Markers, DEFAULT_END_MARKER, DEFAULT_START_MARKER};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct PatcherConfig {
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(default)]
    pub write: WriteConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MarkerConfig {
    #[serde(default = "default_start")]
    pub start: String,
    #[serde(default = "default_end")]
    pub end: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
        }
    }
}

fn default_start() -> String {
    DEFAULT_START_MARKER.to_string()
}

fn default_end() -> String {
    DEFAULT_END_MARKER.to_string()
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct WriteConfig {
    #[serde(default)]
    pub mode: WriteMode,
    /// Keep the image's modification time across a patch.
    #[serde(default)]
    pub preserve_mtime: bool,
}

impl PatcherConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        for (field, value) in [
            ("markers.start", &self.markers.start),
            ("markers.end", &self.markers.end),
        ] {
            if value.is_empty() {
                issues.push(ValidationIssue::EmptyMarker { field });
            } else if value.contains('\0') {
                issues.push(ValidationIssue::NulInMarker { field });
            }
        }

        if !self.markers.start.is_empty() && self.markers.start == self.markers.end {
            issues.push(ValidationIssue::IdenticalMarkers {
                marker: self.markers.start.clone(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Marker patterns for [`crate::scan::scan`]. Falls back to the defaults
    /// for a config that was never validated and holds an empty marker.
    pub fn markers(&self) -> Markers {
        Markers::new(self.markers.start.as_bytes(), self.markers.end.as_bytes()).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyMarker { field: &'static str },
    NulInMarker { field: &'static str },
    IdenticalMarkers { marker: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyMarker { field } => write!(f, "'{field}' must not be empty"),
            ValidationIssue::NulInMarker { field } => {
                write!(f, "'{field}' must not contain a NUL byte")
            }
            ValidationIssue::IdenticalMarkers { marker } => {
                write!(f, "start and end markers are both \"{marker}\"")
            }
        }
    }
}
