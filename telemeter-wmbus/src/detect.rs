//! Device resolution.
//!
//! `resolve(spec)` turns the configured device string into a
//! [`DeviceDescriptor`] without opening anything. `auto` probes a fixed,
//! ordered candidate list; explicit paths are classified by name only and
//! handed through as-is — the driver's open reports its own failures.
//!
//! Probing is read-only (existence checks). Tests use [`resolve_at`] with a
//! `TempDir` root; the no-arg form resolves against `/`.

use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The communication-device family behind a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Probing found nothing; fatal for the caller.
    NotFound,
    /// IMST iM871A dongle.
    Im871a,
    /// Amber AMB8465 dongle.
    Amb8465,
    /// Simulation file replaying canned telegrams.
    Simulator,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::NotFound => "not-found",
            DeviceKind::Im871a => "im871a",
            DeviceKind::Amb8465 => "amb8465",
            DeviceKind::Simulator => "simulator",
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved device: produced once, immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub kind: DeviceKind,
    pub path: PathBuf,
}

impl DeviceDescriptor {
    pub fn not_found() -> Self {
        Self {
            kind: DeviceKind::NotFound,
            path: PathBuf::new(),
        }
    }

    fn new(kind: DeviceKind, path: impl Into<PathBuf>) -> Self {
        Self { kind, path: path.into() }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// `auto` probe candidates relative to the root, in priority order.
const AUTO_CANDIDATES: &[(&str, DeviceKind)] = &[
    ("dev/im871a", DeviceKind::Im871a),
    ("dev/amb8465", DeviceKind::Amb8465),
    ("simulation.txt", DeviceKind::Simulator),
];

/// Resolve a device spec against an explicit filesystem root.
///
/// The first existing candidate wins for `auto`, so results are reproducible
/// given the same environment. Explicit specs never touch the filesystem.
pub fn resolve_at(root: &Path, spec: &str) -> DeviceDescriptor {
    if spec == "auto" {
        for (candidate, kind) in AUTO_CANDIDATES {
            let path = root.join(candidate);
            if path.exists() {
                return DeviceDescriptor::new(*kind, path);
            }
        }
        return DeviceDescriptor::not_found();
    }

    // A family prefix pins arbitrary ports: im871a:/dev/ttyUSB0
    if let Some(path) = spec.strip_prefix("im871a:") {
        return DeviceDescriptor::new(DeviceKind::Im871a, path);
    }
    if let Some(path) = spec.strip_prefix("amb8465:") {
        return DeviceDescriptor::new(DeviceKind::Amb8465, path);
    }

    let file_name = Path::new(spec)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if file_name.starts_with("simulation") {
        return DeviceDescriptor::new(DeviceKind::Simulator, spec);
    }
    if spec.contains("amb8465") {
        return DeviceDescriptor::new(DeviceKind::Amb8465, spec);
    }
    // Unrecognized ports go to the iM871A driver, which reports its own
    // open failure.
    DeviceDescriptor::new(DeviceKind::Im871a, spec)
}

/// `resolve_at` convenience wrapper against `/`.
pub fn resolve(spec: &str) -> DeviceDescriptor {
    resolve_at(Path::new("/"), spec)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
