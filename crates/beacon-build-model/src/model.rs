use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Coarse classification of a build target.
///
/// Inferred from rule vocabulary and naming conventions; not always
/// authoritative (a `swift_library` wrapping test helpers still classifies as
/// a library).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Library,
    Test,
    Binary,
}

/// One declared unit of work inside a build-description file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTarget {
    /// Target name, unique within its owning package.
    pub name: String,
    pub kind: TargetKind,
    /// Fully-qualified `//package:name` label, stable for the lifetime of the
    /// file.
    pub label: String,
    /// Equals `label` when `kind == Test`.
    pub test_label: Option<String>,
    /// Label-like dependency strings, in declaration order. Never validated
    /// against the target graph.
    pub dependencies: Vec<String>,
}

impl BuildTarget {
    pub fn new(name: impl Into<String>, kind: TargetKind, label: impl Into<String>) -> Self {
        let label = label.into();
        let test_label = (kind == TargetKind::Test).then(|| label.clone());
        Self {
            name: name.into(),
            kind,
            label,
            test_label,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// The parse result for one build-description file.
///
/// Replaced wholesale on re-parse; there is no incremental patching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPackage {
    /// Basename of the containing directory (bundle extensions stripped).
    pub name: String,
    /// Absolute directory path (not the file path).
    pub path: PathBuf,
    /// Declaration order within the file; not sorted.
    pub targets: Vec<BuildTarget>,
}

/// Coarse category of a discovered build-description file, used for UI
/// grouping and per-category scan-completion accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathKind {
    /// Xcode-style workspace bundle (`*.xcworkspace/contents.xcworkspacedata`).
    Workspace,
    /// Swift package manifest (`Package.swift`).
    PackageManifest,
    /// Bazel-style build file (`BUILD` / `BUILD.bazel`).
    SecondaryBuildFile,
    /// Everything else the walker tracks; concretely the project-description
    /// form (`*.xcodeproj/project.pbxproj`).
    Other,
}

impl PathKind {
    pub const ALL: [PathKind; 4] = [
        PathKind::Workspace,
        PathKind::PackageManifest,
        PathKind::SecondaryBuildFile,
        PathKind::Other,
    ];
}

/// Compute the category of a build-description file path.
///
/// Pure function of the filename and its position relative to known bundle
/// directories; recomputing on the same path always yields the same category.
/// The cross-session cache relies on this to detect misrouted entries.
pub fn classify(path: &Path) -> PathKind {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return PathKind::Other;
    };

    match name {
        "Package.swift" => PathKind::PackageManifest,
        "BUILD" | "BUILD.bazel" => PathKind::SecondaryBuildFile,
        "contents.xcworkspacedata" => {
            let in_workspace_bundle = dir_name_ends_with(path.parent(), ".xcworkspace");
            // An `.xcworkspace` nested inside an `.xcodeproj` is the embedded
            // duplicate representation of that project, not a workspace of
            // its own.
            let embedded_in_project =
                dir_name_ends_with(path.parent().and_then(Path::parent), ".xcodeproj");
            if in_workspace_bundle && !embedded_in_project {
                PathKind::Workspace
            } else {
                PathKind::Other
            }
        }
        _ => PathKind::Other,
    }
}

fn dir_name_ends_with(dir: Option<&Path>, suffix: &str) -> bool {
    dir.and_then(|d| d.file_name())
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(suffix))
}

/// A discovered build-description file location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePath {
    /// Absolute path of the build-description file itself.
    pub path: PathBuf,
    pub kind: PathKind,
}

impl CandidatePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = classify(&path);
        Self { path, kind }
    }

    /// The directory this candidate describes: the bundle directory for
    /// workspace/project forms, otherwise the file's containing directory.
    ///
    /// Both bundle forms keep their description file directly inside the
    /// bundle, so this is uniformly the parent directory.
    pub fn project_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Human-facing name, with bundle extensions stripped
    /// (`App.xcworkspace` → `App`).
    pub fn display_name(&self) -> String {
        crate::label::package_name_for_dir(self.project_dir())
    }
}
