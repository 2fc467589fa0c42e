use std::path::{Path, PathBuf};

/// Marker filenames whose presence designates a directory as the top of a
/// build workspace.
pub const WORKSPACE_ROOT_MARKERS: [&str; 3] = ["WORKSPACE", "WORKSPACE.bazel", "MODULE.bazel"];

/// Walk upwards from a build-description file to find its workspace root.
///
/// Returns the first ancestor directory containing a workspace marker. If no
/// marker exists anywhere above the file, the file's own containing directory
/// is returned (degenerate single-package workspace), so this never fails.
pub fn workspace_root_for(build_file: &Path) -> PathBuf {
    let package_dir = build_file.parent().unwrap_or_else(|| Path::new("/"));

    let mut dir = package_dir;
    loop {
        if is_workspace_root(dir) {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return package_dir.to_path_buf(),
        }
    }
}

pub fn is_workspace_root(dir: &Path) -> bool {
    WORKSPACE_ROOT_MARKERS
        .iter()
        .any(|marker| dir.join(marker).is_file())
}

/// Compute the `//package` label prefix for a build-description file.
///
/// The path portion is the file's directory relative to the resolved
/// workspace root. In the degenerate case where the root *is* the file's own
/// directory, the directory's basename stands in for the relative path, so a
/// marker-less `pkg/widgets/BUILD` still labels as `//widgets`.
pub fn package_label(build_file: &Path) -> String {
    let package_dir = build_file.parent().unwrap_or_else(|| Path::new("/"));
    let root = workspace_root_for(build_file);

    let rel = package_dir
        .strip_prefix(&root)
        .unwrap_or_else(|_| Path::new(""));
    if rel.as_os_str().is_empty() {
        format!("//{}", package_name_for_dir(package_dir))
    } else {
        format!("//{}", rel.to_string_lossy().replace('\\', "/"))
    }
}

/// `//package:name`.
pub fn target_label(package_label: &str, name: &str) -> String {
    format!("{package_label}:{name}")
}

/// Package name for a directory: its basename with bundle extensions
/// stripped (`App.xcworkspace` → `App`).
pub fn package_name_for_dir(dir: &Path) -> String {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string());
    for suffix in [".xcworkspace", ".xcodeproj"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn workspace_root_is_nearest_marker_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("MODULE.bazel"));
        touch(&root.join("modules/core/BUILD"));

        assert_eq!(
            workspace_root_for(&root.join("modules/core/BUILD")),
            root.to_path_buf()
        );
        assert_eq!(
            package_label(&root.join("modules/core/BUILD")),
            "//modules/core"
        );
    }

    #[test]
    fn nested_marker_shadows_outer_marker() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("WORKSPACE"));
        touch(&root.join("vendor/dep/WORKSPACE.bazel"));
        touch(&root.join("vendor/dep/lib/BUILD"));

        assert_eq!(
            workspace_root_for(&root.join("vendor/dep/lib/BUILD")),
            root.join("vendor/dep")
        );
        assert_eq!(package_label(&root.join("vendor/dep/lib/BUILD")), "//lib");
    }

    #[test]
    fn markerless_file_falls_back_to_its_own_directory() {
        let dir = tempfile::tempdir().unwrap();
        let build_file = dir.path().join("pkg/widgets/BUILD");
        touch(&build_file);

        assert_eq!(workspace_root_for(&build_file), dir.path().join("pkg/widgets"));
        // The basename stands in for the empty relative path.
        assert_eq!(package_label(&build_file), "//widgets");
        assert_eq!(
            target_label(&package_label(&build_file), "widgets"),
            "//widgets:widgets"
        );
    }

    #[test]
    fn package_at_workspace_root_uses_its_basename() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("WORKSPACE.bazel"));
        touch(&root.join("BUILD"));

        let label = package_label(&root.join("BUILD"));
        assert!(label.starts_with("//"), "label must be //-prefixed: {label}");
        assert!(!label.contains(':'));
    }
}
