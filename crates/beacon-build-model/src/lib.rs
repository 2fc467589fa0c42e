//! Build-description data model and best-effort target extraction for Beacon.
//!
//! This crate turns the text of a build-description file (an Xcode workspace
//! bundle, a Swift package manifest, or a Bazel-style `BUILD` file) into a
//! [`BuildPackage`]:
//! - canonical `//package:name` labels relative to the nearest workspace root
//! - zero-or-more declared [`BuildTarget`]s, extracted by an ordered chain of
//!   increasingly generic grammars with a guaranteed non-empty fallback

mod label;
mod model;
mod rules;
pub mod scan;

pub use label::{
    is_workspace_root, package_label, package_name_for_dir, target_label, workspace_root_for,
    WORKSPACE_ROOT_MARKERS,
};
pub use model::*;
pub use rules::{extract_targets, package_for_file, RuleContext};
