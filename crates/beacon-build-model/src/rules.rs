use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::label::{package_label, package_name_for_dir, target_label};
use crate::model::{BuildPackage, BuildTarget, TargetKind};
use crate::scan;

/// Label context for one build-description file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleContext {
    /// Package directory basename (bundle extensions stripped).
    pub package_name: String,
    /// `//package` prefix computed against the nearest workspace root.
    pub package_label: String,
}

impl RuleContext {
    pub fn for_file(build_file: &Path) -> Self {
        let dir = build_file.parent().unwrap_or_else(|| Path::new("/"));
        Self {
            package_name: package_name_for_dir(dir),
            package_label: package_label(build_file),
        }
    }

    fn label(&self, name: &str) -> String {
        target_label(&self.package_label, name)
    }

    /// Qualify a raw dependency string against this package.
    ///
    /// `//`-prefixed strings are already labels and pass through verbatim;
    /// `:name` and bare names resolve within the package. Never validated
    /// against the target graph.
    fn dependency_label(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.starts_with("//") {
            raw.to_string()
        } else if let Some(rest) = raw.strip_prefix(':') {
            self.label(rest)
        } else {
            self.label(raw)
        }
    }
}

type Strategy = fn(&str, &RuleContext) -> Vec<BuildTarget>;

/// Extraction strategies in strict priority order; the first one yielding at
/// least one target wins.
const STRATEGIES: [(&str, Strategy); 4] = [
    ("package-manifest", manifest_targets),
    ("module-form", module_targets),
    ("platform-rules", platform_rule_targets),
    ("generic-rules", generic_rule_targets),
];

/// Extract build targets from build-description text.
///
/// Never panics on well-formed UTF-8 and never returns an empty list: when no
/// grammar matches, a synthesized library/test pair named after the package
/// stands in.
pub fn extract_targets(text: &str, context: &RuleContext) -> Vec<BuildTarget> {
    let text = scan::strip_comments(text);
    for (name, strategy) in STRATEGIES {
        let targets = strategy(&text, context);
        if !targets.is_empty() {
            tracing::debug!(
                target: "beacon.build.model",
                strategy = name,
                package = %context.package_label,
                count = targets.len(),
                "extracted build targets"
            );
            return targets;
        }
    }
    fallback_targets(context)
}

/// Parse a build-description file into a [`BuildPackage`].
///
/// Returns `None` (no package) without reading when the path shape is
/// suspicious, and on any read failure. Callers cache `None` like a hit, so
/// permanently broken files don't get re-parsed in a hot loop.
pub fn package_for_file(path: &Path) -> Option<BuildPackage> {
    if is_suspicious_path(path) {
        tracing::debug!(
            target: "beacon.build.model",
            path = %path.display(),
            "refusing suspicious build-description path"
        );
        return None;
    }

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!(
                target: "beacon.build.model",
                path = %path.display(),
                error = %err,
                "failed to read build description; treating as no package"
            );
            return None;
        }
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("/"));
    let context = RuleContext::for_file(path);
    Some(BuildPackage {
        name: context.package_name.clone(),
        path: dir.to_path_buf(),
        targets: extract_targets(&text, &context),
    })
}

/// External-repository paths (`@repo//...`) never describe first-party
/// packages, and `undefined`/`null` segments are placeholder values some
/// callers have been observed to interpolate into paths.
fn is_suspicious_path(path: &Path) -> bool {
    let text = path.to_string_lossy();
    text.contains('@') || text.contains("undefined") || text.contains("null")
}

/// Strategy 1: Swift package manifest with an explicit target collection.
///
/// An outer `Package(` call declares `targets: [...]`; each `.target(`,
/// `.executableTarget(`, `.testTarget(`, `.binaryTarget(` sub-call inside the
/// collection contributes one target. Sub-call argument blocks nest
/// arbitrarily (closures, arrays), so spans are depth-counted rather than
/// regex-bounded.
fn manifest_targets(text: &str, context: &RuleContext) -> Vec<BuildTarget> {
    const SUB_TARGET_CALLS: [(&str, TargetKind); 4] = [
        (".target", TargetKind::Library),
        (".executableTarget", TargetKind::Binary),
        (".testTarget", TargetKind::Test),
        (".binaryTarget", TargetKind::Library),
    ];

    let mut out = Vec::new();
    for start in scan::find_keyword(text, "Package") {
        let Some(open) = scan::next_call_open(text, start + "Package".len()) else {
            continue;
        };
        let Some((body, _end)) = scan::extract_balanced(text, open) else {
            continue;
        };
        let Some(collection) = scan::keyed_list_arg(body, "targets") else {
            continue;
        };

        // Declaration order within the file, not per-call-form order.
        let mut calls: Vec<(usize, TargetKind, usize)> = Vec::new();
        for (keyword, kind) in SUB_TARGET_CALLS {
            for pos in scan::find_keyword(collection, keyword) {
                calls.push((pos, kind, keyword.len()));
            }
        }
        calls.sort_by_key(|(pos, _, _)| *pos);

        for (pos, kind, keyword_len) in calls {
            let Some(open) = scan::next_call_open(collection, pos + keyword_len) else {
                continue;
            };
            let Some((args, _end)) = scan::extract_balanced(collection, open) else {
                continue;
            };
            let Some(name) = scan::keyed_string_arg(args, "name") else {
                continue;
            };

            let dependencies = scan::keyed_list_arg(args, "dependencies")
                .map(|deps| {
                    scan::quoted_strings(deps)
                        .iter()
                        .map(|dep| context.dependency_label(dep))
                        .collect()
                })
                .unwrap_or_default();

            out.push(
                BuildTarget::new(name.as_str(), kind, context.label(&name))
                    .with_dependencies(dependencies),
            );
        }
    }
    out
}

/// Strategy 2: "whole package is one module" call forms.
///
/// Synthesizes exactly one library target named after the package, plus a
/// `<package>Tests` test target when the call body references test-related
/// argument keys.
fn module_targets(text: &str, context: &RuleContext) -> Vec<BuildTarget> {
    const MODULE_FORMS: [&str; 2] = ["apple_framework", "swift_module"];
    const TEST_ARG_KEYS: [&str; 3] = ["test_deps", "unit_test_srcs", "tests"];

    for form in MODULE_FORMS {
        for start in scan::find_keyword(text, form) {
            let Some(open) = scan::next_call_open(text, start + form.len()) else {
                continue;
            };
            let Some((body, _end)) = scan::extract_balanced(text, open) else {
                continue;
            };

            let library = BuildTarget::new(
                context.package_name.as_str(),
                TargetKind::Library,
                context.label(&context.package_name),
            );

            let has_tests = TEST_ARG_KEYS
                .iter()
                .any(|key| !scan::find_keyword(body, key).is_empty());
            if !has_tests {
                return vec![library];
            }

            let test_name = format!("{}Tests", context.package_name);
            let test = BuildTarget::new(test_name.as_str(), TargetKind::Test, context.label(&test_name))
                .with_dependencies(vec![library.label.clone()]);
            return vec![library, test];
        }
    }
    Vec::new()
}

/// Strategy 3: fixed platform-specific rule vocabulary.
fn platform_rule_targets(text: &str, context: &RuleContext) -> Vec<BuildTarget> {
    const PLATFORM_RULES: [&str; 9] = [
        "ios_application",
        "macos_application",
        "ios_extension",
        "ios_framework",
        "swift_library",
        "objc_library",
        "ios_unit_test",
        "ios_ui_test",
        "macos_unit_test",
    ];

    let mut calls: Vec<(usize, &str)> = Vec::new();
    for rule in PLATFORM_RULES {
        for pos in scan::find_keyword(text, rule) {
            calls.push((pos, rule));
        }
    }
    calls.sort_by_key(|(pos, _)| *pos);

    let mut out = Vec::new();
    for (pos, rule) in calls {
        let Some(open) = scan::next_call_open(text, pos + rule.len()) else {
            continue;
        };
        let Some((args, _end)) = scan::extract_balanced(text, open) else {
            continue;
        };
        let Some(name) = scan::keyed_string_arg(args, "name") else {
            continue;
        };

        let kind = if rule.contains("test") {
            TargetKind::Test
        } else if rule.contains("application") {
            TargetKind::Binary
        } else {
            TargetKind::Library
        };

        let dependencies = scan::keyed_list_arg(args, "deps")
            .map(|deps| {
                scan::quoted_strings(deps)
                    .iter()
                    .map(|dep| context.dependency_label(dep))
                    .collect()
            })
            .unwrap_or_default();

        out.push(
            BuildTarget::new(name.as_str(), kind, context.label(&name))
                .with_dependencies(dependencies),
        );
    }
    out
}

/// Rule identifiers that carry a `name` argument but never declare a
/// buildable target.
const NON_TARGET_RULES: [&str; 7] = [
    "load",
    "glob",
    "select",
    "config_setting",
    "filegroup",
    "package",
    "exports_files",
];

fn is_non_target_rule(rule: &str) -> bool {
    rule.len() < 3 || NON_TARGET_RULES.contains(&rule)
}

fn heuristic_kind(rule: &str, name: &str) -> TargetKind {
    let rule = rule.to_ascii_lowercase();
    let name = name.to_ascii_lowercase();
    if rule.contains("test") || name.contains("test") {
        TargetKind::Test
    } else if rule.contains("binary") || rule.contains("application") || name.contains("app") {
        TargetKind::Binary
    } else {
        TargetKind::Library
    }
}

/// Strategy 4: any `identifier(` call with a `name = "..."` argument.
///
/// Two argument-order variants are tried before giving up: a fast pattern for
/// `name` as the first argument, then a balanced-span pass accepting `name`
/// anywhere in the argument list. Deduplicated by target name, first
/// occurrence wins.
fn generic_rule_targets(text: &str, context: &RuleContext) -> Vec<BuildTarget> {
    let first = generic_name_first(text, context);
    if !first.is_empty() {
        return first;
    }
    generic_name_anywhere(text, context)
}

fn generic_name_first(text: &str, context: &RuleContext) -> Vec<BuildTarget> {
    static NAME_FIRST: OnceLock<Regex> = OnceLock::new();
    let re = NAME_FIRST.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*([A-Za-z_][A-Za-z0-9_]{2,})\s*\(\s*name\s*=\s*"([^"]+)""#)
            .expect("valid regex")
    });

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for caps in re.captures_iter(text) {
        let rule = &caps[1];
        let name = &caps[2];
        if is_non_target_rule(rule) || !seen.insert(name.to_string()) {
            continue;
        }
        out.push(BuildTarget::new(
            name,
            heuristic_kind(rule, name),
            context.label(name),
        ));
    }
    out
}

fn generic_name_anywhere(text: &str, context: &RuleContext) -> Vec<BuildTarget> {
    static CALL_OPEN: OnceLock<Regex> = OnceLock::new();
    let re = CALL_OPEN
        .get_or_init(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]{2,})\s*\(").expect("valid regex"));

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for caps in re.captures_iter(text) {
        let (Some(whole), Some(rule)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if is_non_target_rule(rule.as_str()) {
            continue;
        }
        // The match ends on the opening delimiter itself.
        let open = whole.end() - 1;
        let Some((args, _end)) = scan::extract_balanced(text, open) else {
            continue;
        };
        let Some(name) = scan::keyed_string_arg(args, "name") else {
            continue;
        };
        if !seen.insert(name.clone()) {
            continue;
        }
        out.push(BuildTarget::new(
            name.as_str(),
            heuristic_kind(rule.as_str(), &name),
            context.label(&name),
        ));
    }
    out
}

/// Guaranteed fallback: a recognized build-description file never yields zero
/// targets.
fn fallback_targets(context: &RuleContext) -> Vec<BuildTarget> {
    let library = BuildTarget::new(
        context.package_name.as_str(),
        TargetKind::Library,
        context.label(&context.package_name),
    );
    let test_name = format!("{}Tests", context.package_name);
    let test = BuildTarget::new(test_name.as_str(), TargetKind::Test, context.label(&test_name))
        .with_dependencies(vec![library.label.clone()]);
    vec![library, test]
}
