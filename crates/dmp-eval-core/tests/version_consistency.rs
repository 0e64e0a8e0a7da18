//! Every workspace crate inherits the workspace version.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn manifest(path: &Path) -> toml::Value {
    let text = std::fs::read_to_string(path.join("Cargo.toml"))
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e));
    text.parse().unwrap()
}

#[test]
fn all_members_use_workspace_version() {
    let root = workspace_root();
    let members = manifest(&root)["workspace"]["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert!(!members.is_empty());

    for member in &members {
        let doc = manifest(&root.join(member));
        let inherits = doc["package"]["version"]
            .get("workspace")
            .and_then(|v| v.as_bool());
        assert_eq!(
            inherits,
            Some(true),
            "{member} should use version.workspace = true"
        );
    }
}

#[test]
fn internal_dependency_versions_match_workspace() {
    let root = workspace_root();
    let doc = manifest(&root);
    let version = doc["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(version, env!("CARGO_PKG_VERSION"));

    for name in ["dmp-eval-core", "dmp-eval-state", "dmp-eval-lookup"] {
        let pinned = doc["workspace"]["dependencies"][name]["version"]
            .as_str()
            .unwrap();
        assert_eq!(pinned, version, "{name} is pinned to {pinned}");
    }
}
