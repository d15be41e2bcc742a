//! Include-path policy configuration.
//!
//! Where the compiler searches for `(include ...)` files depends on where
//! the entry file came from: an uploaded file only sees its own directory,
//! a bundled example sees the example tree, and a workspace folder search
//! expands to every folder in the workspace plus the conventional
//! `includes` locations.

use serde::{Deserialize, Serialize};

/// Where an entry file originated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A file uploaded directly by the user.
    Uploaded,
    /// A bundled example program.
    Example,
    /// A file inside an opened workspace folder.
    Workspace,
    /// Origin unknown.
    #[default]
    Other,
}

/// Include search paths per source kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeConfig {
    /// Paths searched for uploaded files.
    #[serde(default = "default_uploaded")]
    pub uploaded: Vec<String>,
    /// Paths searched for bundled examples.
    #[serde(default = "default_example")]
    pub example: Vec<String>,
    /// Paths appended after workspace folder expansion.
    #[serde(default = "default_workspace_extra")]
    pub workspace_extra: Vec<String>,
    /// Paths searched when the origin is unknown.
    #[serde(default = "default_fallback")]
    pub fallback: Vec<String>,
}

fn default_uploaded() -> Vec<String> {
    vec![".".into()]
}

fn default_example() -> Vec<String> {
    vec![
        "examples".into(),
        ".".into(),
        "examples/includes".into(),
        "includes".into(),
    ]
}

fn default_workspace_extra() -> Vec<String> {
    vec!["..".into(), "../includes".into()]
}

fn default_fallback() -> Vec<String> {
    vec![".".into(), "includes".into()]
}

impl Default for IncludeConfig {
    fn default() -> Self {
        Self {
            uploaded: default_uploaded(),
            example: default_example(),
            workspace_extra: default_workspace_extra(),
            fallback: default_fallback(),
        }
    }
}

impl IncludeConfig {
    /// Compute the include search paths for an entry file of the given kind.
    ///
    /// `workspace_folders` lists every folder of the opened workspace (in
    /// tree order) and only matters for [`SourceKind::Workspace`].
    pub fn paths_for(&self, kind: SourceKind, workspace_folders: &[String]) -> Vec<String> {
        match kind {
            SourceKind::Uploaded => self.uploaded.clone(),
            SourceKind::Example => self.example.clone(),
            SourceKind::Workspace => {
                let mut paths = vec![".".to_string()];
                paths.extend(workspace_folders.iter().cloned());
                paths.extend(self.workspace_extra.iter().cloned());
                paths
            }
            SourceKind::Other => self.fallback.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_uploaded_paths() {
        let config = IncludeConfig::default();
        assert_eq!(config.paths_for(SourceKind::Uploaded, &[]), vec!["."]);
    }

    #[test]
    fn config_example_paths() {
        let config = IncludeConfig::default();
        let paths = config.paths_for(SourceKind::Example, &[]);
        assert_eq!(paths, vec!["examples", ".", "examples/includes", "includes"]);
    }

    #[test]
    fn config_workspace_expansion() {
        let config = IncludeConfig::default();
        let folders = vec!["lib".to_string(), "lib/hashes".to_string()];
        let paths = config.paths_for(SourceKind::Workspace, &folders);
        assert_eq!(paths, vec![".", "lib", "lib/hashes", "..", "../includes"]);
    }

    #[test]
    fn config_fallback_paths() {
        let config = IncludeConfig::default();
        assert_eq!(
            config.paths_for(SourceKind::Other, &[]),
            vec![".", "includes"]
        );
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: IncludeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, IncludeConfig::default());
    }

    #[test]
    fn config_deserializes_overrides() {
        let config: IncludeConfig =
            serde_json::from_str(r#"{"uploaded": ["src", "vendor"]}"#).unwrap();
        assert_eq!(config.uploaded, vec!["src", "vendor"]);
        assert_eq!(config.example, IncludeConfig::default().example);
    }

    #[test]
    fn config_source_kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&SourceKind::Uploaded).unwrap(),
            "\"uploaded\""
        );
        let kind: SourceKind = serde_json::from_str("\"workspace\"").unwrap();
        assert_eq!(kind, SourceKind::Workspace);
    }
}
