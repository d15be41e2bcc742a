//! Frame-name parsing and editor filename reconciliation.
//!
//! The engine reports locations as composite frame names of the form
//! `<file>(<line>):<column>`, while the editor surface names its open files
//! with its own conventions (synthetic `opened_` / `local_` prefixes,
//! varying directory depth). This module turns frame names into structured
//! locations and matches an engine filename against the open-file set.

use serde::{Deserialize, Serialize};

use clspdbg_engine::is_source_path;

use crate::protocol::StackFrame;

/// A resolved source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Source file as named by the engine.
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// Where the editor should take the user after a stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    /// The stop is in an already-open file.
    Reveal {
        /// The editor's name for the file.
        file: String,
        /// Line to reveal.
        line: u32,
    },
    /// The stop is in a file the editor must fetch and open first.
    Fetch {
        /// The engine's name for the file.
        file: String,
        /// Line to reveal once open.
        line: u32,
    },
}

/// Parse a composite frame name into a location.
///
/// The name must contain both parentheses; the file is everything before
/// the first `(`, the line is the digits up to the following `)`, and a
/// `:` after the closing paren introduces the column (default 1). Returns
/// `None` when the line segment does not parse — the caller falls back to
/// the frame-reported fields.
pub fn parse_frame_name(name: &str) -> Option<Location> {
    let open = name.find('(')?;
    let rest = &name[open + 1..];
    let close = rest.find(')')?;

    let line: u32 = rest[..close].parse().ok()?;

    let after = &rest[close + 1..];
    let column = match after.find(':') {
        Some(colon) => after[colon + 1..].parse().unwrap_or(1),
        None => 1,
    };

    Some(Location {
        file: name[..open].to_string(),
        line,
        column,
    })
}

/// Derive a location from a stack frame.
///
/// Falls back to the frame-reported line/column with the raw name as a bare
/// filename when the name carries a source extension, and to `"unknown"`
/// otherwise.
pub fn location_from_frame(frame: &StackFrame) -> Location {
    if let Some(location) = parse_frame_name(&frame.name) {
        return location;
    }
    let file = if is_source_path(&frame.name) {
        frame.name.clone()
    } else {
        "unknown".to_string()
    };
    Location {
        file,
        line: frame.line,
        column: frame.column,
    }
}

/// Strip the editor's synthetic source prefixes.
pub fn strip_synthetic_prefix(name: &str) -> &str {
    name.strip_prefix("opened_")
        .or_else(|| name.strip_prefix("local_"))
        .unwrap_or(name)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Match an engine-reported filename against the editor's open files.
///
/// Tries exact equality, basename equality, then suffix containment in
/// either direction, each both with and without the synthetic prefix.
/// Returns the editor's name for the first open file that matches, or
/// `None` when the file must be fetched before navigating.
pub fn reconcile_filename(engine_file: &str, open_files: &[String]) -> Option<String> {
    let engine_base = basename(engine_file);

    for open in open_files {
        let clean = strip_synthetic_prefix(open);

        if open == engine_file || clean == engine_file {
            return Some(open.clone());
        }

        if basename(open) == engine_base || basename(clean) == engine_base {
            return Some(open.clone());
        }

        if clean.ends_with(engine_file)
            || engine_file.ends_with(clean)
            || open.ends_with(engine_file)
            || engine_file.ends_with(open.as_str())
        {
            return Some(open.clone());
        }
    }
    None
}

/// Decide how the editor should navigate to a stop location.
pub fn navigation_target(location: &Location, open_files: &[String]) -> NavigationTarget {
    match reconcile_filename(&location.file, open_files) {
        Some(file) => NavigationTarget::Reveal {
            file,
            line: location.line,
        },
        None => NavigationTarget::Fetch {
            file: location.file.clone(),
            line: location.line,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_parse_full_frame_name() {
        assert_eq!(
            parse_frame_name("foo.clsp(12):4"),
            Some(Location {
                file: "foo.clsp".into(),
                line: 12,
                column: 4
            })
        );
    }

    #[test]
    fn location_parse_defaults_column() {
        assert_eq!(
            parse_frame_name("foo.clsp(12)"),
            Some(Location {
                file: "foo.clsp".into(),
                line: 12,
                column: 1
            })
        );
    }

    #[test]
    fn location_parse_bare_name_is_none() {
        assert_eq!(parse_frame_name("nolocation"), None);
    }

    #[test]
    fn location_parse_garbage_line_is_none() {
        assert_eq!(parse_frame_name("foo.clsp(abc):2"), None);
        assert_eq!(parse_frame_name("foo.clsp()"), None);
    }

    #[test]
    fn location_parse_garbage_column_defaults() {
        let location = parse_frame_name("foo.clsp(7):xyz").unwrap();
        assert_eq!(location.column, 1);
    }

    #[test]
    fn location_parse_unclosed_paren_is_none() {
        assert_eq!(parse_frame_name("foo.clsp(12"), None);
    }

    #[test]
    fn location_from_frame_prefers_composite_name() {
        let frame = StackFrame {
            id: 0,
            name: "util.clib(5):2".into(),
            line: 99,
            column: 99,
        };
        let location = location_from_frame(&frame);
        assert_eq!(location.file, "util.clib");
        assert_eq!(location.line, 5);
        assert_eq!(location.column, 2);
    }

    #[test]
    fn location_from_frame_bare_source_filename() {
        let frame = StackFrame {
            id: 0,
            name: "main.clsp".into(),
            line: 3,
            column: 7,
        };
        let location = location_from_frame(&frame);
        assert_eq!(location.file, "main.clsp");
        assert_eq!(location.line, 3);
        assert_eq!(location.column, 7);
    }

    #[test]
    fn location_from_frame_unknown_file() {
        let frame = StackFrame {
            id: 0,
            name: "<anonymous>".into(),
            line: 1,
            column: 1,
        };
        assert_eq!(location_from_frame(&frame).file, "unknown");
    }

    #[test]
    fn location_reconcile_exact_match() {
        let open = vec!["main.clsp".to_string()];
        assert_eq!(
            reconcile_filename("main.clsp", &open).as_deref(),
            Some("main.clsp")
        );
    }

    #[test]
    fn location_reconcile_synthetic_prefix() {
        let open = vec!["opened_main.clsp".to_string()];
        assert_eq!(
            reconcile_filename("main.clsp", &open).as_deref(),
            Some("opened_main.clsp")
        );
        let open = vec!["local_util.clib".to_string()];
        assert_eq!(
            reconcile_filename("util.clib", &open).as_deref(),
            Some("local_util.clib")
        );
    }

    #[test]
    fn location_reconcile_basename_match() {
        let open = vec!["puzzles/deep/main.clsp".to_string()];
        assert_eq!(
            reconcile_filename("main.clsp", &open).as_deref(),
            Some("puzzles/deep/main.clsp")
        );
    }

    #[test]
    fn location_reconcile_suffix_match() {
        let open = vec!["lib/util.clib".to_string()];
        assert_eq!(
            reconcile_filename("src/lib/util.clib", &open).as_deref(),
            Some("lib/util.clib")
        );
    }

    #[test]
    fn location_reconcile_no_match() {
        let open = vec!["other.clsp".to_string()];
        assert_eq!(reconcile_filename("main.clsp", &open), None);
        assert_eq!(reconcile_filename("main.clsp", &[]), None);
    }

    #[test]
    fn location_navigation_reveal_vs_fetch() {
        let location = Location {
            file: "util.clib".into(),
            line: 9,
            column: 1,
        };
        let open = vec!["opened_util.clib".to_string()];
        assert_eq!(
            navigation_target(&location, &open),
            NavigationTarget::Reveal {
                file: "opened_util.clib".into(),
                line: 9
            }
        );
        assert_eq!(
            navigation_target(&location, &[]),
            NavigationTarget::Fetch {
                file: "util.clib".into(),
                line: 9
            }
        );
    }
}
