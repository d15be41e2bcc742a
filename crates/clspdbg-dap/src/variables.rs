//! Display-safe variable decoration.
//!
//! Engine variable trees are unbounded: compiler-generated names can run to
//! hundreds of characters and values to kilobytes. Decoration applies fixed
//! display policy — opcode mnemonics for the interpreter's `_op` register,
//! name shortening above 50 characters, value truncation above 100 — while
//! always retaining the originals for on-demand expansion.

use serde::{Deserialize, Serialize};

use clspdbg_engine::is_source_path;

use crate::protocol::Variable;

/// Names longer than this get a synthesized display name.
pub const NAME_DISPLAY_LIMIT: usize = 50;
/// Length of a plain truncated display name, before the ellipsis.
const NAME_TRUNCATE_LEN: usize = 30;
/// Values longer than this are truncated for display.
pub const VALUE_DISPLAY_LIMIT: usize = 100;
/// Length of a truncated display value, before the ellipsis.
const VALUE_TRUNCATE_LEN: usize = 80;

/// A variable decorated for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayVariable {
    /// Engine-reported name.
    pub name: String,
    /// Display value — possibly opcode-decoded and truncated.
    pub value: String,
    /// If > 0, the variable has children behind this reference.
    pub variables_reference: i64,
    /// Shortened name, present when the original exceeds the limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Full name, retained whenever a display name was synthesized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    /// Full value, retained whenever the display value was truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_value: Option<String>,
    /// Whether the display value was truncated.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_long_value: bool,
}

impl DisplayVariable {
    /// The name to render: the shortened form when one exists.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// Mnemonic for a CLVM operator code; unknown codes render as `op_<code>`.
pub fn opcode_mnemonic(code: i64) -> String {
    let name = match code {
        1 => "quote",
        2 => "apply",
        3 => "if",
        4 => "cons",
        5 => "first",
        6 => "rest",
        7 => "listp",
        8 => "raise",
        9 => "eq",
        10 => "sha256",
        11 => "add",
        12 => "subtract",
        13 => "multiply",
        14 => "divmod",
        15 => "substr",
        16 => "+",
        17 => "-",
        18 => "*",
        19 => "/",
        20 => "=",
        21 => ">",
        22 => "ash",
        23 => "lsh",
        24 => "logand",
        25 => "logior",
        26 => "logxor",
        27 => "lognot",
        28 => "softfork",
        _ => return format!("op_{code}"),
    };
    name.to_string()
}

/// Locate a `<file>(<line>):<col>` fragment inside a generated name.
///
/// The file part must carry a source extension and the column digits must
/// be explicit for the fragment to count.
fn find_location_fragment(name: &str) -> Option<(String, u32, u32)> {
    for (idx, ch) in name.char_indices() {
        if ch != '(' {
            continue;
        }
        let prefix = &name[..idx];
        let file_start = prefix
            .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .map(|p| p + 1)
            .unwrap_or(0);
        let file = &prefix[file_start..];
        if file.is_empty() || !is_source_path(file) {
            continue;
        }

        let rest = &name[idx + 1..];
        let close = match rest.find(')') {
            Some(c) => c,
            None => continue,
        };
        let line: u32 = match rest[..close].parse() {
            Ok(l) => l,
            Err(_) => continue,
        };
        let after = &rest[close + 1..];
        let digits = match after.strip_prefix(':') {
            Some(d) => d,
            None => continue,
        };
        let col_end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        let column: u32 = match digits[..col_end].parse() {
            Ok(c) => c,
            Err(_) => continue,
        };

        return Some((file.to_string(), line, column));
    }
    None
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Apply the display policy to one variable.
pub fn decorate(variable: Variable) -> DisplayVariable {
    let Variable {
        name,
        mut value,
        variables_reference,
    } = variable;

    // The interpreter's operator register renders as code + mnemonic.
    if name == "_op" {
        if let Ok(code) = value.trim().parse::<i64>() {
            value = format!("{code} ({})", opcode_mnemonic(code));
        }
    }

    let (display_name, original_name) = if name.chars().count() > NAME_DISPLAY_LIMIT {
        let display = match find_location_fragment(&name) {
            Some((file, line, column)) => format!("{file}:{line}:{column}_arguments"),
            None => format!("{}...", truncate_chars(&name, NAME_TRUNCATE_LEN)),
        };
        (Some(display), Some(name.clone()))
    } else {
        (None, None)
    };

    let (value, original_value, is_long_value) =
        if value.chars().count() > VALUE_DISPLAY_LIMIT {
            let truncated = format!("{}...", truncate_chars(&value, VALUE_TRUNCATE_LEN));
            (truncated, Some(value), true)
        } else {
            (value, None, false)
        };

    DisplayVariable {
        name,
        value,
        variables_reference,
        display_name,
        original_name,
        original_value,
        is_long_value,
    }
}

/// Decorate a whole `variables` response body, preserving order.
pub fn decorate_all(variables: Vec<Variable>) -> Vec<DisplayVariable> {
    variables.into_iter().map(decorate).collect()
}
