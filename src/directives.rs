//! Inline `#r` reference directives
//!
//! A script may declare its dependencies in its first lines:
//!
//! ```text
//! #r "pkg:Geometry@1.2.0"
//! // comments and blank lines may sit between directives
//! #r "lib/util.emxs"
//!
//! return util_version();
//! ```
//!
//! The head ends at the first line that is none of: blank, `//` comment,
//! `#r` directive. Directive lines are replaced by empty lines so diagnostics
//! from the compiler keep their line numbers.

use std::path::PathBuf;
use std::sync::OnceLock;
use regex::Regex;
use crate::backend::ast::Pos;
use crate::backend::Diagnostic;
use crate::resolver::DependencySpec;

const DIRECTIVE_PATTERN: &str = r#"^\s*#r\s+"([^"]*)"\s*;?\s*$"#;

/// The directive regex, compiled once per process.
fn directive_regex() -> Result<&'static Regex, &'static regex::Error> {
    static DIRECTIVE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    DIRECTIVE.get_or_init(|| Regex::new(DIRECTIVE_PATTERN)).as_ref()
}

/// Source with its directives removed, plus the declared dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directives {
    pub source: String,
    pub specs: Vec<DependencySpec>,
}

fn is_directive_line(trimmed: &str) -> bool {
    match trimmed.strip_prefix("#r") {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace) || rest.starts_with('"'),
        None => false,
    }
}

/// Parse a directive target into a spec.
///
/// `pkg:Name@Version` is a package, anything else a file path.
pub fn parse_target(target: &str) -> Result<DependencySpec, String> {
    if target.is_empty() {
        return Err("Empty reference target".to_string());
    }
    if let Some(package) = target.strip_prefix("pkg:") {
        return match package.split_once('@') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok(DependencySpec::package(name, version))
            }
            _ => Err(format!(
                "Malformed package reference '{}'; expected 'pkg:Name@Version'",
                target
            )),
        };
    }
    Ok(DependencySpec::File(PathBuf::from(target)))
}

/// Pull `#r` directives off the head of `source`.
pub fn extract(source: &str) -> Result<Directives, Diagnostic> {
    let re = directive_regex()
        .map_err(|e| Diagnostic::new(Pos::new(1, 1), format!("invalid directive pattern: {}", e)))?;

    let mut lines: Vec<&str> = source.split('\n').collect();
    let mut specs = Vec::new();

    for (idx, line) in lines.iter_mut().enumerate() {
        let text: &str = *line;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        if !is_directive_line(trimmed) {
            break;
        }

        let col = text.find('#').map(|c| c + 1).unwrap_or(1);
        let pos = Pos::new(idx as u32 + 1, col as u32);
        let caps = re.captures(text.trim_end_matches('\r'))
            .ok_or_else(|| Diagnostic::new(pos, "Expected '#r \"<path or pkg:Name@Version>\"'"))?;
        let spec = parse_target(&caps[1]).map_err(|msg| Diagnostic::new(pos, msg))?;
        specs.push(spec);
        *line = "";
    }

    Ok(Directives {
        source: lines.join("\n"),
        specs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_regex_compiled_once() {
        let first = directive_regex().unwrap();
        let second = directive_regex().unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(first.is_match("#r \"a.emxs\""));
    }

    #[test]
    fn test_no_directives() {
        let d = extract("return 1;").unwrap();
        assert_eq!(d.source, "return 1;");
        assert!(d.specs.is_empty());
    }

    #[test]
    fn test_head_directives_blanked() {
        let src = "#r \"pkg:Geometry@1.2.0\"\n// util\n#r \"lib/util.emxs\";\n\nreturn 1;";
        let d = extract(src).unwrap();
        assert_eq!(d.specs, vec![
            DependencySpec::package("Geometry", "1.2.0"),
            DependencySpec::File(PathBuf::from("lib/util.emxs")),
        ]);
        assert_eq!(d.source, "\n// util\n\n\nreturn 1;");
    }

    #[test]
    fn test_directive_after_code_is_not_extracted() {
        let src = "var a = 1;\n#r \"x.emxs\"";
        let d = extract(src).unwrap();
        assert!(d.specs.is_empty());
        assert_eq!(d.source, src);
    }

    #[test]
    fn test_malformed_directive() {
        let err = extract("\n  #r util.emxs").unwrap_err();
        assert_eq!(err.pos, Pos::new(2, 3));
        assert!(err.message.starts_with("Expected '#r"));

        let err = extract("#r \"pkg:Geometry\"").unwrap_err();
        assert_eq!(err.to_string(),
            "(1,1): Malformed package reference 'pkg:Geometry'; expected 'pkg:Name@Version'");
    }

    #[test]
    fn test_crlf_line_endings() {
        let d = extract("#r \"a.emxs\"\r\nreturn 1;\r\n").unwrap();
        assert_eq!(d.specs.len(), 1);
        assert_eq!(d.source, "\nreturn 1;\r\n");
    }
}
