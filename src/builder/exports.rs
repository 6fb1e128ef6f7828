//! Named export discovery for per-export builds
//!
//! Reads an entry module's source and lists the runtime exports it declares,
//! in declaration order. Type-only exports are skipped since they vanish from
//! the bundle. `export * from "./x"` cannot be expanded from the text alone,
//! so its specifier is returned for the caller to follow.

use regex::Regex;
use std::sync::OnceLock;

static DEFAULT_RE: OnceLock<Regex> = OnceLock::new();
static DECLARATION_RE: OnceLock<Regex> = OnceLock::new();
static VARIABLE_RE: OnceLock<Regex> = OnceLock::new();
static CLAUSE_RE: OnceLock<Regex> = OnceLock::new();
static NAMESPACE_RE: OnceLock<Regex> = OnceLock::new();
static STAR_RE: OnceLock<Regex> = OnceLock::new();

/// Exports found in one module
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModuleExports {
    /// Export names in declaration order
    pub names: Vec<String>,
    /// Specifiers of `export * from "..."` statements, in order
    pub star_sources: Vec<String>,
}

enum Found {
    Name(String),
    Star(String),
}

/// Scan module source text for exports
///
/// # Examples
///
/// ```
/// use size_diff::builder::exports::scan_exports;
///
/// let found = scan_exports(r#"
///     export const Button = () => null;
///     export { helper as utils } from "./utils";
///     export type Props = {};
///     export default Button;
/// "#);
/// assert_eq!(found.names, vec!["Button", "utils", "default"]);
/// ```
pub fn scan_exports(source: &str) -> ModuleExports {
    let mut found: Vec<(usize, Found)> = Vec::new();

    let default_re = DEFAULT_RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*export\s+default\b").expect("default export regex is valid")
    });
    for m in default_re.find_iter(source) {
        found.push((m.start(), Found::Name("default".to_string())));
    }

    let declaration_re = DECLARATION_RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*export\s+(?:declare\s+)?(?:async\s+)?(?:function\s*\*?|abstract\s+class|class|const\s+enum|enum)\s+([A-Za-z_$][\w$]*)",
        )
        .expect("declaration export regex is valid")
    });
    for cap in declaration_re.captures_iter(source) {
        if let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) {
            found.push((whole.start(), Found::Name(name.as_str().to_string())));
        }
    }

    let variable_re = VARIABLE_RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*export\s+(?:declare\s+)?(?:const|let|var)\s+")
            .expect("variable export regex is valid")
    });
    for m in variable_re.find_iter(source) {
        let declarators = declarator_list(&source[m.end()..]);
        if declarators.starts_with("enum ") {
            continue;
        }
        let mut names = Vec::new();
        for declarator in split_top_level(declarators) {
            declarator_names(declarator, &mut names);
        }
        for (offset, name) in names.into_iter().enumerate() {
            found.push((m.start() + offset, Found::Name(name)));
        }
    }

    let clause_re = CLAUSE_RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*export\s+(type\s+)?\{([^}]*)\}").expect("export clause regex is valid")
    });
    for cap in clause_re.captures_iter(source) {
        if cap.get(1).is_some() {
            continue;
        }
        let (Some(whole), Some(list)) = (cap.get(0), cap.get(2)) else {
            continue;
        };
        for (offset, name) in clause_names(list.as_str()).into_iter().enumerate() {
            found.push((whole.start() + offset, Found::Name(name)));
        }
    }

    let namespace_re = NAMESPACE_RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*export\s+\*\s+as\s+([A-Za-z_$][\w$]*)\s+from")
            .expect("namespace export regex is valid")
    });
    for cap in namespace_re.captures_iter(source) {
        if let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) {
            found.push((whole.start(), Found::Name(name.as_str().to_string())));
        }
    }

    let star_re = STAR_RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*export\s+\*\s+from\s+['"]([^'"]+)['"]"#)
            .expect("star export regex is valid")
    });
    for cap in star_re.captures_iter(source) {
        if let (Some(whole), Some(specifier)) = (cap.get(0), cap.get(1)) {
            found.push((whole.start(), Found::Star(specifier.as_str().to_string())));
        }
    }

    found.sort_by_key(|(offset, _)| *offset);

    let mut exports = ModuleExports::default();
    for (_, item) in found {
        match item {
            Found::Name(name) => {
                if !exports.names.contains(&name) {
                    exports.names.push(name);
                }
            }
            Found::Star(specifier) => exports.star_sources.push(specifier),
        }
    }
    exports
}

/// Exported names of an `export { a, b as c, type T }` list
fn clause_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty() && !item.starts_with("type "))
        .filter_map(|item| {
            let exported = match item.split_once(" as ") {
                Some((_, alias)) => alias.trim(),
                None => item,
            };
            let exported = exported.trim_matches(|c| c == '"' || c == '\'');
            (!exported.is_empty()).then(|| exported.to_string())
        })
        .collect()
}

/// Text of a `const`/`let`/`var` declarator list, up to its terminator
///
/// Ends at a `;` outside brackets and strings, or at a line break unless the
/// line ends with `,` or `=`.
fn declarator_list(rest: &str) -> &str {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => return &rest[..i],
            '\n' if depth == 0 => {
                let line = rest[..i].trim_end();
                if !line.is_empty() && !line.ends_with(',') && !line.ends_with('=') {
                    return &rest[..i];
                }
            }
            _ => {}
        }
    }
    rest
}

/// Split on commas that sit outside brackets and strings
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Position of the first top-level `:` or `=` in a binding element
fn binding_separator(element: &str) -> Option<(usize, char)> {
    let mut depth = 0usize;
    for (i, c) in element.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ':' | '=' if depth == 0 => return Some((i, c)),
            _ => {}
        }
    }
    None
}

/// Leading identifier of `text`, if any
fn leading_identifier(text: &str) -> Option<(&str, &str)> {
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c == '_' || c == '$' || (c.is_alphanumeric() && (i > 0 || !c.is_numeric()))))
        .map_or(text.len(), |(i, _)| i);
    (end > 0).then(|| text.split_at(end))
}

/// Names bound by one declarator: `a = 1`, `b: T`, `{ c, d: e }` or `[f, ...g]`
fn declarator_names(declarator: &str, names: &mut Vec<String>) {
    let declarator = declarator.trim();
    if declarator.starts_with('{') || declarator.starts_with('[') {
        let pattern = match binding_separator(declarator) {
            Some((i, _)) => &declarator[..i],
            None => declarator,
        };
        pattern_names(pattern.trim(), names);
        return;
    }
    if let Some((name, rest)) = leading_identifier(declarator) {
        let rest = rest.trim_start();
        if rest.is_empty() || rest.starts_with(['=', ':', '!']) {
            names.push(name.to_string());
        }
    }
}

/// Names bound by an object or array destructuring pattern
fn pattern_names(pattern: &str, names: &mut Vec<String>) {
    let is_object = pattern.starts_with('{');
    let inner = pattern
        .get(1..pattern.len().saturating_sub(1))
        .unwrap_or_default();
    for element in split_top_level(inner) {
        let element = element.trim().trim_start_matches("...").trim_start();
        if element.is_empty() {
            continue;
        }
        let target = match binding_separator(element) {
            Some((i, ':')) if is_object => {
                let value = element[i + 1..].trim();
                match binding_separator(value) {
                    Some((j, '=')) => &value[..j],
                    _ => value,
                }
            }
            Some((i, '=')) => &element[..i],
            _ => element,
        };
        let target = target.trim();
        if target.starts_with('{') || target.starts_with('[') {
            pattern_names(target, names);
        } else if let Some((name, rest)) = leading_identifier(target) {
            if rest.trim().is_empty() {
                names.push(name.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declarations_in_source_order() {
        let source = r#"
export function useToggle() {}
export class Store {}
export const A = 1, B = 2;
export let counter = 0;
export async function load() {}
export function* ids() {}
export enum Color { Red }
"#;
        assert_eq!(
            scan_exports(source).names,
            vec!["useToggle", "Store", "A", "B", "counter", "load", "ids", "Color"]
        );
    }

    #[test]
    fn test_every_declarator_in_a_list_is_exported() {
        let source = "export const A = 1, B = 2;\nexport let x, y;";
        assert_eq!(scan_exports(source).names, vec!["A", "B", "x", "y"]);
    }

    #[test]
    fn test_declarator_lists_span_lines_and_nested_initializers() {
        let source = r#"
export const theme = { colors: ["red", "blue"], sizes: { sm: 1, lg: 2 } },
  format = (a, b) => `${a},${b}`,
  label: string = "a, b";
export var count = 1
export const total = count + 1
"#;
        assert_eq!(
            scan_exports(source).names,
            vec!["theme", "format", "label", "count", "total"]
        );
    }

    #[test]
    fn test_destructured_declarations() {
        let source = "export const { a, b: renamed, c = 1, ...rest } = obj, [first, , third = 3] = list;";
        assert_eq!(
            scan_exports(source).names,
            vec!["a", "renamed", "c", "rest", "first", "third"]
        );
    }

    #[test]
    fn test_clause_aliases_and_type_only_items() {
        let source = r#"
export { a, b as c, type T, default as Widget } from "./mod";
export type { Props } from "./types";
export { x as default };
"#;
        assert_eq!(scan_exports(source).names, vec!["a", "c", "Widget", "default"]);
    }

    #[test]
    fn test_type_declarations_are_not_runtime_exports() {
        let source = "export interface Props {}\nexport type Size = 'sm';\nexport declare const v: number;";
        assert_eq!(scan_exports(source).names, vec!["v"]);
    }

    #[test]
    fn test_star_exports_are_reported_separately() {
        let source = r#"
export * from "./button";
export * as icons from "./icons";
export default Root;
"#;
        let found = scan_exports(source);
        assert_eq!(found.names, vec!["icons", "default"]);
        assert_eq!(found.star_sources, vec!["./button"]);
    }

    #[test]
    fn test_duplicate_names_are_reported_once() {
        let source = "export { a };\nexport { a as a };";
        assert_eq!(scan_exports(source).names, vec!["a"]);
    }

    #[test]
    fn test_module_without_exports() {
        assert_eq!(scan_exports("const x = 1;\nconsole.log(x);"), ModuleExports::default());
    }
}
