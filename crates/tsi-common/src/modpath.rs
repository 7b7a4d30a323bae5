//! Module specifier arithmetic.
//!
//! Pure path math, no filesystem access: specifiers resolve against an
//! importer to normalised, forward-slash paths with no `.`/`..` segments.
//! Bare specifiers (no leading `/` or `./`/`../`) pass through for the
//! host to interpret.

/// Whether a specifier is relative (`./x`, `../x`).
#[must_use]
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Whether a specifier is bare (`lodash`, `node:fs`).
#[must_use]
pub fn is_bare(specifier: &str) -> bool {
    !specifier.starts_with('/') && !is_relative(specifier)
}

/// The directory portion of a path (up to the last `/`).
#[must_use]
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

/// Resolve a specifier against an importing module's path.
///
/// - relative specifiers resolve against the importer's directory
/// - absolute specifiers are normalised as-is
/// - bare specifiers pass through untouched
#[must_use]
pub fn resolve(specifier: &str, importer: Option<&str>) -> String {
    if is_bare(specifier) {
        return specifier.to_string();
    }
    if specifier.starts_with('/') {
        return normalize(specifier);
    }
    let base = importer.map(parent).unwrap_or("");
    if base.is_empty() {
        normalize(specifier)
    } else {
        normalize(&format!("{base}/{specifier}"))
    }
}

/// Collapse `.` and `..` segments; keep a leading `/`.
#[must_use]
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    if path.starts_with('/') {
        format!("/{}", segments.join("/"))
    } else {
        segments.join("/")
    }
}

/// Add the default `.ts` extension to extensionless specifiers.
#[must_use]
pub fn with_default_extension(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    if file.contains('.') {
        path.to_string()
    } else {
        format!("{path}.ts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_resolution() {
        assert_eq!(
            resolve("./utils.ts", Some("/src/app/main.ts")),
            "/src/app/utils.ts"
        );
        assert_eq!(
            resolve("../lib/helper.ts", Some("/src/app/main.ts")),
            "/src/lib/helper.ts"
        );
    }

    #[test]
    fn bare_specifiers_pass_through() {
        assert_eq!(resolve("lodash", Some("/src/main.ts")), "lodash");
    }

    #[test]
    fn absolute_paths_normalise() {
        assert_eq!(resolve("/lib/../src/index.ts", None), "/src/index.ts");
    }

    #[test]
    fn default_extension() {
        assert_eq!(with_default_extension("/src/utils"), "/src/utils.ts");
        assert_eq!(with_default_extension("/src/utils.ts"), "/src/utils.ts");
    }
}
