//! Boost library catalog.

/// Every library the tool knows how to build, in canonical (sorted) order.
pub const LIBRARIES: &[&str] = &[
    "atomic",
    "charconv",
    "chrono",
    "cobalt",
    "container",
    "context",
    "contract",
    "coroutine",
    "date_time",
    "exception",
    "fiber",
    "filesystem",
    "graph",
    "iostreams",
    "json",
    "locale",
    "log",
    "math",
    "nowide",
    "program_options",
    "python",
    "random",
    "regex",
    "serialization",
    "stacktrace",
    "system",
    "test",
    "thread",
    "timer",
    "type_erasure",
    "url",
    "wave",
];

/// Library left out of the default list on older toolchains.
pub const CONDITIONAL_LIBRARY: &str = "cobalt";

/// Minimum host clang major version for [`CONDITIONAL_LIBRARY`] to be a default.
pub const CONDITIONAL_MIN_CLANG: u32 = 15;

/// Libraries producing more than one archive.
const META_LIBRARIES: &[(&str, &[&str])] = &[
    (
        "math",
        &[
            "boost_math_c99",
            "boost_math_c99f",
            "boost_math_c99l",
            "boost_math_tr1",
            "boost_math_tr1f",
            "boost_math_tr1l",
        ],
    ),
    ("log", &["boost_log", "boost_log_setup"]),
    ("stacktrace", &["boost_stacktrace_basic", "boost_stacktrace_noop"]),
    ("serialization", &["boost_serialization", "boost_wserialization"]),
    (
        "test",
        &[
            "boost_prg_exec_monitor",
            "boost_test_exec_monitor",
            "boost_unit_test_framework",
        ],
    ),
];

pub fn is_known_library(name: &str) -> bool {
    LIBRARIES.contains(&name)
}

/// Libraries built when none are requested explicitly.
///
/// `cobalt` needs a recent clang; it is dropped when the host clang is older
/// than [`CONDITIONAL_MIN_CLANG`] or its version is unknown.
pub fn default_libraries(clang_major: Option<u32>) -> Vec<&'static str> {
    let include_conditional = clang_major.is_some_and(|v| v >= CONDITIONAL_MIN_CLANG);
    LIBRARIES
        .iter()
        .copied()
        .filter(|lib| include_conditional || *lib != CONDITIONAL_LIBRARY)
        .collect()
}

/// Physical archive names (without `lib` prefix and `.a` suffix) for a library.
///
/// `python_suffix` is the version tag of the Python the library links
/// against, e.g. `311` for `boost_python311`.
pub fn physical_archives(library: &str, python_suffix: Option<&str>) -> Vec<String> {
    if library == "python" {
        return vec![format!("boost_python{}", python_suffix.unwrap_or_default())];
    }
    match META_LIBRARIES.iter().find(|(name, _)| *name == library) {
        Some((_, archives)) => archives.iter().map(|a| a.to_string()).collect(),
        None => vec![format!("boost_{library}")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_sorted_and_unique() {
        let mut sorted = LIBRARIES.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, LIBRARIES);
    }

    #[test]
    fn test_meta_libraries_are_in_catalog() {
        for (name, _) in META_LIBRARIES {
            assert!(is_known_library(name), "{name} missing from catalog");
        }
    }

    #[test]
    fn test_default_libraries_conditional_member() {
        assert!(default_libraries(Some(16)).contains(&"cobalt"));
        assert!(default_libraries(Some(15)).contains(&"cobalt"));
        assert!(!default_libraries(Some(14)).contains(&"cobalt"));
        assert!(!default_libraries(None).contains(&"cobalt"));
        assert_eq!(default_libraries(None).len(), LIBRARIES.len() - 1);
    }

    #[test]
    fn test_physical_archives() {
        assert_eq!(physical_archives("atomic", None), vec!["boost_atomic"]);
        assert_eq!(physical_archives("log", None), vec!["boost_log", "boost_log_setup"]);
        assert_eq!(physical_archives("math", None).len(), 6);
        assert_eq!(physical_archives("python", Some("311")), vec!["boost_python311"]);
        assert_eq!(physical_archives("python", None), vec!["boost_python"]);
    }
}
