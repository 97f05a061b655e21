// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Remote path joining.
//!
//! Remote containers are always Linux, so remote paths are `/`-separated
//! regardless of the host platform and are handled lexically here instead of
//! through `std::path`. Note that `Path::join` would discard the base path for
//! an absolute suffix, which is never what a user typing `/app/src` means.

/// Join a remote base path with a user-supplied suffix and clean the result.
///
/// The suffix is always treated as relative to `base`, with or without a
/// leading separator.
pub fn join_remote_path(base: &str, suffix: &str) -> String {
    let joined = match (base.is_empty(), suffix.is_empty()) {
        (true, true) => return String::new(),
        (true, false) => suffix.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}/{}", base, suffix),
    };
    clean(&joined)
}

/// Lexically normalise a `/`-separated path: collapse repeated separators,
/// drop `.` segments, resolve `..` against preceding segments and strip any
/// trailing separator. `..` never climbs above the root of an absolute path.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let body = parts.join("/");
    if rooted {
        format!("/{}", body)
    } else if body.is_empty() {
        ".".to_string()
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_relative_suffix() {
        assert_eq!(join_remote_path("/data", "app/src"), "/data/app/src");
    }

    #[test]
    fn test_join_suffix_with_leading_separator() {
        assert_eq!(join_remote_path("/data", "/app/src"), "/data/app/src");
        assert_eq!(join_remote_path("/data/", "//app/src/"), "/data/app/src");
    }

    #[test]
    fn test_join_overlay_base_path() {
        let base = "/var/lib/docker/overlay2/3f2a9c/merged";
        assert_eq!(
            join_remote_path(base, "usr/src/app"),
            "/var/lib/docker/overlay2/3f2a9c/merged/usr/src/app"
        );
    }

    #[test]
    fn test_join_empty_sides() {
        assert_eq!(join_remote_path("/data", ""), "/data");
        assert_eq!(join_remote_path("", "app"), "app");
        assert_eq!(join_remote_path("", ""), "");
    }

    #[test]
    fn test_clean_dot_segments() {
        assert_eq!(clean("/data/./app/../src"), "/data/src");
        assert_eq!(clean("/../etc"), "/etc");
        assert_eq!(clean("a/../../b"), "../b");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("./"), ".");
    }
}
