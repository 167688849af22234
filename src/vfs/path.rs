//! POSIX-style virtual paths.
//!
//! Virtual paths are always absolute (`/main.css`), use `/` as separator and
//! never contain `.` or `..` components after normalization.

use super::VfsError;

/// Normalize an absolute virtual path.
///
/// ```ignore
/// normalize("/css/./base/../main.css") -> Ok("/css/main.css")
/// normalize("/../etc")                 -> Err(EscapesRoot)
/// normalize("main.css")                -> Err(InvalidPath)
/// ```
pub fn normalize(path: &str) -> Result<String, VfsError> {
    if !path.starts_with('/') {
        return Err(VfsError::InvalidPath(path.to_string()));
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(VfsError::EscapesRoot(path.to_string()));
                }
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Err(VfsError::InvalidPath(path.to_string()));
    }

    Ok(format!("/{}", parts.join("/")))
}

/// Directory portion of a virtual path (`/a/b.css` -> `/a`, `/b.css` -> `/`).
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Join a relative module path onto the directory of `base`, then normalize.
pub fn join(base: &str, relative: &str) -> Result<String, VfsError> {
    let dir = parent(base);
    let joined = if dir == "/" {
        format!("/{relative}")
    } else {
        format!("{dir}/{relative}")
    };
    normalize(&joined)
}

/// Iterate over every ancestor directory of a normalized path, nearest first.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    let mut current = path;
    std::iter::from_fn(move || {
        let dir = parent(current);
        if dir == "/" || dir == current {
            return None;
        }
        current = dir;
        Some(dir)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/./b/../c.css").unwrap(), "/a/c.css");
        assert_eq!(normalize("//a//b.css").unwrap(), "/a/b.css");
        assert!(matches!(normalize("/../x"), Err(VfsError::EscapesRoot(_))));
        assert!(matches!(normalize("x.css"), Err(VfsError::InvalidPath(_))));
        assert!(matches!(normalize("/"), Err(VfsError::InvalidPath(_))));
    }

    #[test]
    fn test_join_relative_to_base_directory() {
        assert_eq!(join("/main.css", "./a.css").unwrap(), "/a.css");
        assert_eq!(join("/css/main.css", "../base.css").unwrap(), "/base.css");
        assert_eq!(join("/css/main.css", "parts/x.css").unwrap(), "/css/parts/x.css");
    }

    #[test]
    fn test_ancestors() {
        let all: Vec<_> = ancestors("/a/b/c.css").collect();
        assert_eq!(all, vec!["/a/b", "/a"]);
        assert_eq!(ancestors("/c.css").count(), 0);
    }
}
