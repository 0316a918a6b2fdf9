use crate::vfs::{Error, Result};

/// Upper bound on the byte length of a single path component.
pub const MAX_NAME_LEN: usize = 255;

/// Defensive cap on resolution depth. Any real path fits well inside this;
/// hitting the cap means the dentry tree is corrupt.
pub const MAX_PATH_DEPTH: usize = 256;

/// Iterate the non-empty components of a path.
///
/// `/` is the sole separator; repeated separators collapse.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Split a path into its parent directory and final component.
///
/// e.g. `/foo/bar` => (`/foo`, `bar`); `bar` => (`.`, `bar`).
pub fn dirname_and_filename(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    let Some(final_slash) = trimmed.rfind('/') else {
        return (".", trimmed);
    };
    let dir = if final_slash == 0 {
        "/"
    } else {
        &trimmed[..final_slash]
    };
    (dir, &trimmed[final_slash + 1..])
}

/// Reject components the VFS never passes down to a driver.
pub fn check_component(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_components() {
        let parts: Vec<&str> = components("/a//b/c/").collect();
        assert_eq!(parts, ["a", "b", "c"]);
        assert_eq!(components("/").count(), 0);
        assert_eq!(components("").count(), 0);
    }

    #[test]
    fn dirname_filename() {
        assert_eq!(dirname_and_filename("/foo/bar"), ("/foo", "bar"));
        assert_eq!(dirname_and_filename("/foo"), ("/", "foo"));
        assert_eq!(dirname_and_filename("foo"), (".", "foo"));
        assert_eq!(dirname_and_filename("/a/b/"), ("/a", "b"));
    }

    #[test]
    fn long_component_rejected() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(check_component(&long), Err(Error::NameTooLong));
        assert!(check_component("ok.txt").is_ok());
    }
}
