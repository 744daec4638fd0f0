//! Install-path resolution. Configured client paths may carry a `*` segment
//! standing for a version directory (the Windows client installs under
//! `...\Drive File Stream\<version>\`); the highest version wins.

use std::path::{Path, PathBuf};

/// Resolve a configured install path to an existing filesystem path.
/// Returns `None` when the path (or any glob segment) does not resolve.
pub fn resolve_install_path(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.contains('*') {
        let path = PathBuf::from(raw);
        return path.exists().then_some(path);
    }

    let mut segments = raw.split(['/', '\\']).filter(|s| !s.is_empty());
    let first = segments.next()?;
    if first == "*" {
        return None;
    }
    // First segment: a drive prefix on Windows, a path root otherwise.
    let mut current = if first.ends_with(':') {
        PathBuf::from(format!("{first}\\"))
    } else if raw.starts_with(['/', '\\']) {
        Path::new("/").join(first)
    } else {
        PathBuf::from(first)
    };
    for segment in segments {
        current = if segment == "*" {
            highest_version_dir(&current)?
        } else {
            current.join(segment)
        };
    }
    current.exists().then_some(current)
}

/// Pick the subdirectory of `dir` with the highest dotted version name.
fn highest_version_dir(dir: &Path) -> Option<PathBuf> {
    let mut best: Option<(Vec<u64>, PathBuf)> = None;
    for entry in std::fs::read_dir(dir).ok()?.flatten() {
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name();
        let Some(version) = parse_version(&name.to_string_lossy()) else {
            continue;
        };
        if best.as_ref().map(|(v, _)| version > *v).unwrap_or(true) {
            best = Some((version, entry.path()));
        }
    }
    best.map(|(_, path)| path)
}

fn parse_version(name: &str) -> Option<Vec<u64>> {
    name.split('.').map(|part| part.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("client");
        std::fs::write(&existing, b"").unwrap();

        let raw = existing.to_string_lossy().into_owned();
        assert_eq!(resolve_install_path(&raw), Some(existing));
        assert_eq!(
            resolve_install_path(&dir.path().join("missing").to_string_lossy()),
            None
        );
    }

    #[test]
    fn star_picks_highest_version() {
        let dir = tempfile::tempdir().unwrap();
        for v in ["1.2.3", "10.0.1", "2.99.0", "notaversion"] {
            std::fs::create_dir(dir.path().join(v)).unwrap();
        }
        std::fs::write(dir.path().join("10.0.1").join("client.exe"), b"").unwrap();

        let raw = format!("{}/*/client.exe", dir.path().display());
        assert_eq!(
            resolve_install_path(&raw),
            Some(dir.path().join("10.0.1").join("client.exe"))
        );
    }

    #[test]
    fn star_with_no_version_dirs_resolves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("notaversion")).unwrap();

        let raw = format!("{}/*/client.exe", dir.path().display());
        assert_eq!(resolve_install_path(&raw), None);
    }

    #[test]
    fn version_comparison_is_numeric_not_lexical() {
        assert!(parse_version("10.0.1").unwrap() > parse_version("9.9.9").unwrap());
        assert!(parse_version("1.10").unwrap() > parse_version("1.9").unwrap());
        assert!(parse_version("86.0.3.0").is_some());
        assert!(parse_version("v86").is_none());
    }
}
