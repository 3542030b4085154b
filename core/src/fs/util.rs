use std::cmp::Ordering;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Storage tile file extensions (lowercase, without the dot).
pub const TILE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff"];

pub fn is_hidden(path: &Path) -> bool {
    path.file_name().and_then(OsStr::to_str).map(|name| name.starts_with('.')).unwrap_or(false)
}

pub fn is_tile_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| TILE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Piece of a file name: digit runs compare numerically, everything else case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NameChunk {
    Number(u128),
    Text(String),
}

pub fn natural_key(name: &str) -> Vec<NameChunk> {
    let mut chunks = Vec::new();
    let mut rest = name;
    while let Some(first) = rest.chars().next() {
        let is_digit = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, ch)| ch.is_ascii_digit() != is_digit)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        chunks.push(if is_digit {
            NameChunk::Number(chunk.parse().unwrap_or(u128::MAX))
        } else {
            NameChunk::Text(chunk.to_lowercase())
        });
        rest = tail;
    }
    chunks
}

/// Order tile paths so `tile_2` precedes `tile_10`; ties fall back to the raw path.
pub fn natural_cmp_path(a: &Path, b: &Path) -> Ordering {
    let a_str = a.to_string_lossy();
    let b_str = b.to_string_lossy();
    natural_key(&a_str).cmp(&natural_key(&b_str)).then_with(|| a_str.cmp(&b_str))
}

pub fn sanitize_zip_path(path: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) | Component::RootDir => return None,
        }
    }
    if clean.as_os_str().is_empty() { None } else { Some(clean) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_by_value() {
        let mut names = vec!["tile_10.png", "tile_2.png", "tile_1.png", "TILE_3.png"];
        names.sort_by(|a, b| natural_cmp_path(Path::new(a), Path::new(b)));
        assert_eq!(names, vec!["tile_1.png", "tile_2.png", "TILE_3.png", "tile_10.png"]);
    }

    #[test]
    fn splits_digit_runs() {
        assert_eq!(
            natural_key("R2C10"),
            vec![
                NameChunk::Text("r".into()),
                NameChunk::Number(2),
                NameChunk::Text("c".into()),
                NameChunk::Number(10)
            ]
        );
    }

    #[test]
    fn rejects_escaping_zip_paths() {
        assert!(sanitize_zip_path(Path::new("../tile.png")).is_none());
        assert_eq!(sanitize_zip_path(Path::new("./t/0.png")), Some(PathBuf::from("t/0.png")));
    }
}
