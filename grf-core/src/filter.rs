use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::domain::{ArchiveEntry, EntryId};
use crate::encoding::NativeCodec;

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

fn compile(raw: &str) -> Option<Pattern> {
    let src = if raw.contains(['*', '?', '[']) {
        raw.to_string()
    } else {
        format!("*{raw}*")
    };
    match Pattern::new(&src) {
        Ok(p) => Some(p),
        Err(e) => {
            debug!(pattern = raw, error = %e, "matching pattern literally");
            Pattern::new(&format!("*{}*", Pattern::escape(raw))).ok()
        }
    }
}

/// Entries whose decoded full path or basename matches `pattern`,
/// case-insensitively, sorted by decoded path.
///
/// A pattern without wildcards matches as a substring. A pattern that does not
/// compile is matched literally.
pub fn search(entries: &[ArchiveEntry], pattern: &str, codec: &dyn NativeCodec) -> Vec<EntryId> {
    let Some(pattern) = compile(pattern) else {
        return Vec::new();
    };
    let mut hits: Vec<(String, EntryId)> = entries
        .iter()
        .filter_map(|e| {
            let full = codec.decode_native_to_portable(&e.virtual_path);
            let base = codec.decode_native_to_portable(e.basename());
            (pattern.matches_with(&full, OPTIONS) || pattern.matches_with(&base, OPTIONS))
                .then_some((full, e.id))
        })
        .collect();
    hits.sort();
    hits.into_iter().map(|(_, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StorageFlags;
    use crate::encoding::EucKr;

    fn entries() -> Vec<ArchiveEntry> {
        let paths: Vec<Vec<u8>> = vec![
            b"data\\sprite\\Hero.SPR".to_vec(),
            b"data\\texture\\hero.bmp".to_vec(),
            b"data\\map.gat".to_vec(),
            vec![b'd', b'\\', 0xC7, 0xD1, b'.', b't', b'x', b't'],
        ];
        paths
            .into_iter()
            .zip(1u32..)
            .map(|(path, id)| ArchiveEntry {
                id: EntryId(id),
                virtual_path: path,
                size: 1,
                storage_size: 1,
                storage_offset: 0,
                flags: StorageFlags::FILE,
            })
            .collect()
    }

    #[test]
    fn wildcard_is_case_insensitive() {
        assert_eq!(search(&entries(), "*.spr", &EucKr), vec![EntryId(1)]);
    }

    #[test]
    fn plain_text_is_a_substring_sorted_by_path() {
        assert_eq!(search(&entries(), "hero", &EucKr), vec![EntryId(1), EntryId(2)]);
    }

    #[test]
    fn basename_patterns_match() {
        assert_eq!(search(&entries(), "map.*", &EucKr), vec![EntryId(3)]);
        assert_eq!(search(&entries(), "한.txt", &EucKr), vec![EntryId(4)]);
    }

    #[test]
    fn broken_pattern_is_literal() {
        assert!(search(&entries(), "[", &EucKr).is_empty());
    }
}
