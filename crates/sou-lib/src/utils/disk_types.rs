//! Storage-provider code to display-name mapping.

/// Known storage-provider codes and their display names, in display order.
pub const DISK_TYPES: [(&str, &str); 13] = [
    ("baidu", "百度"),
    ("aliyun", "阿里"),
    ("115", "115"),
    ("123", "123"),
    ("xunlei", "迅雷"),
    ("quark", "夸克"),
    ("mobile", "移动"),
    ("tianyi", "天翼"),
    ("uc", "UC"),
    ("pikpak", "PikPak"),
    ("ed2k", "电驴"),
    ("magnet", "磁力"),
    ("other", "其他"),
];

/// Display name for a storage-provider code; unknown codes display as
/// themselves.
pub fn display_name(code: &str) -> &str {
    DISK_TYPES
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map() {
        assert_eq!(display_name("baidu"), "百度");
        assert_eq!(display_name("quark"), "夸克");
        assert_eq!(display_name("115"), "115");
        assert_eq!(display_name("pikpak"), "PikPak");
        assert_eq!(display_name("magnet"), "磁力");
    }

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(display_name("dropbox"), "dropbox");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn table_has_no_duplicate_codes() {
        for (i, (code, _)) in DISK_TYPES.iter().enumerate() {
            assert!(
                !DISK_TYPES[i + 1..].iter().any(|(other, _)| other == code),
                "duplicate code: {code}"
            );
        }
    }
}
