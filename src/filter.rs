//! File-name normalization and extension allow-list checks.

/// Characters not allowed in local file names.
const ILLEGAL_NAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replaces characters illegal in local file names with `_`.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if ILLEGAL_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// The substring after the last `.`, or the empty string if there is none.
pub fn extension_of(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// Whether `name` passes the extension allow-list.
///
/// An empty allow-list admits everything. Otherwise the extension must
/// case-insensitively equal some entry; an absent name never passes a
/// non-empty list.
pub fn is_allowed(name: Option<&str>, allow_list: &[String]) -> bool {
    if allow_list.is_empty() {
        return true;
    }
    let Some(name) = name else {
        return false;
    };
    let ext = extension_of(name);
    allow_list.iter().any(|a| a.eq_ignore_ascii_case(ext))
}
