// WHY: converted names end up on disks and in download headers, so they are
// stripped of anything a filesystem could interpret and capped in bytes

use crate::config::FileNameConfig;

const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Windows device names that cannot be used as a file stem
const DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Split `name` into stem and extension (with its dot); dotfiles have no extension
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

fn clean(part: &str) -> String {
    part.chars()
        .filter(|c| !c.is_control() && !RESERVED.contains(c))
        .collect()
}

/// Longest prefix of `text` that fits in `max_bytes` without splitting a character
fn truncate_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Make `name` safe to store: reserved characters removed, trailing dots and
/// spaces trimmed, byte length capped while keeping the extension
pub fn sanitize_file_name(name: &str, config: &FileNameConfig) -> String {
    let (stem, extension) = split_extension(name);
    let mut extension = clean(extension);
    if extension.len() <= 1 {
        extension.clear();
    }
    // an extension that alone blows the budget is dropped
    if extension.len() >= config.max_bytes {
        extension.clear();
    }

    let stem = clean(stem);
    let stem = stem.trim().trim_end_matches(['.', ' ']);
    let stem = truncate_bytes(stem, config.max_bytes - extension.len()).trim_end_matches(['.', ' ']);

    let stem = if stem.is_empty() {
        config.placeholder.clone()
    } else if DEVICE_NAMES.contains(&stem.to_ascii_uppercase().as_str()) {
        format!("_{stem}")
    } else {
        stem.to_string()
    };

    let stem = truncate_bytes(&stem, config.max_bytes - extension.len());
    format!("{stem}{extension}")
}
