//! Media type sniffing for user-supplied files.

/// Media types the file picker and drop target accept.
pub const ACCEPTED_INPUT_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

pub fn detect_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => {
            tracing::debug!(
                "Unrecognized image signature (first 4 bytes: {:02X?})",
                &bytes[..bytes.len().min(4)]
            );
            None
        }
    }
}

pub fn is_accepted_input(media_type: &str) -> bool {
    let media_type = media_type.trim().to_lowercase();
    ACCEPTED_INPUT_TYPES.contains(&media_type.as_str())
}

/// Media type a file picker would declare for a file name's extension.
pub fn media_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Declared type wins when present; otherwise fall back to the file signature.
pub fn resolve_media_type(declared: Option<&str>, bytes: &[u8]) -> Option<String> {
    declared
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .or_else(|| detect_image_mime(bytes).map(str::to_string))
}
