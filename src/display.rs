//! Display policy for answer evidence.
//!
//! Sources that point at images can be shown next to an answer, but only
//! when the model actually answered. A fallback-sentence answer surfaces no
//! images, whatever was retrieved.

use crate::models::AnswerRecord;

/// File extensions treated as displayable images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Returns true if `source` ends in a known image extension (case-insensitive).
pub fn is_image_source(source: &str) -> bool {
    let Some((_, extension)) = source.rsplit_once('.') else {
        return false;
    };
    IMAGE_EXTENSIONS
        .iter()
        .any(|known| extension.eq_ignore_ascii_case(known))
}

/// Returns the image sources worth showing alongside `record`.
///
/// Empty when the answer is the fallback sentence.
pub fn illustrative_images<'a>(record: &'a AnswerRecord, fallback: &str) -> Vec<&'a str> {
    if record.is_fallback(fallback) {
        return Vec::new();
    }

    record
        .sources
        .iter()
        .map(String::as_str)
        .filter(|source| is_image_source(source))
        .collect()
}
