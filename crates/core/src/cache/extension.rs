//! File extension selection for stored blobs.
//!
//! Keeps cached artifacts inspectable on disk without sniffing their bytes.

const CONTENT_TYPE_EXTENSIONS: &[(&str, &str)] = &[
    ("application/json", ".json"),
    ("text/json", ".json"),
    ("text/html", ".html"),
    ("text/plain", ".txt"),
    ("text/xml", ".xml"),
    ("application/xml", ".xml"),
    ("text/css", ".css"),
    ("text/javascript", ".js"),
    ("application/javascript", ".js"),
    ("image/png", ".png"),
    ("image/jpeg", ".jpg"),
    ("image/gif", ".gif"),
    ("image/webp", ".webp"),
    ("audio/mpeg", ".mp3"),
    ("audio/mp4", ".m4a"),
    ("audio/wav", ".wav"),
    ("audio/x-wav", ".wav"),
    ("audio/flac", ".flac"),
    ("audio/ogg", ".ogg"),
    ("video/mp4", ".mp4"),
    ("application/pdf", ".pdf"),
    ("application/octet-stream", ".bin"),
];

/// Extension used for unrecognized content types.
pub const DEFAULT_EXTENSION: &str = ".bin";

/// Map a MIME content type (parameters allowed) to a file extension with its dot.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let base = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();

    if let Some((_, ext)) = CONTENT_TYPE_EXTENSIONS.iter().find(|(mime, _)| *mime == base) {
        return ext;
    }

    // structured suffixes such as application/vnd.api+json
    if base.contains("json") {
        ".json"
    } else if base.contains("xml") {
        ".xml"
    } else if base.contains("html") {
        ".html"
    } else {
        DEFAULT_EXTENSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_matches() {
        assert_eq!(extension_for_content_type("application/json"), ".json");
        assert_eq!(extension_for_content_type("text/html"), ".html");
        assert_eq!(extension_for_content_type("audio/mpeg"), ".mp3");
        assert_eq!(extension_for_content_type("image/jpeg"), ".jpg");
    }

    #[test]
    fn test_parameters_and_case_ignored() {
        assert_eq!(extension_for_content_type("Application/JSON; charset=UTF-8"), ".json");
    }

    #[test]
    fn test_partial_matches() {
        assert_eq!(extension_for_content_type("application/vnd.api+json"), ".json");
        assert_eq!(extension_for_content_type("application/atom+xml"), ".xml");
        assert_eq!(extension_for_content_type("text/x-html"), ".html");
    }

    #[test]
    fn test_unknown_defaults_to_bin() {
        assert_eq!(extension_for_content_type("application/x-whatever"), DEFAULT_EXTENSION);
        assert_eq!(extension_for_content_type(""), DEFAULT_EXTENSION);
    }
}
