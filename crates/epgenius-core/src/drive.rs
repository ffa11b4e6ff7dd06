//! Google Drive share link → direct export link.

use std::sync::LazyLock;

use regex::Regex;

/// Pre-compiled regex for the file id segment of a share link.
#[allow(clippy::expect_used)]
static FILE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/file/d/([a-zA-Z0-9_-]+)").expect("static regex is valid"));

/// Shown when a link has no file id.
pub const INVALID_LINK_HELP: &str = "The Google Drive playlist share link is invalid. \
    Open Google Drive, right click the playlist file and choose `Share > Copy link`.";

/// File id from a `.../file/d/<id>/...` share link.
pub fn file_id(share_url: &str) -> Option<&str> {
    FILE_ID_RE
        .captures(share_url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Direct download link for a share link, or `None` if it has no file id.
pub fn export_link(share_url: &str) -> Option<String> {
    file_id(share_url)
        .map(|id| format!("https://drive.google.com/uc?export=download&id={id}&confirm=true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_link_becomes_export_link() {
        assert_eq!(
            export_link("https://drive.google.com/file/d/1A2b_C-3d/view?usp=sharing").as_deref(),
            Some("https://drive.google.com/uc?export=download&id=1A2b_C-3d&confirm=true")
        );
    }

    #[test]
    fn id_stops_at_first_disallowed_character() {
        assert_eq!(
            file_id("https://drive.google.com/file/d/abc123/edit"),
            Some("abc123")
        );
        assert_eq!(file_id("/file/d/abc.def"), Some("abc"));
    }

    #[test]
    fn links_without_file_segment_are_rejected() {
        assert_eq!(export_link("https://drive.google.com/drive/folders/xyz"), None);
        assert_eq!(export_link("not a url"), None);
        assert_eq!(export_link("https://drive.google.com/file/d/"), None);
    }
}
