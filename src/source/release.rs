//! The release descriptor shared by every release source.
//!
//! `Release` is ephemeral: it is fetched, compared against the stored
//! [`Feed`](crate::feed::Feed), and dropped at the end of the cycle.  Source
//! implementations convert their native payloads into this shape so the
//! engine never needs to know which forge it is talking to.

use chrono::{DateTime, Utc};

/// A single published version of a feed's remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Version tag; the only field used for change detection.
    pub tag: String,

    /// Display name.  Sources fall back to the tag when the forge has none.
    pub name: String,

    /// Free-text release notes, if any.
    pub notes: Option<String>,

    pub published: Option<DateTime<Utc>>,

    /// Attached files, in the order the source lists them.
    pub assets: Vec<Asset>,
}

/// One downloadable file attached to a [`Release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    /// Where the bytes can be fetched from.  Opaque to everything but the
    /// source that produced it.
    pub locator: String,
}

impl Release {
    pub fn asset_names(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(|a| a.name.as_str())
    }

    /// Caption sent with the first file a recipient receives for this
    /// release.
    pub fn caption(&self, feed_title: &str) -> String {
        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("No release notes provided.");
        format!("New release for {feed_title}: {}\n{notes}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(notes: Option<&str>) -> Release {
        Release {
            tag: "v1.2".into(),
            name: "Version 1.2".into(),
            notes: notes.map(String::from),
            published: None,
            assets: vec![
                Asset { name: "a.apk".into(), locator: "https://x/a".into() },
                Asset { name: "b.zip".into(), locator: "https://x/b".into() },
            ],
        }
    }

    #[test]
    fn caption_includes_title_name_and_notes() {
        let caption = release(Some("Fixed crash\n")).caption("LSPosed");
        assert_eq!(caption, "New release for LSPosed: Version 1.2\nFixed crash");
    }

    #[test]
    fn caption_placeholder_for_blank_notes() {
        for notes in [None, Some(""), Some("   \n")] {
            let caption = release(notes).caption("App");
            assert!(caption.ends_with("No release notes provided."), "{caption:?}");
        }
    }

    #[test]
    fn asset_names_keep_source_order() {
        let r = release(None);
        assert_eq!(r.asset_names().collect::<Vec<_>>(), vec!["a.apk", "b.zip"]);
    }
}
