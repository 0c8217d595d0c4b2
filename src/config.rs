/// Configuration for package conversion runs.
///
/// # Examples
///
/// ```rust
/// use qti_migrate::ConvertOptions;
///
/// // Create with defaults
/// let options = ConvertOptions::default();
///
/// // Or customize
/// let options = ConvertOptions::new()
///     .with_root_marker("content")
///     .with_media_filter("video")
///     .with_media_filter("2mb")
///     .with_complete_manifest(false);
/// ```
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Directory name anchoring item paths during reconciliation. When
    /// unset, item references are resolved relative to the test.
    pub root_marker: Option<String>,
    /// Media filter tokens (`video`, `.mp3`, `500kb`); empty disables
    /// media stripping
    pub media_filters: Vec<String>,
    /// Whether to add manifest resources for tests and items that have none
    pub complete_manifest: bool,
    /// Whether OS artifacts such as `.DS_Store` are skipped when reading
    pub skip_hidden: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            root_marker: None,
            media_filters: Vec::new(),
            complete_manifest: true,
            skip_hidden: true,
        }
    }
}

impl ConvertOptions {
    /// Create a new `ConvertOptions` with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve item references from the last path segment named `marker`
    /// instead of relative to the test document.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use qti_migrate::ConvertOptions;
    ///
    /// let options = ConvertOptions::new().with_root_marker("content");
    /// assert_eq!(options.root_marker.as_deref(), Some("content"));
    /// ```
    #[inline]
    pub fn with_root_marker(mut self, marker: impl Into<String>) -> Self {
        self.root_marker = Some(marker.into());
        self
    }

    /// Add a media filter token.
    #[inline]
    pub fn with_media_filter(mut self, filter: impl Into<String>) -> Self {
        self.media_filters.push(filter.into());
        self
    }

    /// Replace all media filter tokens.
    #[inline]
    pub fn with_media_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.media_filters = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Set whether missing manifest resources are synthesized.
    #[inline]
    pub fn with_complete_manifest(mut self, complete: bool) -> Self {
        self.complete_manifest = complete;
        self
    }

    /// Set whether hidden OS artifacts are skipped on read.
    #[inline]
    pub fn with_skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConvertOptions::new();
        assert!(options.root_marker.is_none());
        assert!(options.media_filters.is_empty());
        assert!(options.complete_manifest);
        assert!(options.skip_hidden);
    }

    #[test]
    fn test_filters_accumulate() {
        let options = ConvertOptions::new()
            .with_media_filter("video")
            .with_media_filter(".mp3");
        assert_eq!(options.media_filters, ["video", ".mp3"]);

        let options = options.with_media_filters(["2mb"]);
        assert_eq!(options.media_filters, ["2mb"]);
    }
}
