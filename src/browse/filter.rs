/*!
 * Listing Filters
 * Search, kind, extension, size and date filtering
 */

use serde::{Deserialize, Serialize};

/// Extension buckets the UI filters by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Folder,
    Image,
    Video,
    Audio,
    Document,
    Archive,
    File,
}

impl FileKind {
    /// Classify a lowercase extension into its bucket
    pub fn classify(extension: &str) -> Self {
        const IMAGE: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg"];
        const VIDEO: &[&str] = &["mp4", "webm", "mkv", "avi", "mov", "wmv", "flv"];
        const AUDIO: &[&str] = &["mp3", "wav", "ogg", "flac", "aac", "m4a"];
        const DOCUMENT: &[&str] = &[
            "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "rtf", "md",
        ];
        const ARCHIVE: &[&str] = &["zip", "rar", "7z", "tar", "gz"];

        if IMAGE.contains(&extension) {
            FileKind::Image
        } else if VIDEO.contains(&extension) {
            FileKind::Video
        } else if AUDIO.contains(&extension) {
            FileKind::Audio
        } else if DOCUMENT.contains(&extension) {
            FileKind::Document
        } else if ARCHIVE.contains(&extension) {
            FileKind::Archive
        } else {
            FileKind::File
        }
    }
}

/// Size buckets for filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeRange {
    #[default]
    All,
    /// < 10 KB
    Tiny,
    /// 10 KB - 1 MB
    Small,
    /// 1 MB - 10 MB
    Medium,
    /// 10 MB - 100 MB
    Large,
    /// > 100 MB
    XLarge,
}

impl SizeRange {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    pub fn matches(&self, size: u64) -> bool {
        match self {
            SizeRange::All => true,
            SizeRange::Tiny => size < 10 * Self::KB,
            SizeRange::Small => (10 * Self::KB..Self::MB).contains(&size),
            SizeRange::Medium => (Self::MB..10 * Self::MB).contains(&size),
            SizeRange::Large => (10 * Self::MB..100 * Self::MB).contains(&size),
            SizeRange::XLarge => size >= 100 * Self::MB,
        }
    }
}

/// Modified-date windows for filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    Month,
    Year,
}

impl DateRange {
    const DAY_SECS: i64 = 24 * 60 * 60;

    fn window_secs(&self) -> Option<i64> {
        match self {
            DateRange::All => None,
            DateRange::Today => Some(Self::DAY_SECS),
            DateRange::Week => Some(7 * Self::DAY_SECS),
            DateRange::Month => Some(30 * Self::DAY_SECS),
            DateRange::Year => Some(365 * Self::DAY_SECS),
        }
    }

    pub fn matches(&self, modified_secs: i64, now_secs: i64) -> bool {
        match self.window_secs() {
            None => true,
            Some(window) => modified_secs >= now_secs - window,
        }
    }
}

/// Sort criterion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Name,
    Modified,
    Size,
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Listing query options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ListOptions {
    /// 1-based page number
    pub page: usize,
    /// Entries per page
    pub limit: usize,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    /// Case-insensitive name substring
    pub search: Option<String>,
    pub kind: Option<FileKind>,
    /// Exact extension match, without the dot
    pub extension: Option<String>,
    pub size_range: SizeRange,
    pub date_range: DateRange,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 100,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            search: None,
            kind: None,
            extension: None,
            size_range: SizeRange::default(),
            date_range: DateRange::default(),
        }
    }
}
