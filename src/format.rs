//! Page image format detection.
//!
//! Score pages are served either as SVG (vector) or PNG (raster). The format
//! is decided once per document by looking at the extension of one sample
//! page URL. Anything other than `.svg` / `.png` is "undetermined" and the
//! caller falls back to SVG via [`ImageFormat::resolve`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image format of the per-page score assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Vector pages, embedded as PDF form XObjects. (default)
    #[default]
    Svg,
    /// Raster pages, embedded as PDF image XObjects.
    Png,
}

impl ImageFormat {
    /// File extension used when building page URLs.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Svg => "svg",
            ImageFormat::Png => "png",
        }
    }

    /// Parse an extension (case-insensitive). Unknown extensions yield `None`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "svg" => Some(ImageFormat::Svg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    /// Effective format for a detection result; undetermined means SVG.
    pub fn resolve(detected: Option<Self>) -> Self {
        detected.unwrap_or_default()
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Detect the page format from the URL of one already-rendered page.
///
/// Only the path component is inspected, so query strings and fragments
/// (`score_0.png?v=3`) do not interfere. Inputs that do not parse as a URL
/// are treated as plain paths.
pub fn detect_format(sample_url: Option<&str>) -> Option<ImageFormat> {
    let sample = sample_url?.trim();
    if sample.is_empty() {
        return None;
    }

    let path = match reqwest::Url::parse(sample) {
        Ok(url) => url.path().to_string(),
        Err(_) => sample
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let file_name = path.rsplit('/').next().unwrap_or_default();
    let (_, ext) = file_name.rsplit_once('.')?;
    ImageFormat::from_extension(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_svg_and_png() {
        assert_eq!(
            detect_format(Some("https://cdn.example.com/scores/1/score_0.svg")),
            Some(ImageFormat::Svg)
        );
        assert_eq!(
            detect_format(Some("https://cdn.example.com/scores/1/score_0.png")),
            Some(ImageFormat::Png)
        );
    }

    #[test]
    fn ignores_query_and_case() {
        assert_eq!(
            detect_format(Some("https://cdn.example.com/score_0.PNG?no-cache=1#top")),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            detect_format(Some("pages/score_3.svg?x=1")),
            Some(ImageFormat::Svg)
        );
    }

    #[test]
    fn unknown_or_missing_is_undetermined() {
        assert_eq!(detect_format(None), None);
        assert_eq!(detect_format(Some("")), None);
        assert_eq!(detect_format(Some("https://cdn.example.com/score_0.jpg")), None);
        assert_eq!(detect_format(Some("https://cdn.example.com/score")), None);
        assert_eq!(detect_format(Some("https://cdn.example.com.svg/score")), None);
    }

    #[test]
    fn undetermined_resolves_to_svg() {
        assert_eq!(ImageFormat::resolve(None), ImageFormat::Svg);
        assert_eq!(ImageFormat::resolve(Some(ImageFormat::Png)), ImageFormat::Png);
    }

    #[test]
    fn extension_roundtrip() {
        assert_eq!(ImageFormat::Png.extension(), "png");
        assert_eq!(ImageFormat::from_extension("SVG"), Some(ImageFormat::Svg));
        assert_eq!(ImageFormat::Svg.to_string(), "svg");
    }
}
