//! Score-player host state: page URLs, file names and download targets.
//!
//! The sheet-music player page keeps a state object with the score id, its
//! metadata and the asset URLs. [`ScoreInfo::from_host_state`] reads that
//! object (as JSON) and everything downstream derives from it: the ordered
//! page URLs fed to the generator, the output file name and the list of
//! alternative downloads.

use crate::error::Score2PdfError;
use crate::format::{detect_format, ImageFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Worker that serves the `.mscz` source file for a score id.
pub const MSCZ_WORKER_URL: &str = "https://musescore-mscz.99.workers.dev/";

/// Page counts above this are treated as corrupt state.
pub const MAX_PAGE_COUNT: usize = 10_000;

static NON_WORD_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").unwrap());

/// Ordered page URLs plus the sample used for format detection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageSource {
    /// Page URLs; index is the output page order.
    pub urls: Vec<String>,
    /// URL of one already-rendered page, inspected for its extension.
    pub sample: Option<String>,
}

impl PageSource {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls, sample: None }
    }

    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        self.sample = Some(sample.into());
        self
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Everything the host page tells us about the current score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreInfo {
    pub id: String,
    pub title: Option<String>,
    pub page_count: usize,
    /// Base URL of the per-page assets, ending in `/`.
    pub image_base_url: String,
    pub midi_url: Option<String>,
    pub mp3_url: Option<String>,
    /// URLs of pages the player has already rendered.
    pub sample_pages: Vec<String>,
}

/// One entry of the download menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTarget {
    pub label: &'static str,
    /// `None` for the generated PDF or a rendition the host did not provide.
    pub url: Option<String>,
}

impl ScoreInfo {
    /// Read the score-player state.
    ///
    /// Accepts the full global (`UGAPP.store.jmuse_settings.score_player`)
    /// or the bare score-player object. Requires `json.id` and
    /// `urls.image_path`.
    pub fn from_host_state(state: &Value) -> Result<Self, Score2PdfError> {
        let player = state
            .pointer("/UGAPP/store/jmuse_settings/score_player")
            .unwrap_or(state);

        let missing = |reason: &str| Score2PdfError::MissingHostState {
            reason: reason.to_string(),
        };

        let json = player.get("json").ok_or_else(|| missing("no 'json' object"))?;
        let id = match json.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(missing("no 'json.id'")),
        };

        let urls = player.get("urls").ok_or_else(|| missing("no 'urls' object"))?;
        let image_base_url = urls
            .get("image_path")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| missing("no 'urls.image_path'"))?
            .to_string();

        let sample_pages: Vec<String> = player
            .get("sample_pages")
            .and_then(Value::as_array)
            .map(|pages| {
                pages
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let metadata = json.get("metadata");
        let page_count = metadata
            .and_then(|m| m.get("pages"))
            .and_then(|p| match p {
                Value::Number(n) => n.as_u64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                        .map(|f| f as u64)
                }),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(sample_pages.len());
        if page_count > MAX_PAGE_COUNT {
            return Err(missing("implausible 'json.metadata.pages'"));
        }

        let title = metadata
            .and_then(|m| m.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let string_at = |key: &str| {
            urls.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            id,
            title,
            page_count,
            image_base_url,
            midi_url: string_at("midi"),
            mp3_url: string_at("mp3"),
            sample_pages,
        })
    }

    /// `<image_base_url>score_<N>.<ext>` for every page.
    pub fn page_urls(&self, format: ImageFormat) -> Vec<String> {
        (0..self.page_count)
            .map(|i| format!("{}score_{}.{}", self.image_base_url, i, format.extension()))
            .collect()
    }

    /// Build the page source, detecting the format from the first rendered
    /// page unless `format` forces one.
    pub fn page_source(&self, format: Option<ImageFormat>) -> PageSource {
        let sample = self.sample_pages.first().cloned();
        let format = format.unwrap_or_else(|| ImageFormat::resolve(detect_format(sample.as_deref())));
        PageSource {
            urls: self.page_urls(format),
            sample,
        }
    }

    /// File name without extension: the derived title, or the id (run
    /// through the same derivation) when the title derives to nothing.
    pub fn file_stem(&self) -> String {
        let derived = derive_file_name(self.title.as_deref());
        if derived.is_empty() {
            derive_file_name(Some(&self.id))
        } else {
            derived
        }
    }

    /// The download menu, in display order.
    pub fn download_targets(&self) -> Vec<DownloadTarget> {
        vec![
            DownloadTarget {
                label: "Musescore",
                url: Some(format!("{MSCZ_WORKER_URL}{}", self.id)),
            },
            DownloadTarget {
                label: "PDF",
                url: None,
            },
            DownloadTarget {
                label: "MusicXML",
                url: Some(format!("{}score.mxl", self.image_base_url)),
            },
            DownloadTarget {
                label: "MIDI",
                url: self.midi_url.clone(),
            },
            DownloadTarget {
                label: "MP3",
                url: self.mp3_url.clone(),
            },
        ]
    }
}

/// Collapse every run of non-word characters in the title to one `_`.
///
/// `"Symphony No. 5!!"` becomes `"Symphony_No_5_"`; an empty or absent title
/// gives an empty string.
pub fn derive_file_name(title: Option<&str>) -> String {
    match title {
        Some(t) => NON_WORD_RUNS.replace_all(t, "_").into_owned(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn player() -> Value {
        json!({
            "json": {
                "id": "5551234",
                "metadata": { "title": "Symphony No. 5!!", "pages": 3 }
            },
            "urls": {
                "image_path": "https://cdn.example.com/static/score/5551234/",
                "midi": "https://cdn.example.com/5551234.mid",
                "mp3": ""
            },
            "sample_pages": ["https://cdn.example.com/static/score/5551234/score_0.png@0"]
        })
    }

    #[test]
    fn derive_file_name_collapses_non_word_runs() {
        assert_eq!(derive_file_name(Some("Symphony No. 5!!")), "Symphony_No_5_");
        assert_eq!(derive_file_name(Some("Für Elise")), "F_r_Elise");
        assert_eq!(derive_file_name(Some("")), "");
        assert_eq!(derive_file_name(None), "");
    }

    #[test]
    fn reads_bare_score_player() {
        let info = ScoreInfo::from_host_state(&player()).unwrap();
        assert_eq!(info.id, "5551234");
        assert_eq!(info.page_count, 3);
        assert_eq!(info.title.as_deref(), Some("Symphony No. 5!!"));
        assert_eq!(info.midi_url.as_deref(), Some("https://cdn.example.com/5551234.mid"));
        assert_eq!(info.mp3_url, None);
        assert_eq!(info.file_stem(), "Symphony_No_5_");
    }

    #[test]
    fn reads_full_global() {
        let global = json!({ "UGAPP": { "store": { "jmuse_settings": { "score_player": player() } } } });
        let info = ScoreInfo::from_host_state(&global).unwrap();
        assert_eq!(info.id, "5551234");
    }

    #[test]
    fn numeric_id_and_missing_metadata() {
        let state = json!({
            "json": { "id": 42 },
            "urls": { "image_path": "https://cdn.example.com/42/" },
            "sample_pages": ["a/score_0.svg", "a/score_1.svg"]
        });
        let info = ScoreInfo::from_host_state(&state).unwrap();
        assert_eq!(info.id, "42");
        assert_eq!(info.page_count, 2);
        assert_eq!(info.file_stem(), "42");
    }

    #[test]
    fn id_fallback_is_sanitised() {
        let state = json!({
            "json": { "id": "../escaped" },
            "urls": { "image_path": "https://cdn.example.com/x/" }
        });
        let info = ScoreInfo::from_host_state(&state).unwrap();
        assert_eq!(info.file_stem(), "_escaped");
    }

    #[test]
    fn implausible_page_count_is_rejected() {
        for pages in [json!(1e15), json!("99999999999"), json!(MAX_PAGE_COUNT + 1)] {
            let state = json!({
                "json": { "id": "1", "metadata": { "pages": pages } },
                "urls": { "image_path": "https://cdn.example.com/1/" }
            });
            let err = ScoreInfo::from_host_state(&state).unwrap_err();
            assert!(matches!(err, Score2PdfError::MissingHostState { .. }));
        }
        let state = json!({
            "json": { "id": "1", "metadata": { "pages": MAX_PAGE_COUNT } },
            "urls": { "image_path": "https://cdn.example.com/1/" }
        });
        assert_eq!(
            ScoreInfo::from_host_state(&state).unwrap().page_count,
            MAX_PAGE_COUNT
        );
    }

    #[test]
    fn missing_state_is_reported() {
        for state in [
            json!({}),
            json!({ "json": { "id": "1" } }),
            json!({ "json": {}, "urls": { "image_path": "x/" } }),
            json!({ "json": { "id": "1" }, "urls": { "image_path": "" } }),
        ] {
            let err = ScoreInfo::from_host_state(&state).unwrap_err();
            assert!(matches!(err, Score2PdfError::MissingHostState { .. }), "{state}");
        }
    }

    #[test]
    fn page_urls_follow_asset_layout() {
        let info = ScoreInfo::from_host_state(&player()).unwrap();
        assert_eq!(
            info.page_urls(ImageFormat::Svg),
            vec![
                "https://cdn.example.com/static/score/5551234/score_0.svg",
                "https://cdn.example.com/static/score/5551234/score_1.svg",
                "https://cdn.example.com/static/score/5551234/score_2.svg",
            ]
        );
    }

    #[test]
    fn page_source_defaults_to_svg_when_sample_unrecognised() {
        // "score_0.png@0" has extension "png@0", which is not recognised
        let info = ScoreInfo::from_host_state(&player()).unwrap();
        let source = info.page_source(None);
        assert!(source.urls.iter().all(|u| u.ends_with(".svg")));

        let source = info.page_source(Some(ImageFormat::Png));
        assert!(source.urls.iter().all(|u| u.ends_with(".png")));
    }

    #[test]
    fn download_targets_in_menu_order() {
        let info = ScoreInfo::from_host_state(&player()).unwrap();
        let targets = info.download_targets();
        let labels: Vec<_> = targets.iter().map(|t| t.label).collect();
        assert_eq!(labels, ["Musescore", "PDF", "MusicXML", "MIDI", "MP3"]);
        assert_eq!(
            targets[0].url.as_deref(),
            Some("https://musescore-mscz.99.workers.dev/5551234")
        );
        assert_eq!(targets[1].url, None);
        assert_eq!(
            targets[2].url.as_deref(),
            Some("https://cdn.example.com/static/score/5551234/score.mxl")
        );
    }
}
