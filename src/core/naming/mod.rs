//! # Naming Module
//!
//! Turns interpreted metadata and a naming template into a
//! library-relative destination path.
//!
//! Planning never fails: files without a capture date go to the
//! `Unsorted` bucket under their original name, and missing camera
//! fields render as `Unknown`. The same inputs always yield the same path.

mod template;

pub use template::{FolderStructure, NamingTemplate, Segment, Token};

use crate::core::metadata::PhotoMetadata;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Folder for files without a usable capture date
pub const UNSORTED_DIR: &str = "Unsorted";

/// Stand-in for a missing camera
pub const UNKNOWN_CAMERA: &str = "Unknown Camera";

/// Stand-in for a missing make or model
pub const UNKNOWN: &str = "Unknown";

/// Compute the destination of a file, relative to the library root.
///
/// `stem` is the source file name without extension; `extension` is
/// appended as given (without the dot, may be empty).
pub fn plan_relative_path(
    metadata: &PhotoMetadata,
    template: &NamingTemplate,
    stem: &str,
    extension: &str,
) -> PathBuf {
    let date = metadata.date_taken;

    let mut path = PathBuf::new();
    let components: Vec<String> = match date {
        None if template.uses_date() => vec![
            UNSORTED_DIR.to_string(),
            render_component(&[Segment::Token(Token::Stem)], metadata, None, stem),
        ],
        _ => template
            .components()
            .iter()
            .map(|segments| render_component(segments, metadata, date, stem))
            .collect(),
    };

    let last = components.len().saturating_sub(1);
    for (i, component) in components.into_iter().enumerate() {
        if i == last {
            path.push(with_extension(&component, extension));
        } else {
            path.push(component);
        }
    }

    path
}

/// Lower-cased extension the file will have in the library
pub fn target_extension(source: &Path, convert_heic: bool) -> String {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();

    if convert_heic && is_heic_extension(&ext) {
        "jpg".to_string()
    } else {
        ext
    }
}

pub fn is_heic_extension(ext: &str) -> bool {
    matches!(ext.to_lowercase().as_str(), "heic" | "heif")
}

fn with_extension(name: &str, extension: &str) -> String {
    if extension.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", name, extension)
    }
}

fn render_component(
    segments: &[Segment],
    metadata: &PhotoMetadata,
    date: Option<NaiveDateTime>,
    stem: &str,
) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Token(token) => out.push_str(&render_token(*token, metadata, date, stem)),
        }
    }

    let cleaned = sanitize(&out);
    if cleaned.is_empty() {
        UNKNOWN.to_string()
    } else {
        cleaned
    }
}

fn render_token(
    token: Token,
    metadata: &PhotoMetadata,
    date: Option<NaiveDateTime>,
    stem: &str,
) -> String {
    // Date tokens only render when a date exists; otherwise the whole
    // path was already diverted to the unsorted bucket.
    let date_part = |pattern: &str| {
        date.map(|d| d.format(pattern).to_string())
            .unwrap_or_default()
    };

    match token {
        Token::Year => date_part("%Y"),
        Token::Month => date_part("%m"),
        Token::MonthName => date_part("%B"),
        Token::Day => date_part("%d"),
        Token::Hour => date_part("%H"),
        Token::Minute => date_part("%M"),
        Token::Second => date_part("%S"),
        Token::Make => metadata
            .camera_make
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string()),
        Token::Model => metadata
            .camera_model
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string()),
        Token::Camera => metadata
            .camera_display()
            .unwrap_or_else(|| UNKNOWN_CAMERA.to_string()),
        Token::Stem => stem.to_string(),
    }
}

/// Make a value safe to use as a single path component
fn sanitize(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    replaced
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn taken(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> PhotoMetadata {
        PhotoMetadata {
            date_taken: Some(
                NaiveDate::from_ymd_opt(y, mo, d)
                    .unwrap()
                    .and_hms_opt(h, mi, s)
                    .unwrap(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn default_template_matches_library_layout() {
        let path = plan_relative_path(
            &taken(2024, 1, 15, 14, 30, 5),
            &NamingTemplate::default(),
            "IMG_0001",
            "jpg",
        );
        assert_eq!(
            path,
            PathBuf::from("2024/01 - January/2024-01-15 14-30-05.jpg")
        );
    }

    #[test]
    fn year_month_day_keeps_original_stem() {
        let template = NamingTemplate::from(FolderStructure::YearMonthDay);
        let path = plan_relative_path(&taken(2024, 12, 25, 8, 0, 0), &template, "IMG_0001", "jpeg");
        assert_eq!(path, PathBuf::from("2024/12/25/IMG_0001.jpeg"));
    }

    #[test]
    fn flat_structure() {
        let template = NamingTemplate::from(FolderStructure::YearMonthFlat);
        let path = plan_relative_path(&taken(2024, 1, 15, 0, 0, 0), &template, "a", "jpg");
        assert_eq!(path, PathBuf::from("2024-01/a.jpg"));
    }

    #[test]
    fn missing_date_goes_to_unsorted() {
        let path = plan_relative_path(
            &PhotoMetadata::default(),
            &NamingTemplate::default(),
            "IMG_0001",
            "jpg",
        );
        assert_eq!(path, PathBuf::from("Unsorted/IMG_0001.jpg"));
    }

    #[test]
    fn missing_camera_uses_placeholder() {
        let template = NamingTemplate::parse("{camera}/{stem}").unwrap();
        let path = plan_relative_path(&PhotoMetadata::default(), &template, "a", "jpg");
        assert_eq!(path, PathBuf::from("Unknown Camera/a.jpg"));
    }

    #[test]
    fn camera_values_are_sanitized() {
        let template = NamingTemplate::parse("{make}/{model}/{stem}").unwrap();
        let metadata = PhotoMetadata {
            camera_make: Some("../Evil".to_string()),
            camera_model: Some("A/B: C".to_string()),
            ..Default::default()
        };
        let path = plan_relative_path(&metadata, &template, "a", "jpg");
        assert_eq!(path, PathBuf::from("_Evil/A_B_ C/a.jpg"));
    }

    #[test]
    fn planning_is_deterministic() {
        let template =
            NamingTemplate::parse("{year}/{camera}/{year}{month}{day}-{hour}{minute}{second}")
                .unwrap();
        let mut metadata = taken(2023, 6, 7, 8, 9, 10);
        metadata.camera_make = Some("FUJIFILM".to_string());
        metadata.camera_model = Some("X100V".to_string());

        let first = plan_relative_path(&metadata, &template, "x", "jpg");
        let second = plan_relative_path(&metadata, &template, "x", "jpg");
        assert_eq!(first, second);
        assert_eq!(first, PathBuf::from("2023/FUJIFILM X100V/20230607-080910.jpg"));
    }

    #[test]
    fn distinct_dates_give_distinct_paths() {
        let template = NamingTemplate::default();
        let a = plan_relative_path(&taken(2024, 1, 15, 10, 0, 0), &template, "x", "jpg");
        let b = plan_relative_path(&taken(2024, 1, 15, 10, 0, 1), &template, "x", "jpg");
        assert_ne!(a, b);
    }

    #[test]
    fn heic_extension_converts_when_requested() {
        assert_eq!(target_extension(Path::new("a.HEIC"), true), "jpg");
        assert_eq!(target_extension(Path::new("a.HEIC"), false), "heic");
        assert_eq!(target_extension(Path::new("a.JPG"), true), "jpg");
        assert_eq!(target_extension(Path::new("noext"), false), "");
    }
}
