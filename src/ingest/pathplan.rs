use crate::ingest::config::ArchiveConfig;
use crate::ingest::datetime::ResolvedDate;
use std::path::{Path, PathBuf};

/// Closed set of media categories, in their fixed evaluation order. A
/// file belongs to the first category whose extension list contains its
/// extension; later categories are never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    WebImage,
    Heic,
    Raw,
    Tiff,
    Video,
    Audio,
    Geo,
}

impl Category {
    pub const ORDER: [Category; 7] = [
        Category::WebImage,
        Category::Heic,
        Category::Raw,
        Category::Tiff,
        Category::Video,
        Category::Audio,
        Category::Geo,
    ];
}

fn category_config<'a>(
    cfg: &'a ArchiveConfig,
    category: Category,
) -> &'a crate::ingest::config::CategoryConfig {
    match category {
        Category::WebImage => &cfg.categories.web_images,
        Category::Heic => &cfg.categories.heic,
        Category::Raw => &cfg.categories.raw,
        Category::Tiff => &cfg.categories.tiff,
        Category::Video => &cfg.categories.video,
        Category::Audio => &cfg.categories.audio,
        Category::Geo => &cfg.categories.geo,
    }
}

pub fn match_category(cfg: &ArchiveConfig, extension: &str) -> Option<Category> {
    Category::ORDER.into_iter().find(|category| {
        category_config(cfg, *category)
            .extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    })
}

/// All extensions a run considers, lowercased.
pub fn allowed_extensions(cfg: &ArchiveConfig) -> Vec<String> {
    let mut out: Vec<String> = cfg
        .category_entries()
        .iter()
        .flat_map(|(_, category)| category.extensions.iter())
        .map(|ext| ext.to_ascii_lowercase())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Destination directory for a file:
/// `target_root/YYYY/YYYY-MM/YYYY-MM-DD[/subfolder]`.
pub fn build_target_dir(cfg: &ArchiveConfig, date: &ResolvedDate, extension: &str) -> PathBuf {
    let mut dir = cfg
        .transfer
        .target_dir
        .join(&date.year)
        .join(format!("{}-{}", date.year, date.month))
        .join(date.day_stamp());

    if let Some(category) = match_category(cfg, extension) {
        let subfolder = &category_config(cfg, category).subfolder;
        if !subfolder.is_empty() {
            dir = dir.join(subfolder);
        }
    }
    dir
}

/// Original name with one leading `<stamp>_-_` prefix stripped, so a
/// reprocessed file never accumulates stacked prefixes.
pub fn plain_name(file_name: &str) -> &str {
    match file_name.split_once("_-_") {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => file_name,
    }
}

pub fn build_file_name(date: &ResolvedDate, source_path: &Path, rename: bool) -> String {
    let original = source_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed");
    let plain = plain_name(original);
    if rename {
        format!("{}_{}_-_{}", date.day_stamp(), date.time_stamp(), plain)
    } else {
        plain.to_string()
    }
}
