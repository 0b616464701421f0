use crate::ingest::exiftool::MetadataTool;
use chrono::{DateTime, Local};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

pub const SENTINEL_YEAR: &str = "0000";
pub const SENTINEL_FIELD: &str = "00";

/// Date tags queried from the metadata tool, highest priority first. The
/// first tag whose value normalizes to a valid date wins; later tags are
/// never compared against it.
pub const DATE_TAGS: [&str; 6] = [
    "CreateDate",
    "CreationDate",
    "MediaCreateDate",
    "DateTimeOriginal",
    "FileModificationDateTime",
    "FileAccessDateTime",
];

/// Pseudo-tags the tool derives from the filesystem rather than from
/// metadata embedded in the file. A date taken from one of these still
/// needs to be written back into the file.
const FILESYSTEM_TAGS: [&str; 2] = ["FileModificationDateTime", "FileAccessDateTime"];

static FILENAME_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-[01]\d-[0-3]\d_[0-2]\d-[0-5]\d-[0-5]\d_-").expect("filename stamp pattern")
});

/// A canonical six-field timestamp. Every field is always populated:
/// either a zero-padded numeric string or the zero sentinel, so path
/// construction downstream never sees a missing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDate {
    pub year: String,
    pub month: String,
    pub day: String,
    pub hour: String,
    pub minute: String,
    pub second: String,
    /// The timestamp did not come from metadata embedded in the file and
    /// should be written back into it after transfer.
    pub synthesized: bool,
}

impl ResolvedDate {
    pub fn null() -> Self {
        Self {
            year: SENTINEL_YEAR.to_string(),
            month: SENTINEL_FIELD.to_string(),
            day: SENTINEL_FIELD.to_string(),
            hour: SENTINEL_FIELD.to_string(),
            minute: SENTINEL_FIELD.to_string(),
            second: SENTINEL_FIELD.to_string(),
            synthesized: true,
        }
    }

    /// A date is usable as a source only when year, month and day are all
    /// non-sentinel.
    pub fn is_valid(&self) -> bool {
        self.year != SENTINEL_YEAR && self.month != SENTINEL_FIELD && self.day != SENTINEL_FIELD
    }

    pub fn day_stamp(&self) -> String {
        format!("{}-{}-{}", self.year, self.month, self.day)
    }

    pub fn time_stamp(&self) -> String {
        format!("{}-{}-{}", self.hour, self.minute, self.second)
    }

    /// Timestamp in the `YYYY:MM:DD hh:mm:ss` form the metadata tool
    /// expects for date tag writes.
    pub fn exif_stamp(&self) -> String {
        format!(
            "{}:{}:{} {}:{}:{}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Rewrite every separator among `- _ . : ; |` and space to a single `-`,
/// collapsing runs and trimming the ends.
fn normalize_separators(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_sep = false;
    for ch in input.chars() {
        if matches!(ch, '-' | '_' | '.' | ':' | ';' | '|' | ' ') {
            if !out.is_empty() && !prev_sep {
                out.push('-');
                prev_sep = true;
            }
        } else {
            out.push(ch);
            prev_sep = false;
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Parse a date-like string into positional fields: year, month, day,
/// hour, minute, second. Fields beyond the sixth are discarded, missing
/// trailing fields keep their sentinel defaults, and any non-numeric or
/// over-wide field invalidates the whole parse (all-sentinel result).
pub fn parse_date_fields(input: &str) -> ResolvedDate {
    const WIDTHS: [usize; 6] = [4, 2, 2, 2, 2, 2];

    let normalized = normalize_separators(input);
    if normalized.is_empty() {
        return ResolvedDate::null();
    }

    let mut fields = [
        SENTINEL_YEAR.to_string(),
        SENTINEL_FIELD.to_string(),
        SENTINEL_FIELD.to_string(),
        SENTINEL_FIELD.to_string(),
        SENTINEL_FIELD.to_string(),
        SENTINEL_FIELD.to_string(),
    ];

    for (i, part) in normalized.split('-').take(WIDTHS.len()).enumerate() {
        if part.is_empty()
            || part.len() > WIDTHS[i]
            || !part.chars().all(|c| c.is_ascii_digit())
        {
            return ResolvedDate::null();
        }
        fields[i] = format!("{:0>width$}", part, width = WIDTHS[i]);
    }

    let [year, month, day, hour, minute, second] = fields;
    ResolvedDate {
        year,
        month,
        day,
        hour,
        minute,
        second,
        synthesized: true,
    }
}

/// True when `file_name` starts with the `YYYY-MM-DD_hh-mm-ss_-` stamp
/// this tool itself writes when renaming is enabled.
pub fn has_filename_stamp(file_name: &str) -> bool {
    FILENAME_STAMP.is_match(file_name)
}

fn date_from_mtime(path: &Path) -> Option<ResolvedDate> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let local: DateTime<Local> = modified.into();
    let parsed = parse_date_fields(&local.format("%Y-%m-%d %H-%M-%S").to_string());
    parsed.is_valid().then_some(parsed)
}

/// Resolve the canonical timestamp for `path`.
///
/// Sources in strict priority order, each short-circuiting on first
/// success: stamped filename, metadata date tags (first usable tag wins),
/// filesystem mtime, all-zero sentinel. Never fails: the worst case is
/// the sentinel date.
pub fn resolve(path: &Path, metadata: &dyn MetadataTool) -> ResolvedDate {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if has_filename_stamp(name) {
            let parsed = parse_date_fields(name);
            if parsed.is_valid() {
                // The metadata tool is never consulted for stamped names,
                // so no embedded create-date tag is known to exist and the
                // date still counts as synthesized.
                return parsed;
            }
        }
    }

    match metadata.read_date_tags(path, &DATE_TAGS) {
        Ok(tags) => {
            for tag in DATE_TAGS {
                let Some(value) = tags.get(tag).filter(|v| !v.trim().is_empty()) else {
                    continue;
                };
                let mut parsed = parse_date_fields(value);
                if parsed.is_valid() {
                    parsed.synthesized = FILESYSTEM_TAGS.contains(&tag);
                    return parsed;
                }
            }
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "metadata tool unavailable, falling back to filesystem date"
            );
        }
    }

    date_from_mtime(path).unwrap_or_else(ResolvedDate::null)
}
