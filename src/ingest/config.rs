use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferConfig {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    /// true: move files out of the source tree; false: copy, leaving the
    /// source untouched.
    pub move_files: bool,
    /// Prefix target filenames with the resolved `YYYY-MM-DD_hh-mm-ss_-_`
    /// stamp.
    pub rename_files: bool,
    /// Replace an already-existing target file instead of skipping it.
    pub overwrite_existing: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("/your/source/dir"),
            target_dir: PathBuf::from("/your/target/dir"),
            move_files: true,
            rename_files: false,
            overwrite_existing: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryConfig {
    pub extensions: Vec<String>,
    /// Extra subfolder under the day directory; empty means none.
    #[serde(default)]
    pub subfolder: String,
}

impl CategoryConfig {
    fn from_list(list: &str) -> Self {
        Self {
            extensions: list.split(';').map(str::to_string).collect(),
            subfolder: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoriesConfig {
    #[serde(default = "default_web_images")]
    pub web_images: CategoryConfig,
    #[serde(default = "default_heic")]
    pub heic: CategoryConfig,
    #[serde(default = "default_raw")]
    pub raw: CategoryConfig,
    #[serde(default = "default_tiff")]
    pub tiff: CategoryConfig,
    #[serde(default = "default_video")]
    pub video: CategoryConfig,
    #[serde(default = "default_audio")]
    pub audio: CategoryConfig,
    #[serde(default = "default_geo")]
    pub geo: CategoryConfig,
}

fn default_web_images() -> CategoryConfig {
    CategoryConfig::from_list("jpg;jpeg;gif;png")
}

fn default_heic() -> CategoryConfig {
    CategoryConfig::from_list("heic;heif")
}

fn default_raw() -> CategoryConfig {
    CategoryConfig::from_list(
        "3fr;arw;dcr;dng;cr2;cr3;crw;fff;gpr;j6i;k25;kc2;kdc;mdc;mrw;nef;nrw;orf;pef;raw;raf;rw2;rwl;sr2;srf;srw;x3f",
    )
}

fn default_tiff() -> CategoryConfig {
    CategoryConfig::from_list("tif;tiff")
}

fn default_video() -> CategoryConfig {
    CategoryConfig::from_list("avi;lrv;mp4")
}

fn default_audio() -> CategoryConfig {
    CategoryConfig::from_list("mp3;wav")
}

fn default_geo() -> CategoryConfig {
    CategoryConfig::from_list("gpx;kml;fit")
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            web_images: default_web_images(),
            heic: default_heic(),
            raw: default_raw(),
            tiff: default_tiff(),
            video: default_video(),
            audio: default_audio(),
            geo: default_geo(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PacingConfig {
    /// A run refuses to start while the ledger was touched more recently
    /// than this.
    pub ledger_min_idle_secs: u64,
    /// A file younger than this is assumed to still be written and is
    /// waited out before processing.
    pub min_file_age_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            ledger_min_idle_secs: 15,
            min_file_age_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OwnershipConfig {
    /// Owner applied recursively to the target root after a run that
    /// changed anything; empty disables the pass.
    pub user: String,
    pub group: String,
    /// chmod mode string, e.g. "700"; empty disables.
    pub permissions: String,
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            group: String::new(),
            permissions: "700".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExiftoolConfig {
    /// Explicit binary path; empty means resolve from PATH.
    pub bin: String,
    pub timeout_secs: u64,
}

impl Default for ExiftoolConfig {
    fn default() -> Self {
        Self {
            bin: String::new(),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    /// Webhook receiving the run summary as JSON; empty disables.
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HooksConfig {
    /// Shell command run once after a run that transferred at least one
    /// file or created at least one directory; empty disables.
    pub exec_on_success: String,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            exec_on_success: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub transfer: TransferConfig,
    pub categories: CategoriesConfig,
    pub pacing: PacingConfig,
    pub ownership: OwnershipConfig,
    pub exiftool: ExiftoolConfig,
    pub notify: NotifyConfig,
    pub hooks: HooksConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialArchiveConfig {
    transfer: Option<TransferConfig>,
    categories: Option<CategoriesConfig>,
    pacing: Option<PacingConfig>,
    ownership: Option<OwnershipConfig>,
    exiftool: Option<ExiftoolConfig>,
    notify: Option<NotifyConfig>,
    hooks: Option<HooksConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_path(var: &str, fallback: &Path) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback.to_path_buf(),
    }
}

fn validate(cfg: &ArchiveConfig) -> Result<()> {
    if cfg.transfer.source_dir.as_os_str().is_empty() {
        return Err(anyhow!("invalid transfer config: source_dir is empty"));
    }
    if cfg.transfer.target_dir.as_os_str().is_empty() {
        return Err(anyhow!("invalid transfer config: target_dir is empty"));
    }
    if cfg.transfer.move_files && cfg.transfer.source_dir == cfg.transfer.target_dir {
        return Err(anyhow!(
            "invalid transfer config: moving files onto themselves (source_dir == target_dir)"
        ));
    }
    if !cfg.ownership.permissions.is_empty()
        && u32::from_str_radix(&cfg.ownership.permissions, 8).is_err()
    {
        return Err(anyhow!(
            "invalid ownership config: permissions must be an octal mode, got `{}`",
            cfg.ownership.permissions
        ));
    }
    if cfg.exiftool.timeout_secs == 0 {
        return Err(anyhow!("invalid exiftool timeout: must be >= 1 second"));
    }
    if cfg.notify.timeout_secs == 0 {
        return Err(anyhow!("invalid notify timeout: must be >= 1 second"));
    }
    for (name, category) in cfg.category_entries() {
        if category.subfolder.contains('/') || category.subfolder.contains('\\') {
            return Err(anyhow!(
                "invalid category config: {name} subfolder must be a plain name, got `{}`",
                category.subfolder
            ));
        }
    }
    Ok(())
}

impl ArchiveConfig {
    /// Categories in their fixed evaluation order.
    pub fn category_entries(&self) -> [(&'static str, &CategoryConfig); 7] {
        [
            ("web_images", &self.categories.web_images),
            ("heic", &self.categories.heic),
            ("raw", &self.categories.raw),
            ("tiff", &self.categories.tiff),
            ("video", &self.categories.video),
            ("audio", &self.categories.audio),
            ("geo", &self.categories.geo),
        ]
    }
}

pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(custom) = env::var("ARCHIVIST_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    let home = dirs::home_dir()?;
    Some(home.join(".archivist").join("archivist.toml"))
}

fn merge_file_config(base: &mut ArchiveConfig, explicit: Option<&Path>) -> Result<()> {
    let Some(path) = resolve_config_path(explicit) else {
        return Ok(());
    };
    if !path.exists() {
        if explicit.is_some() {
            return Err(anyhow!(
                "config file {} does not exist (create one with `archivist init-config`)",
                path.display()
            ));
        }
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialArchiveConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse config {}: {err}", path.display()))?;
    if let Some(transfer) = parsed.transfer {
        base.transfer = transfer;
    }
    if let Some(categories) = parsed.categories {
        base.categories = categories;
    }
    if let Some(pacing) = parsed.pacing {
        base.pacing = pacing;
    }
    if let Some(ownership) = parsed.ownership {
        base.ownership = ownership;
    }
    if let Some(exiftool) = parsed.exiftool {
        base.exiftool = exiftool;
    }
    if let Some(notify) = parsed.notify {
        base.notify = notify;
    }
    if let Some(hooks) = parsed.hooks {
        base.hooks = hooks;
    }
    Ok(())
}

pub fn load_config(explicit: Option<&Path>) -> Result<ArchiveConfig> {
    let mut cfg = ArchiveConfig::default();
    merge_file_config(&mut cfg, explicit)?;

    cfg.transfer.source_dir = env_or_path("ARCHIVIST_SOURCE_DIR", &cfg.transfer.source_dir);
    cfg.transfer.target_dir = env_or_path("ARCHIVIST_TARGET_DIR", &cfg.transfer.target_dir);
    cfg.transfer.move_files = env_or_bool("ARCHIVIST_MOVE_FILES", cfg.transfer.move_files);
    cfg.transfer.rename_files = env_or_bool("ARCHIVIST_RENAME_FILES", cfg.transfer.rename_files);
    cfg.transfer.overwrite_existing =
        env_or_bool("ARCHIVIST_OVERWRITE_EXISTING", cfg.transfer.overwrite_existing);
    cfg.pacing.ledger_min_idle_secs = env_or_u64(
        "ARCHIVIST_LEDGER_MIN_IDLE_SECS",
        cfg.pacing.ledger_min_idle_secs,
    );
    cfg.pacing.min_file_age_secs =
        env_or_u64("ARCHIVIST_MIN_FILE_AGE_SECS", cfg.pacing.min_file_age_secs);
    cfg.exiftool.bin = env_or_string("ARCHIVIST_EXIFTOOL_BIN", &cfg.exiftool.bin);
    cfg.exiftool.timeout_secs =
        env_or_u64("ARCHIVIST_EXIFTOOL_TIMEOUT_SECS", cfg.exiftool.timeout_secs);
    cfg.notify.url = env_or_string("ARCHIVIST_NOTIFY_URL", &cfg.notify.url);
    cfg.hooks.exec_on_success =
        env_or_string("ARCHIVIST_EXEC_ON_SUCCESS", &cfg.hooks.exec_on_success);

    validate(&cfg)?;
    Ok(cfg)
}

/// Commented default config, written by `init-config`. Kept in sync with
/// the `Default` impls by a test.
pub fn default_config_toml() -> String {
    let defaults = ArchiveConfig::default();
    let raw = CategoriesConfig::default();
    format!(
        r#"# archivist configuration

[transfer]
# Roots must exist before a run starts.
source_dir = "{source}"
target_dir = "{target}"
# move_files = true moves files out of the source tree; false copies them.
move_files = true
# Prefix target filenames with the resolved YYYY-MM-DD_hh-mm-ss_-_ stamp.
rename_files = false
# Replace already-existing target files instead of skipping them.
overwrite_existing = false

[pacing]
# A run refuses to start while the ledger was touched within this window.
ledger_min_idle_secs = {idle}
# Files younger than this are assumed still being written and waited out.
min_file_age_secs = {age}

# Per-category extension lists and optional day-directory subfolders.
# Categories are evaluated in this order; the first match wins.
[categories.web_images]
extensions = [{web}]
subfolder = ""

[categories.heic]
extensions = [{heic}]
subfolder = ""

[categories.raw]
extensions = [{raw}]
subfolder = ""

[categories.tiff]
extensions = [{tiff}]
subfolder = ""

[categories.video]
extensions = [{video}]
subfolder = ""

[categories.audio]
extensions = [{audio}]
subfolder = ""

[categories.geo]
extensions = [{geo}]
subfolder = ""

[ownership]
# Applied recursively to the whole target root after a run that changed
# anything. Empty values disable the corresponding pass.
user = ""
group = ""
permissions = "{permissions}"

[exiftool]
# Empty bin resolves exiftool from PATH.
bin = ""
timeout_secs = {exiftool_timeout}

[notify]
# Webhook that receives the run summary as JSON; empty disables.
url = ""
timeout_secs = {notify_timeout}

[hooks]
# Shell command run once after a run that transferred or created anything.
exec_on_success = ""
"#,
        source = defaults.transfer.source_dir.display(),
        target = defaults.transfer.target_dir.display(),
        idle = defaults.pacing.ledger_min_idle_secs,
        age = defaults.pacing.min_file_age_secs,
        web = quote_list(&raw.web_images.extensions),
        heic = quote_list(&raw.heic.extensions),
        raw = quote_list(&raw.raw.extensions),
        tiff = quote_list(&raw.tiff.extensions),
        video = quote_list(&raw.video.extensions),
        audio = quote_list(&raw.audio.extensions),
        geo = quote_list(&raw.geo.extensions),
        permissions = defaults.ownership.permissions,
        exiftool_timeout = defaults.exiftool.timeout_secs,
        notify_timeout = defaults.notify.timeout_secs,
    )
}

fn quote_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_parses_back_to_the_defaults() {
        let parsed: PartialArchiveConfig =
            toml::from_str(&default_config_toml()).expect("template parses");
        let transfer = parsed.transfer.expect("transfer section");
        assert_eq!(transfer.source_dir, TransferConfig::default().source_dir);
        let categories = parsed.categories.expect("categories section");
        assert_eq!(
            categories.web_images.extensions,
            CategoriesConfig::default().web_images.extensions
        );
        let pacing = parsed.pacing.expect("pacing section");
        assert_eq!(pacing.ledger_min_idle_secs, 15);
        assert_eq!(pacing.min_file_age_secs, 10);
    }

    #[test]
    fn unknown_keys_are_rejected_at_load() {
        let err = toml::from_str::<PartialArchiveConfig>("[transfer]\nsources_dir = \"/x\"\n")
            .expect_err("unknown key must fail");
        assert!(err.to_string().contains("sources_dir"));
    }

    #[test]
    fn validate_rejects_move_onto_itself() {
        let mut cfg = ArchiveConfig::default();
        cfg.transfer.target_dir = cfg.transfer.source_dir.clone();
        cfg.transfer.move_files = true;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn validate_rejects_non_octal_permissions() {
        let mut cfg = ArchiveConfig::default();
        cfg.ownership.permissions = "rwx".to_string();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn validate_rejects_nested_subfolders() {
        let mut cfg = ArchiveConfig::default();
        cfg.categories.raw.subfolder = "raw/originals".to_string();
        assert!(validate(&cfg).is_err());
    }
}
