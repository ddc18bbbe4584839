use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::model::SplitOptions;
use crate::restore::RestoreMode;
use crate::switcher::{NamedGroupLabelMode, SwitcherStyle};

const MIN_POLL_INTERVAL_MS: u128 = 5;

pub fn data_dir() -> Option<PathBuf> { dirs::home_dir().map(|home| home.join(".tabgroups")) }

pub fn config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("tabgroups").join("config.toml"))
}

pub fn session_file() -> Option<PathBuf> { data_dir().map(|dir| dir.join("session.json")) }

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub switcher: SwitcherSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub inventory: InventorySettings,
    #[serde(default)]
    pub capture: CaptureSettings,
}

/// Quick-switcher behavior.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(from = "SwitcherSettingsFile")]
pub struct SwitcherSettings {
    pub global_style: SwitcherStyle,
    pub tab_cycle_style: SwitcherStyle,
    pub named_group_label_mode: NamedGroupLabelMode,
    pub split_pinned_tabs_into_separate_group: bool,
    pub include_pinned_tabs_in_in_group_switcher: bool,
    pub split_super_pinned_tabs_into_separate_group: bool,
    pub include_super_pinned_tabs_in_in_group_switcher: bool,
    pub split_separated_tabs_into_separate_groups: bool,
}

/// On-disk shape of `[switcher]`, including the single `style` key that
/// predates separate global and tab-cycle styles.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SwitcherSettingsFile {
    #[serde(default)]
    global_style: Option<SwitcherStyle>,
    #[serde(default)]
    tab_cycle_style: Option<SwitcherStyle>,
    #[serde(default)]
    style: Option<SwitcherStyle>,
    #[serde(default)]
    named_group_label_mode: NamedGroupLabelMode,
    #[serde(default = "no")]
    split_pinned_tabs_into_separate_group: bool,
    #[serde(default = "no")]
    include_pinned_tabs_in_in_group_switcher: bool,
    #[serde(default = "no")]
    split_super_pinned_tabs_into_separate_group: bool,
    #[serde(default = "no")]
    include_super_pinned_tabs_in_in_group_switcher: bool,
    #[serde(default = "no")]
    split_separated_tabs_into_separate_groups: bool,
}

impl From<SwitcherSettingsFile> for SwitcherSettings {
    fn from(file: SwitcherSettingsFile) -> Self {
        let (global_style, tab_cycle_style) = match (file.global_style, file.style) {
            (Some(global), _) => (global, file.tab_cycle_style.unwrap_or_default()),
            (None, Some(legacy)) => (legacy, legacy),
            (None, None) => (SwitcherStyle::default(), file.tab_cycle_style.unwrap_or_default()),
        };
        Self {
            global_style,
            tab_cycle_style,
            named_group_label_mode: file.named_group_label_mode,
            split_pinned_tabs_into_separate_group: file.split_pinned_tabs_into_separate_group,
            include_pinned_tabs_in_in_group_switcher: file.include_pinned_tabs_in_in_group_switcher,
            split_super_pinned_tabs_into_separate_group: file.split_super_pinned_tabs_into_separate_group,
            include_super_pinned_tabs_in_in_group_switcher: file
                .include_super_pinned_tabs_in_in_group_switcher,
            split_separated_tabs_into_separate_groups: file.split_separated_tabs_into_separate_groups,
        }
    }
}

impl SwitcherSettings {
    /// Segmentation used by the global switcher.
    pub fn split_options(&self) -> SplitOptions {
        let mut options = SplitOptions::empty();
        options.set(SplitOptions::PINNED, self.split_pinned_tabs_into_separate_group);
        options.set(SplitOptions::SUPER_PINNED, self.split_super_pinned_tabs_into_separate_group);
        options.set(SplitOptions::SEPARATORS, self.split_separated_tabs_into_separate_groups);
        options
    }

    /// Segmentation used when cycling tabs inside one group. A pin split only
    /// applies here when those tabs are not included in the in-group switcher.
    pub fn in_group_split_options(&self) -> SplitOptions {
        let mut options = SplitOptions::empty();
        options.set(
            SplitOptions::PINNED,
            self.split_pinned_tabs_into_separate_group && !self.include_pinned_tabs_in_in_group_switcher,
        );
        options.set(
            SplitOptions::SUPER_PINNED,
            self.split_super_pinned_tabs_into_separate_group
                && !self.include_super_pinned_tabs_in_in_group_switcher,
        );
        options.set(SplitOptions::SEPARATORS, self.split_separated_tabs_into_separate_groups);
        options
    }

    fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.include_pinned_tabs_in_in_group_switcher && !self.split_pinned_tabs_into_separate_group {
            issues.push(
                "switcher.include_pinned_tabs_in_in_group_switcher has no effect unless \
                 split_pinned_tabs_into_separate_group is set"
                    .to_string(),
            );
        }
        if self.include_super_pinned_tabs_in_in_group_switcher
            && !self.split_super_pinned_tabs_into_separate_group
        {
            issues.push(
                "switcher.include_super_pinned_tabs_in_in_group_switcher has no effect unless \
                 split_super_pinned_tabs_into_separate_group is set"
                    .to_string(),
            );
        }
        issues
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[derive(strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AutoCaptureMode {
    Never,
    /// Newly launched windows join the most recent group on the current space.
    Always,
    /// Only when a group fills the screen.
    #[default]
    WhenMaximized,
    /// Only when a group is the only one on the space.
    WhenOnly,
}

impl AutoCaptureMode {
    pub fn is_enabled(self) -> bool { self != AutoCaptureMode::Never }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(from = "SessionSettingsFile")]
pub struct SessionSettings {
    pub restore_mode: RestoreMode,
    pub auto_capture_mode: AutoCaptureMode,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionSettingsFile {
    #[serde(default)]
    restore_mode: RestoreMode,
    #[serde(default)]
    auto_capture_mode: Option<AutoCaptureMode>,
    /// Replaced by `auto_capture_mode`.
    #[serde(default)]
    auto_capture_enabled: Option<bool>,
}

impl From<SessionSettingsFile> for SessionSettings {
    fn from(file: SessionSettingsFile) -> Self {
        let auto_capture_mode = match (file.auto_capture_mode, file.auto_capture_enabled) {
            (Some(mode), _) => mode,
            (None, Some(false)) => AutoCaptureMode::Never,
            (None, Some(true)) | (None, None) => AutoCaptureMode::WhenMaximized,
        };
        Self { restore_mode: file.restore_mode, auto_capture_mode }
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct InventorySettings {
    /// Age after which the cached window list is refreshed in the background.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "stale_after_ms", default = "default_stale_after")]
    pub stale_after: Duration,
}

impl Default for InventorySettings {
    fn default() -> Self { Self { stale_after: default_stale_after() } }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct CaptureSettings {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "timeout_ms", default = "default_capture_timeout")]
    pub timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "poll_interval_ms", default = "default_poll_interval")]
    pub poll_interval: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            timeout: default_capture_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl CaptureSettings {
    fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.poll_interval.as_millis() < MIN_POLL_INTERVAL_MS {
            issues.push(format!(
                "capture.poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}, got {}",
                self.poll_interval.as_millis()
            ));
        }
        if self.timeout < self.poll_interval {
            issues.push(format!(
                "capture.timeout_ms ({}) is shorter than capture.poll_interval_ms ({})",
                self.timeout.as_millis(),
                self.poll_interval.as_millis()
            ));
        }
        issues
    }
}

fn no() -> bool { false }

fn default_stale_after() -> Duration { Duration::from_millis(750) }

fn default_capture_timeout() -> Duration { Duration::from_millis(2500) }

fn default_poll_interval() -> Duration { Duration::from_millis(50) }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    /// Reads `path` if it exists, otherwise returns the defaults.
    pub fn read_or_default(path: &Path) -> anyhow::Result<Config> {
        if path.exists() { Self::read(path) } else { Ok(Config::default()) }
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> { Ok(toml::from_str(buf)?) }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.switcher.validate());
        if self.inventory.stale_after.is_zero() {
            issues.push("inventory.stale_after_ms must be positive".to_string());
        }
        issues.extend(self.capture.validate());
        issues
    }
}
