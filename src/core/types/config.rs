use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LogConfig {
    pub level: Option<String>,
    pub color: Option<bool>, // None = auto-detect (semantic)
}

impl LogConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    pub fn color(&self) -> Option<bool> {
        self.color // None has semantic meaning (auto-detect)
    }
}

/// Where the analysis and fuzzer binaries live and how to (re)build them.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ToolsConfig {
    /// Directory the tool binaries are installed into and executed from
    pub bin_dir: Option<PathBuf>,
    /// Workspace checkout used for `cargo install --path <source_dir>/<crate>`
    pub source_dir: Option<PathBuf>,
    pub arch: Option<String>,
    pub targets_dir: Option<PathBuf>,
    /// Shared library copied next to the binaries after a fuzzer build
    pub qemu_library: Option<PathBuf>,
    pub fuzzer_config: Option<String>,
    pub models_file: Option<String>,
}

impl ToolsConfig {
    pub fn bin_dir(&self) -> PathBuf {
        self.bin_dir.clone().unwrap_or_else(|| {
            dirs_next::home_dir()
                .unwrap_or_else(|| PathBuf::from("/home/user"))
                .join(".cargo")
                .join("bin")
        })
    }

    pub fn source_dir(&self) -> PathBuf {
        self.source_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn arch(&self) -> &str {
        self.arch.as_deref().unwrap_or("arm")
    }

    pub fn targets_dir(&self) -> PathBuf {
        self.targets_dir.clone().unwrap_or_else(|| {
            dirs_next::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hoedur-targets")
        })
    }

    pub fn qemu_library(&self) -> PathBuf {
        self.qemu_library.clone().unwrap_or_else(|| {
            self.source_dir()
                .join("target")
                .join("release")
                .join(format!("libqemu-system-{}.release.so", self.arch()))
        })
    }

    pub fn fuzzer_config(&self) -> &str {
        self.fuzzer_config.as_deref().unwrap_or("config.yml")
    }

    pub fn models_file(&self) -> &str {
        self.models_file.as_deref().unwrap_or("models.yml.zst")
    }

    /// Directory holding the per-target configuration of `target`
    pub fn target_dir(&self, target: &str) -> PathBuf {
        self.targets_dir().join(self.arch()).join(target)
    }

    /// Basic-block whitelist shipped with every target
    pub fn valid_basic_blocks(&self, target: &str) -> PathBuf {
        self.target_dir(target).join("valid_basic_blocks.txt")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PoolConfig {
    pub cores: Option<usize>,
    pub progress: Option<bool>,
}

impl PoolConfig {
    /// Worker count for analysis jobs (logical cores unless overridden)
    pub fn cores(&self) -> usize {
        self.cores.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Worker count for live fuzzing runs (physical cores unless overridden)
    pub fn fuzz_cores(&self) -> usize {
        self.cores.unwrap_or_else(num_cpus::get_physical).max(1)
    }

    pub fn progress(&self) -> bool {
        self.progress.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    pub log: Option<LogConfig>,
    pub tools: Option<ToolsConfig>,
    pub pool: Option<PoolConfig>,
}

impl Config {
    pub fn log(&self) -> LogConfig {
        self.log.clone().unwrap_or_default()
    }

    pub fn tools(&self) -> ToolsConfig {
        self.tools.clone().unwrap_or_default()
    }

    pub fn pool(&self) -> PoolConfig {
        self.pool.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<String>,
    pub log_level: Option<String>,
    pub log_color: Option<String>, // "on" | "off"
    pub cores: Option<usize>,
    pub progress: bool,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

pub const CONFIG_FILENAME: &str = "fuzzeval.toml";

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        let mut cfg = Config::default();
        // Apply nearest config file found by walking up from cwd
        if let Some(path) = find_nearest_config_file()
            && let Some(file_cfg) = read_config_file(&path)
        {
            apply_file_config(&mut cfg, &file_cfg);
        }
        cfg
    })
}

pub fn init_with_overrides(overrides: &CliOverrides) {
    let mut cfg = Config::default();

    // 1) Config file: explicit path, else walk up from cwd and use the first one found
    let path = overrides
        .config
        .as_ref()
        .map(PathBuf::from)
        .or_else(find_nearest_config_file);
    if let Some(path) = path
        && let Some(file_cfg) = read_config_file(&path)
    {
        apply_file_config(&mut cfg, &file_cfg);
    }

    // 2) CLI arguments (highest priority). Only override if user specified.
    apply_cli_overrides(&mut cfg, overrides);

    let _ = CONFIG.set(cfg);
}

pub fn read_config_file(path: &Path) -> Option<Config> {
    let contents = fs::read_to_string(path).ok()?;
    match toml::from_str::<Config>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!("Ignoring invalid config file {}: {e}", path.display());
            None
        }
    }
}

pub fn apply_file_config(cfg: &mut Config, file: &Config) {
    if let Some(file_log) = &file.log {
        let mut log = cfg.log();
        if file_log.level.is_some() {
            log.level = file_log.level.clone();
        }
        if file_log.color.is_some() {
            log.color = file_log.color;
        }
        cfg.log = Some(log);
    }

    if let Some(file_tools) = &file.tools {
        let mut tools = cfg.tools();
        macro_rules! take {
            ($($field:ident),*) => {
                $(if file_tools.$field.is_some() {
                    tools.$field = file_tools.$field.clone();
                })*
            };
        }
        take!(
            bin_dir,
            source_dir,
            arch,
            targets_dir,
            qemu_library,
            fuzzer_config,
            models_file
        );
        cfg.tools = Some(tools);
    }

    if let Some(file_pool) = &file.pool {
        let mut pool = cfg.pool();
        if file_pool.cores.is_some() {
            pool.cores = file_pool.cores;
        }
        if file_pool.progress.is_some() {
            pool.progress = file_pool.progress;
        }
        cfg.pool = Some(pool);
    }
}

pub fn apply_cli_overrides(cfg: &mut Config, overrides: &CliOverrides) {
    let mut log = cfg.log();
    if let Some(level) = &overrides.log_level
        && !level.trim().is_empty()
    {
        log.level = Some(level.trim().to_string());
    }
    if let Some(color_str) = &overrides.log_color {
        match color_str.to_lowercase().as_str() {
            "on" => log.color = Some(true),
            "off" => log.color = Some(false),
            _ => {}
        }
    }
    if overrides.log_level.is_some() || overrides.log_color.is_some() {
        cfg.log = Some(log);
    }

    let mut pool = cfg.pool();
    if overrides.cores.is_some() {
        pool.cores = overrides.cores;
    }
    if overrides.progress {
        pool.progress = Some(true);
    }
    if overrides.cores.is_some() || overrides.progress {
        cfg.pool = Some(pool);
    }
}

fn find_nearest_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    for dir in cwd.ancestors() {
        let candidate = dir.join(CONFIG_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

pub fn colors_enabled() -> bool {
    match config().log().color() {
        Some(force) => force,
        None => console::colors_enabled_stderr(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_win_over_file() {
        let file: Config = toml::from_str(
            r#"
            [log]
            level = "debug"

            [pool]
            cores = 3

            [tools]
            arch = "cortex-m"
            "#,
        )
        .unwrap();

        let mut cfg = Config::default();
        apply_file_config(&mut cfg, &file);
        assert_eq!(cfg.pool().cores(), 3);
        assert_eq!(cfg.tools().arch(), "cortex-m");

        apply_cli_overrides(
            &mut cfg,
            &CliOverrides {
                log_level: Some("warn".into()),
                cores: Some(8),
                ..Default::default()
            },
        );
        assert_eq!(cfg.log().level(), "warn");
        assert_eq!(cfg.pool().cores(), 8);
        assert_eq!(cfg.tools().arch(), "cortex-m");
    }

    #[test]
    fn tool_paths_follow_arch() {
        let tools = ToolsConfig {
            targets_dir: Some(PathBuf::from("/targets")),
            source_dir: Some(PathBuf::from("/src/hoedur")),
            ..Default::default()
        };
        assert_eq!(
            tools.valid_basic_blocks("P2IM/CNC"),
            PathBuf::from("/targets/arm/P2IM/CNC/valid_basic_blocks.txt")
        );
        assert_eq!(
            tools.qemu_library(),
            PathBuf::from("/src/hoedur/target/release/libqemu-system-arm.release.so")
        );
    }
}
