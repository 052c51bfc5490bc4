//! Configuration Vault – reads/writes `~/.apoyo/config.toml`.

use apoyo_types::QuestionTable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted user configuration stored in `~/.apoyo/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Flat text file with one `key: short || detailed` entry per line.
    #[serde(default = "default_knowledge_file")]
    pub knowledge_file: PathBuf,

    /// Directory holding `<key>.png` images.
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,

    /// Speak answers and messages aloud.
    #[serde(default = "default_narration")]
    pub narration: bool,

    /// TTS program invoked with `speech_args` followed by the text.
    #[serde(default = "default_speech_command")]
    pub speech_command: String,

    #[serde(default = "default_speech_args")]
    pub speech_args: Vec<String>,

    /// Replacement question table.  The built-in table is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<QuestionTable>,
}

fn default_knowledge_file() -> PathBuf {
    PathBuf::from("./BaseDeConocimiento.txt")
}
fn default_image_dir() -> PathBuf {
    PathBuf::from("Imagenes")
}
fn default_narration() -> bool {
    true
}
fn default_speech_command() -> String {
    "espeak-ng".to_string()
}
fn default_speech_args() -> Vec<String> {
    vec!["-v".to_string(), "es".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            knowledge_file: default_knowledge_file(),
            image_dir: default_image_dir(),
            narration: default_narration(),
            speech_command: default_speech_command(),
            speech_args: default_speech_args(),
            questions: None,
        }
    }
}

impl Config {
    pub fn question_table(&self) -> QuestionTable {
        self.questions.clone().unwrap_or_default()
    }
}

/// Return the config path: `$APOYO_CONFIG` when set, else
/// `~/.apoyo/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("APOYO_CONFIG") {
        return PathBuf::from(p);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".apoyo").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config, falling back to defaults (with env overrides) when the
/// file is absent or broken.
pub fn load_or_default() -> Config {
    match load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => with_env_overrides(Config::default()),
        Err(e) => {
            tracing::warn!(error = %e, "Using default configuration");
            with_env_overrides(Config::default())
        }
    }
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(with_env_overrides(cfg)))
}

fn with_env_overrides(mut cfg: Config) -> Config {
    apply_env_overrides(&mut cfg);
    cfg
}

/// Apply `APOYO_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `APOYO_KNOWLEDGE_FILE` | `knowledge_file` |
/// | `APOYO_IMAGE_DIR` | `image_dir` |
/// | `APOYO_NARRATION` | `narration` (`on`/`off`, `true`/`false`, `1`/`0`) |
/// | `APOYO_SPEECH_COMMAND` | `speech_command` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("APOYO_KNOWLEDGE_FILE") {
        cfg.knowledge_file = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("APOYO_IMAGE_DIR") {
        cfg.image_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("APOYO_NARRATION")
        && let Some(on) = parse_switch(&v)
    {
        cfg.narration = on;
    }
    if let Ok(v) = std::env::var("APOYO_SPEECH_COMMAND") {
        cfg.speech_command = v;
    }
}

/// Parse an on/off switch.  Unrecognised values give `None`.
pub fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" | "si" | "sí" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Save the config to disk, creating `~/.apoyo/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Restrict the config directory to the owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.speech_args, vec!["-v", "es"]);
        assert!(loaded.questions.is_none());
        assert_eq!(loaded.question_table(), QuestionTable::builtin());
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_mode = fs::metadata(path.parent().unwrap()).expect("dir metadata").permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700, "config directory must have 0o700 permissions");
    }

    #[test]
    fn config_path_points_to_apoyo_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".apoyo"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "narration = false\n").unwrap();
        let cfg = load_from(&path).unwrap().unwrap();
        assert!(!cfg.narration);
        assert_eq!(cfg.speech_args, vec!["-v", "es"]);
    }

    #[test]
    fn custom_question_table_is_loaded_and_validated() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        let good = r#"
[[questions]]
id = "sueno"
prompt = "¿Duermes bien?"
options = [{ label = "sí", code = "1" }, { label = "no", code = "0" }]
"#;
        fs::write(&path, good).unwrap();
        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.question_table().key_len(), 1);

        let bad = good.replace("code = \"0\"", "code = \"00\"");
        fs::write(&path, bad).unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn custom_question_table_survives_save() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        let cfg = Config {
            questions: Some(QuestionTable::builtin()),
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");
        let loaded = load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.questions, Some(QuestionTable::builtin()));
    }

    #[test]
    fn parse_switch_accepts_common_spellings() {
        assert_eq!(parse_switch("ON"), Some(true));
        assert_eq!(parse_switch(" 0 "), Some(false));
        assert_eq!(parse_switch("maybe"), None);
    }

    #[test]
    fn apply_env_overrides_changes_knowledge_file() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("APOYO_KNOWLEDGE_FILE", "/srv/apoyo/kb.txt") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.knowledge_file, PathBuf::from("/srv/apoyo/kb.txt"));
        unsafe { std::env::remove_var("APOYO_KNOWLEDGE_FILE") };
    }

    #[test]
    fn apply_env_overrides_changes_image_dir() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("APOYO_IMAGE_DIR", "/srv/apoyo/img") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.image_dir, PathBuf::from("/srv/apoyo/img"));
        unsafe { std::env::remove_var("APOYO_IMAGE_DIR") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_narration_switch() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("APOYO_NARRATION", "loud") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert!(cfg.narration);
        unsafe { std::env::set_var("APOYO_NARRATION", "off") };
        apply_env_overrides(&mut cfg);
        assert!(!cfg.narration);
        unsafe { std::env::remove_var("APOYO_NARRATION") };
    }

    #[test]
    fn apply_env_overrides_changes_speech_command() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("APOYO_SPEECH_COMMAND", "say") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.speech_command, "say");
        unsafe { std::env::remove_var("APOYO_SPEECH_COMMAND") };
    }
}
