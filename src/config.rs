//! Configuration file loading and editing.
//!
//! The file is TOML at `$AICOMMIT_CONFIG` or `<config dir>/aicommit/config.toml`.
//! Loading resolves every backend into an [`AdapterDescriptor`] up front, so
//! nothing downstream reads raw keys.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::git::DiffSummary;
use crate::llm::subprocess::is_installed;
use crate::llm::{AdapterDescriptor, Provider, ProviderSettings};
use crate::orchestrator::{RequestContext, RequestMode};

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "AICOMMIT_CONFIG";

/// Fallback credential for the `openai` backend.
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_LOCALE: &str = "en";
const DEFAULT_MAX_LENGTH: usize = 50;
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_GENERATE: u8 = 5;
const COMMIT_TYPES: &[&str] = &["conventional", "gitmoji", ""];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    locale: Option<String>,
    generate: Option<u8>,
    #[serde(rename = "type")]
    commit_type: Option<String>,
    max_length: Option<usize>,
    code_review: bool,
    system_prompt_path: Option<PathBuf>,
    exclude: Vec<String>,
    timeout_secs: Option<u64>,
    review_per_file: bool,
    providers: ProvidersFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProvidersFile {
    claude: Option<ProviderFile>,
    codex: Option<ProviderFile>,
    openai: Option<ProviderFile>,
    ollama: Option<ProviderFile>,
}

impl ProvidersFile {
    fn get(&self, provider: Provider) -> Option<&ProviderFile> {
        match provider {
            Provider::Claude => self.claude.as_ref(),
            Provider::Codex => self.codex.as_ref(),
            Provider::OpenAi => self.openai.as_ref(),
            Provider::Ollama => self.ollama.as_ref(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderFile {
    disabled: bool,
    code_review: bool,
    model: Option<String>,
    models: Vec<String>,
    key: Option<String>,
    url: Option<String>,
    host: Option<String>,
    temperature: Option<f32>,
    prompt: Option<String>,
    timeout_secs: Option<u64>,
    review_per_file: Option<bool>,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub locale: Option<String>,
    pub generate: Option<u8>,
    pub prompt: Option<String>,
    pub exclude: Vec<String>,
    pub commit_type: Option<String>,
}

/// Fully resolved configuration for one process.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub locale: String,
    pub generate: u8,
    pub commit_type: Option<String>,
    pub max_length: usize,
    pub code_review: bool,
    /// Contents of `system_prompt_path`, read and validated at load.
    pub system_prompt: Option<String>,
    pub exclude: Vec<String>,
    /// Request-level prompt from `--prompt`.
    pub prompt: Option<String>,
    pub descriptors: Vec<AdapterDescriptor>,
}

impl Config {
    /// Shared context for one orchestration run over `diff`.
    pub fn request_context(&self, mode: RequestMode, diff: DiffSummary) -> RequestContext {
        RequestContext {
            mode,
            diff,
            locale: self.locale.clone(),
            generate: self.generate,
            exclude: self.exclude.clone(),
            prompt: self.prompt.clone(),
            commit_type: self.commit_type.clone(),
            max_length: self.max_length,
            system_prompt: self.system_prompt.clone(),
        }
    }
}

/// Resolve the config file location.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV)
        && !path.is_empty()
    {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(dir.join("aicommit").join("config.toml"))
}

/// Load the config file, apply overrides, and resolve backend descriptors.
pub fn load(overrides: &CliOverrides) -> Result<Config, ConfigError> {
    let path = config_path()?;
    load_from(&path, overrides, &is_installed)
}

fn load_from(
    path: &Path,
    overrides: &CliOverrides,
    installed: &dyn Fn(&str) -> bool,
) -> Result<Config, ConfigError> {
    let file = read_config_file(path)?;

    let generate = overrides.generate.or(file.generate).unwrap_or(1);
    if !(1..=MAX_GENERATE).contains(&generate) {
        return Err(ConfigError::InvalidValue {
            key: "generate".to_string(),
            reason: format!("must be between 1 and {MAX_GENERATE}, got {generate}"),
        });
    }

    let commit_type = overrides
        .commit_type
        .clone()
        .or_else(|| file.commit_type.clone())
        .unwrap_or_default();
    if !COMMIT_TYPES.contains(&commit_type.as_str()) {
        return Err(ConfigError::InvalidValue {
            key: "type".to_string(),
            reason: format!("expected 'conventional' or 'gitmoji', got '{commit_type}'"),
        });
    }

    let system_prompt = match &file.system_prompt_path {
        Some(prompt_path) => Some(read_system_prompt(prompt_path)?),
        None => None,
    };

    let mut exclude = file.exclude.clone();
    exclude.extend(overrides.exclude.iter().cloned());

    let descriptors = build_descriptors(&file, installed);
    debug!(
        "Loaded config from {}: {} backend(s) configured",
        path.display(),
        descriptors.len()
    );

    Ok(Config {
        path: path.to_path_buf(),
        locale: overrides
            .locale
            .clone()
            .or(file.locale.clone())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        generate,
        commit_type: (!commit_type.is_empty()).then_some(commit_type),
        max_length: file.max_length.unwrap_or(DEFAULT_MAX_LENGTH),
        code_review: file.code_review,
        system_prompt,
        exclude,
        prompt: overrides.prompt.clone(),
        descriptors,
    })
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(source) => {
            return Err(ConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_system_prompt(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::SystemPrompt {
        path: path.to_path_buf(),
        source,
    })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

fn build_descriptors(file: &ConfigFile, installed: &dyn Fn(&str) -> bool) -> Vec<AdapterDescriptor> {
    let default_table = ProviderFile::default();
    let mut descriptors = Vec::new();

    for provider in Provider::ALL {
        let table = file.providers.get(provider).unwrap_or(&default_table);
        let settings = ProviderSettings {
            model: non_empty(table.model.as_ref()),
            temperature: table.temperature,
            prompt: non_empty(table.prompt.as_ref()),
            timeout: Duration::from_secs(
                table
                    .timeout_secs
                    .or(file.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            review_per_file: table.review_per_file.unwrap_or(file.review_per_file),
            endpoint: None,
            api_key: None,
        };
        let base = |name: String, settings: ProviderSettings, available: bool| AdapterDescriptor {
            name,
            provider,
            disabled: table.disabled,
            available,
            code_review: table.code_review,
            settings,
        };

        match provider {
            Provider::Claude | Provider::Codex => {
                let available = provider.executable().is_some_and(|exe| installed(exe));
                descriptors.push(base(provider.config_key().to_string(), settings, available));
            }
            Provider::OpenAi => {
                let api_key = non_empty(table.key.as_ref())
                    .or_else(|| non_empty(std::env::var(OPENAI_KEY_ENV).ok().as_ref()));
                let settings = ProviderSettings {
                    endpoint: non_empty(table.url.as_ref()),
                    api_key: api_key.clone(),
                    ..settings
                };
                descriptors.push(base(
                    provider.config_key().to_string(),
                    settings,
                    api_key.is_some(),
                ));
            }
            Provider::Ollama => {
                let mut models: Vec<String> = Vec::new();
                for model in table.models.iter().chain(table.model.iter()) {
                    let model = model.trim();
                    if !model.is_empty() && !models.iter().any(|m| m == model) {
                        models.push(model.to_string());
                    }
                }
                for model in models {
                    let settings = ProviderSettings {
                        model: Some(model.clone()),
                        endpoint: non_empty(table.host.as_ref()),
                        ..settings.clone()
                    };
                    descriptors.push(base(format!("ollama/{model}"), settings, true));
                }
            }
        }
    }

    descriptors
}

#[derive(Debug, Clone, Copy)]
enum ValueKind {
    Text,
    Bool,
    Integer { min: i64, max: i64 },
    Float,
    List,
    Choice(&'static [&'static str]),
}

/// Split a dotted key into its table path and validate it.
fn key_kind(key: &str) -> Result<(Vec<&str>, ValueKind), ConfigError> {
    let parts: Vec<&str> = key.split('.').collect();
    let kind = match parts.as_slice() {
        ["locale"] | ["system_prompt_path"] => ValueKind::Text,
        ["type"] => ValueKind::Choice(COMMIT_TYPES),
        ["generate"] => ValueKind::Integer {
            min: 1,
            max: i64::from(MAX_GENERATE),
        },
        ["max_length"] => ValueKind::Integer { min: 20, max: 1000 },
        ["timeout_secs"] => ValueKind::Integer { min: 1, max: 3600 },
        ["code_review"] | ["review_per_file"] => ValueKind::Bool,
        ["exclude"] => ValueKind::List,
        ["providers", provider, field] if Provider::from_config_key(provider).is_some() => {
            match *field {
                "disabled" | "code_review" | "review_per_file" => ValueKind::Bool,
                "model" | "key" | "url" | "host" | "prompt" => ValueKind::Text,
                "models" => ValueKind::List,
                "temperature" => ValueKind::Float,
                "timeout_secs" => ValueKind::Integer { min: 1, max: 3600 },
                _ => return Err(ConfigError::UnknownKey(key.to_string())),
            }
        }
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    };
    Ok((parts, kind))
}

fn parse_value(key: &str, kind: ValueKind, raw: &str) -> Result<toml_edit::Item, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: key.to_string(),
        reason,
    };
    let raw = raw.trim();

    let item = match kind {
        ValueKind::Text => toml_edit::value(raw),
        ValueKind::Choice(choices) => {
            if !choices.contains(&raw) {
                return Err(invalid(format!("expected one of {choices:?}")));
            }
            toml_edit::value(raw)
        }
        ValueKind::Bool => match raw {
            "true" => toml_edit::value(true),
            "false" => toml_edit::value(false),
            _ => return Err(invalid("expected 'true' or 'false'".to_string())),
        },
        ValueKind::Integer { min, max } => {
            let n: i64 = raw
                .parse()
                .map_err(|_| invalid(format!("'{raw}' is not an integer")))?;
            if !(min..=max).contains(&n) {
                return Err(invalid(format!("must be between {min} and {max}")));
            }
            toml_edit::value(n)
        }
        ValueKind::Float => {
            let n: f64 = raw
                .parse()
                .map_err(|_| invalid(format!("'{raw}' is not a number")))?;
            if !(0.0..=2.0).contains(&n) {
                return Err(invalid("must be between 0 and 2".to_string()));
            }
            toml_edit::value(n)
        }
        ValueKind::List => {
            let array: toml_edit::Array = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            toml_edit::value(array)
        }
    };
    Ok(item)
}

fn read_document(path: &Path) -> Result<toml_edit::DocumentMut, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(ConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Replace the file atomically: write a sibling temp file, then rename it over.
fn write_document(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    let write_failed = |source: std::io::Error| ConfigError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_failed)?;
    tmp.write_all(doc.to_string().as_bytes())
        .map_err(write_failed)?;
    tmp.persist(path).map_err(|e| write_failed(e.error))?;
    Ok(())
}

fn render(item: &toml_edit::Item) -> Option<String> {
    let value = item.as_value()?;
    match value {
        toml_edit::Value::String(s) => Some(s.value().clone()),
        toml_edit::Value::Array(array) => Some(
            array
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string().trim().to_string()))
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string().trim().to_string()),
    }
}

/// Read one dotted key from the file at `path`. `None` when unset.
pub fn get_value(path: &Path, key: &str) -> Result<Option<String>, ConfigError> {
    let (parts, _) = key_kind(key)?;
    let doc = read_document(path)?;

    let mut item = doc.as_item();
    for part in parts {
        match item.get(part) {
            Some(next) => item = next,
            None => return Ok(None),
        }
    }
    Ok(render(item))
}

/// Set `key=value` pairs in the file at `path`, preserving formatting.
///
/// All pairs are validated before the file is touched.
pub fn set_values(path: &Path, pairs: &[(String, String)]) -> Result<(), ConfigError> {
    let mut updates = Vec::with_capacity(pairs.len());
    for (key, raw) in pairs {
        let (parts, kind) = key_kind(key)?;
        let item = parse_value(key, kind, raw)?;
        let parts: Vec<String> = parts.into_iter().map(str::to_string).collect();
        updates.push((key.as_str(), parts, item));
    }

    let mut doc = read_document(path)?;
    for (key, parts, mut item) in updates {
        let Some((field, tables)) = parts.split_last() else {
            continue;
        };
        let mut table = doc.as_table_mut();
        for name in tables {
            let entry = table.entry(name).or_insert(toml_edit::table());
            if let Some(t) = entry.as_table_mut() {
                t.set_implicit(true);
            }
            table = entry.as_table_mut().ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("'{name}' is not a table"),
            })?;
        }
        // Reuse an existing key so comments attached to it survive.
        match table.get_mut(field) {
            Some(existing) => {
                if let (Some(old), Some(new)) = (existing.as_value(), item.as_value_mut()) {
                    *new.decor_mut() = old.decor().clone();
                }
                *existing = item;
            }
            None => {
                table.insert(field, item);
            }
        }
    }

    write_document(path, &doc)
}

/// Parse a `key=value` CLI argument.
pub fn parse_assignment(arg: &str) -> Result<(String, String), ConfigError> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::InvalidValue {
            key: arg.to_string(),
            reason: "expected key=value".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn nothing_installed(_: &str) -> bool {
        false
    }

    fn everything_installed(_: &str) -> bool {
        true
    }

    fn names(config: &Config) -> Vec<&str> {
        config.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    #[serial]
    fn test_missing_file_yields_defaults() {
        temp_env::with_var_unset(OPENAI_KEY_ENV, || {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("absent.toml");

            let config = load_from(&path, &CliOverrides::default(), &nothing_installed).unwrap();
            assert_eq!(config.locale, "en");
            assert_eq!(config.generate, 1);
            assert_eq!(config.max_length, 50);
            assert!(config.commit_type.is_none());
            assert!(!config.code_review);
            assert!(config.descriptors.iter().all(|d| !d.available));
        });
    }

    #[test]
    #[serial]
    fn test_openai_key_falls_back_to_environment() {
        let (_dir, path) = write_config("");
        temp_env::with_var(OPENAI_KEY_ENV, Some("sk-env"), || {
            let config = load_from(&path, &CliOverrides::default(), &nothing_installed).unwrap();
            let openai = config.descriptors.iter().find(|d| d.name == "openai").unwrap();
            assert!(openai.available);
            assert_eq!(openai.settings.api_key.as_deref(), Some("sk-env"));
        });
    }

    #[test]
    #[serial]
    fn test_empty_openai_key_is_unavailable() {
        let (_dir, path) = write_config("[providers.openai]\nkey = \"  \"\n");
        temp_env::with_var_unset(OPENAI_KEY_ENV, || {
            let config = load_from(&path, &CliOverrides::default(), &nothing_installed).unwrap();
            let openai = config.descriptors.iter().find(|d| d.name == "openai").unwrap();
            assert!(!openai.available);
        });
    }

    #[test]
    #[serial]
    fn test_provider_tables_resolve_to_descriptors() {
        let (_dir, path) = write_config(
            r#"
code_review = true
timeout_secs = 30

[providers.codex]
disabled = true

[providers.openai]
key = "sk-file"
url = "http://localhost:9999"
model = "gpt-4o"
temperature = 0.2
code_review = true
timeout_secs = 5

[providers.ollama]
models = ["llama3", "mistral"]
model = "llama3"
host = "http://gpu-box:11434"
"#,
        );
        temp_env::with_var_unset(OPENAI_KEY_ENV, || {
            let config = load_from(&path, &CliOverrides::default(), &everything_installed).unwrap();
            assert_eq!(
                names(&config),
                vec!["claude", "codex", "openai", "ollama/llama3", "ollama/mistral"]
            );
            assert!(config.code_review);

            let codex = &config.descriptors[1];
            assert!(codex.disabled);

            let openai = &config.descriptors[2];
            assert_eq!(openai.settings.endpoint.as_deref(), Some("http://localhost:9999"));
            assert_eq!(openai.settings.timeout, Duration::from_secs(5));
            assert_eq!(openai.settings.temperature, Some(0.2));
            assert!(openai.code_review);

            let claude = &config.descriptors[0];
            assert_eq!(claude.settings.timeout, Duration::from_secs(30));

            let mistral = &config.descriptors[4];
            assert_eq!(mistral.settings.model.as_deref(), Some("mistral"));
            assert_eq!(mistral.settings.endpoint.as_deref(), Some("http://gpu-box:11434"));
        });
    }

    #[test]
    fn test_cli_overrides_win() {
        let (_dir, path) = write_config("locale = \"fr\"\ngenerate = 2\nexclude = [\"dist/app.js\"]\n");
        let overrides = CliOverrides {
            locale: Some("de".to_string()),
            generate: Some(3),
            prompt: Some("mention the ticket".to_string()),
            exclude: vec!["*.snap".to_string()],
            commit_type: Some("gitmoji".to_string()),
        };

        let config = load_from(&path, &overrides, &nothing_installed).unwrap();
        assert_eq!(config.locale, "de");
        assert_eq!(config.generate, 3);
        assert_eq!(config.prompt.as_deref(), Some("mention the ticket"));
        assert_eq!(config.exclude, vec!["dist/app.js", "*.snap"]);
        assert_eq!(config.commit_type.as_deref(), Some("gitmoji"));
    }

    #[test]
    fn test_generate_out_of_range_is_rejected() {
        let (_dir, path) = write_config("generate = 9\n");
        let err = load_from(&path, &CliOverrides::default(), &nothing_installed).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "generate"));
    }

    #[test]
    fn test_unreadable_system_prompt_is_an_error() {
        let (dir, path) = write_config("");
        let missing = dir.path().join("missing-prompt.txt");
        fs::write(
            &path,
            format!("system_prompt_path = {:?}\n", missing.display().to_string()),
        )
        .unwrap();

        let err = load_from(&path, &CliOverrides::default(), &nothing_installed).unwrap_err();
        assert!(matches!(err, ConfigError::SystemPrompt { .. }));
    }

    #[test]
    fn test_system_prompt_file_is_loaded() {
        let (dir, path) = write_config("");
        let prompt = dir.path().join("prompt.txt");
        fs::write(&prompt, "You write haiku commits.").unwrap();
        fs::write(
            &path,
            format!("system_prompt_path = {:?}\n", prompt.display().to_string()),
        )
        .unwrap();

        let config = load_from(&path, &CliOverrides::default(), &nothing_installed).unwrap();
        assert_eq!(config.system_prompt.as_deref(), Some("You write haiku commits."));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let (_dir, path) = write_config("generate = [oops");
        let err = load_from(&path, &CliOverrides::default(), &nothing_installed).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed { .. }));
    }

    #[test]
    fn test_set_preserves_comments_and_creates_tables() {
        let (_dir, path) = write_config("# my settings\nlocale = \"en\"\n");

        set_values(
            &path,
            &[
                ("locale".to_string(), "ja".to_string()),
                ("providers.openai.key".to_string(), "sk-123".to_string()),
                ("providers.ollama.models".to_string(), "llama3, mistral".to_string()),
                ("code_review".to_string(), "true".to_string()),
            ],
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# my settings"));
        assert_eq!(get_value(&path, "locale").unwrap().as_deref(), Some("ja"));
        assert_eq!(
            get_value(&path, "providers.openai.key").unwrap().as_deref(),
            Some("sk-123")
        );
        assert_eq!(
            get_value(&path, "providers.ollama.models").unwrap().as_deref(),
            Some("llama3,mistral")
        );
        assert_eq!(get_value(&path, "code_review").unwrap().as_deref(), Some("true"));
        assert_eq!(get_value(&path, "providers.codex.model").unwrap(), None);
    }

    #[test]
    fn test_set_keeps_comments_around_updated_keys() {
        let (_dir, path) = write_config(
            "[providers.openai]\n# rotated monthly\nkey = \"sk-old\" # personal key\nmodel = \"gpt-4o\"\n",
        );

        set_values(&path, &[("providers.openai.key".to_string(), "sk-new".to_string())]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("# rotated monthly\nkey = \"sk-new\""));
        assert!(content.contains("# personal key"));
        assert!(!content.contains("sk-old"));
        assert!(content.contains("model = \"gpt-4o\""));
    }

    #[test]
    fn test_set_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        set_values(&path, &[("generate".to_string(), "3".to_string())]).unwrap();
        assert_eq!(get_value(&path, "generate").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn test_set_validates_before_writing() {
        let (_dir, path) = write_config("locale = \"en\"\n");

        let err = set_values(
            &path,
            &[
                ("locale".to_string(), "fr".to_string()),
                ("generate".to_string(), "7".to_string()),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert_eq!(get_value(&path, "locale").unwrap().as_deref(), Some("en"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let (_dir, path) = write_config("");
        assert!(matches!(
            get_value(&path, "colour"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            set_values(&path, &[("providers.gemini.key".to_string(), "x".to_string())]),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("providers.openai.url=http://h:1/v1").unwrap(),
            ("providers.openai.url".to_string(), "http://h:1/v1".to_string())
        );
        assert!(parse_assignment("locale").is_err());
        assert!(parse_assignment("=en").is_err());
    }
}
