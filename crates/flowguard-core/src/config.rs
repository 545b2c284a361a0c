use crate::error::{FlowguardError, Result};
use crate::paths;
use crate::rules::RuleRegistry;
use flowguard_llm::{AnthropicProvider, ClaudeCliProvider, LlmProvider, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// LlmBackend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmBackend {
    Anthropic {
        #[serde(default = "default_model")]
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_max_tokens")]
        max_tokens: u32,
    },
    ClaudeCli {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default = "default_executable")]
        executable: String,
    },
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_executable() -> String {
    "claude".to_string()
}

impl Default for LlmBackend {
    fn default() -> Self {
        LlmBackend::Anthropic {
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub backend: LlmBackend,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl LlmConfig {
    /// Construct the configured provider. Fails only when a required API key
    /// is absent from the environment.
    pub fn build_provider(&self) -> Result<Arc<dyn LlmProvider>> {
        match &self.backend {
            LlmBackend::Anthropic {
                model,
                base_url,
                api_key_env,
                max_tokens,
            } => {
                let mut provider = AnthropicProvider::from_env_var(api_key_env, model.clone())?
                    .with_max_tokens(*max_tokens)
                    .with_retry(self.retry.clone());
                if let Some(url) = base_url {
                    provider = provider.with_base_url(url.clone());
                }
                Ok(Arc::new(provider))
            }
            LlmBackend::ClaudeCli { model, executable } => {
                let mut provider = ClaudeCliProvider::new().with_executable(executable.clone());
                if let Some(m) = model {
                    provider = provider.with_model(m.clone());
                }
                Ok(Arc::new(provider))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// VerificationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default)]
    pub skip_low_severity: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_issues: Option<usize>,
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default = "default_include_code_examples")]
    pub include_code_examples: bool,
    #[serde(default = "default_rating_concurrency")]
    pub rating_concurrency: usize,
}

fn default_include_code_examples() -> bool {
    true
}

fn default_rating_concurrency() -> usize {
    1
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            skip_low_severity: false,
            max_issues: None,
            auto_approve: false,
            include_code_examples: default_include_code_examples(),
            rating_concurrency: default_rating_concurrency(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    /// Per-rule enable flags keyed by rule id. Absent ids use the rule's
    /// own default.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, bool>,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            llm: LlmConfig::default(),
            verification: VerificationConfig::default(),
            rules: BTreeMap::new(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(FlowguardError::NotInitialized);
        }
        crate::io::read_yaml(&path)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        crate::io::write_yaml(&path, self)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self, registry: &RuleRegistry) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for rule_id in self.rules.keys() {
            if registry.get(rule_id).is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("unknown rule '{rule_id}' in rules"),
                });
            }
        }

        if self.verification.rating_concurrency == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "verification.rating_concurrency must be at least 1".to_string(),
            });
        }

        if self.verification.max_issues == Some(0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "verification.max_issues=0 discards every issue".to_string(),
            });
        }

        if self.llm.retry.max_attempts > 10 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "llm.retry.max_attempts={} (>10 is unusual)",
                    self.llm.retry.max_attempts
                ),
            });
        }

        if let LlmBackend::ClaudeCli { executable, .. } = &self.llm.backend {
            if executable.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "llm.backend.executable is empty".to_string(),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("test-project");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, "test-project");
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.verification, VerificationConfig::default());
    }

    #[test]
    fn minimal_yaml_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("project:\n  name: demo\n").unwrap();
        assert!(cfg.verification.include_code_examples);
        assert_eq!(cfg.verification.rating_concurrency, 1);
        assert_eq!(cfg.llm.retry, RetryPolicy::default());
        assert!(matches!(cfg.llm.backend, LlmBackend::Anthropic { .. }));
    }

    #[test]
    fn backend_yaml_tagged() {
        let backend = LlmBackend::ClaudeCli {
            model: Some("sonnet".to_string()),
            executable: "claude".to_string(),
        };
        let yaml = serde_yaml::to_string(&backend).unwrap();
        assert!(yaml.contains("type: claude_cli"));
        let parsed: LlmBackend = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, backend);
    }

    #[test]
    fn load_requires_init() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(FlowguardError::NotInitialized)
        ));
        Config::new("demo").save(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap().project.name, "demo");
    }

    #[test]
    fn validate_clean_config() {
        let cfg = Config::new("demo");
        assert!(cfg.validate(&RuleRegistry::default_rules()).is_empty());
    }

    #[test]
    fn validate_flags_problems() {
        let mut cfg = Config::new("demo");
        cfg.rules.insert("no-such-rule".to_string(), true);
        cfg.rules.insert("no-debug-output".to_string(), false);
        cfg.verification.rating_concurrency = 0;
        cfg.verification.max_issues = Some(0);
        cfg.llm.retry.max_attempts = 20;

        let warnings = cfg.validate(&RuleRegistry::default_rules());
        assert_eq!(warnings.len(), 4);
        assert!(warnings[0].message.contains("no-such-rule"));
        assert!(warnings.iter().any(|w| w.level == WarnLevel::Error));
    }

    #[test]
    fn claude_cli_provider_builds_without_key() {
        let cfg = LlmConfig {
            backend: LlmBackend::ClaudeCli {
                model: None,
                executable: "claude".to_string(),
            },
            retry: RetryPolicy::default(),
        };
        let provider = cfg.build_provider().unwrap();
        assert_eq!(provider.name(), "claude_cli");
    }

    #[test]
    fn anthropic_provider_requires_key() {
        let cfg = LlmConfig {
            backend: LlmBackend::Anthropic {
                model: default_model(),
                base_url: None,
                api_key_env: "FLOWGUARD_TEST_KEY_THAT_IS_NOT_SET".to_string(),
                max_tokens: 1024,
            },
            retry: RetryPolicy::none(),
        };
        assert!(matches!(
            cfg.build_provider(),
            Err(FlowguardError::Llm(flowguard_llm::LlmError::MissingApiKey(_)))
        ));
    }
}
