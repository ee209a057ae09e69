use crate::core::exec::{ExecOptions, DEFAULT_IFRAME_PARENTS, DEFAULT_NAME_PREFIX};
use crate::core::registry::{DEFAULT_EXPIRATION_MINUTES, MAX_EXPIRATION_MINUTES};
use crate::domain::model::SecurityPolicy;
use crate::utils::error::{Result, RunnerError};
use crate::utils::validation::{self, Validate};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 32123;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub modules: ModulesConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "::".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    pub baseline_path: PathBuf,
    /// 動態模組的寫入目錄，未設定時使用系統暫存目錄
    pub module_dir: Option<PathBuf>,
    pub expiration_minutes: u64,
    pub name_prefix: String,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            baseline_path: PathBuf::from("main.page"),
            module_dir: None,
            expiration_minutes: DEFAULT_EXPIRATION_MINUTES as u64,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub allowed_iframe_parents: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_iframe_parents: DEFAULT_IFRAME_PARENTS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RunnerError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| RunnerError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MODULE_DIR})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::LazyLock;

        static ENV_VAR: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"));

        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.server.host)?;
        validation::validate_positive_number("server.port", u64::from(self.server.port), 1)?;

        validation::validate_path("modules.baseline_path", &self.modules.baseline_path)?;
        if let Some(dir) = &self.modules.module_dir {
            validation::validate_path("modules.module_dir", dir)?;
        }
        validation::validate_positive_number(
            "modules.expiration_minutes",
            self.modules.expiration_minutes,
            1,
        )?;
        if self.modules.expiration_minutes > MAX_EXPIRATION_MINUTES as u64 {
            return Err(RunnerError::InvalidConfigValueError {
                field: "modules.expiration_minutes".to_string(),
                value: self.modules.expiration_minutes.to_string(),
                reason: format!("Value must be at most {}", MAX_EXPIRATION_MINUTES),
            });
        }
        self.expiration()?;
        validation::validate_url_safe("modules.name_prefix", &self.modules.name_prefix)?;

        validation::validate_non_empty_list(
            "security.allowed_iframe_parents",
            &self.security.allowed_iframe_parents,
        )?;

        Ok(())
    }

    /// 取得動態模組目錄
    pub fn module_dir(&self) -> PathBuf {
        self.modules
            .module_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn expiration(&self) -> Result<Duration> {
        i64::try_from(self.modules.expiration_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .ok_or_else(|| RunnerError::InvalidConfigValueError {
                field: "modules.expiration_minutes".to_string(),
                value: self.modules.expiration_minutes.to_string(),
                reason: "Value is too large".to_string(),
            })
    }

    pub fn security_policy(&self) -> SecurityPolicy {
        SecurityPolicy::new(self.security.allowed_iframe_parents.clone())
    }

    pub fn exec_options(&self) -> Result<ExecOptions> {
        Ok(ExecOptions {
            baseline_path: self.modules.baseline_path.clone(),
            expiration: self.expiration()?,
            policy: self.security_policy(),
            name_prefix: self.modules.name_prefix.clone(),
        })
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
