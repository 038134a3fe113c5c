use contracts::enums::vision_provider::VisionProviderKind;
use once_cell::sync::OnceCell;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub sheets: SheetsConfig,
    pub vision: VisionConfig,
    pub expense: ExpenseConfig,
    /// Секреты из окружения, в config.toml не хранятся
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Директория со статикой PWA-фронтенда
    pub static_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsConfig {
    pub worksheet: String,
    /// Имена колонок листа в фиксированном порядке
    pub columns: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VisionConfig {
    /// Включённые провайдеры, в порядке показа в интерфейсе
    pub providers: Vec<String>,
    pub default_provider: String,
    pub claude_model: String,
    pub gemini_model: String,
    pub grok_model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExpenseConfig {
    pub categories: Vec<String>,
    pub payment_methods: Vec<String>,
    /// Категория-свалка для нераспознанных случаев
    pub default_category: String,
}

#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Общий bearer-токен; пустой — гейт выключен
    pub auth_token: String,
    pub anthropic_api_key: String,
    pub google_api_key: String,
    pub xai_api_key: String,
    pub spreadsheet_id: String,
    pub service_account_file: String,
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[server]
port = 3000
static_dir = "frontend"

[sheets]
worksheet = "Sheet1"
columns = [
    "Дата",
    "Категория",
    "Цена лв",
    "Цена €",
    "GGBG лв",
    "Плащане",
    "Допълн. такса",
    "Payback",
    "Пояснения",
    "БУЛСТАТ",
]
timeout_secs = 30

[vision]
providers = ["claude", "gemini", "grok"]
default_provider = "claude"
claude_model = "claude-haiku-4-5-20251001"
gemini_model = "gemini-2.0-flash"
grok_model = "grok-2-vision-latest"
max_tokens = 512
timeout_secs = 60

[expense]
default_category = "Разни"
categories = [
    "Храна",
    "Оборотни стоки",
    "Стоки за дома",
    "Забавления",
    "Козметика",
    "Гориво",
    "Дрехи и обувки",
    "Разходи квартира",
    "Балчик",
    "Варна",
    "Провадия",
    "Подаръци",
    "Техсол",
    "Абонаментни сметки",
    "Кредитни карти",
    "Здравни",
    "Лора",
    "Бебе",
    "Разни",
    "Разходи апартамент",
]
payment_methods = [
    "ВиртуаленPOS",
    "Cash",
    "Diners",
    "ePay",
    "PayPal",
    "RaiCard",
    "Revolut",
    "FIB 0889",
    "Ваучери за храна",
    "ОББ",
    "Bulbank 4416",
]
"#;

static CONFIG: OnceCell<Config> = OnceCell::new();

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
///
/// Secrets are overlaid from environment variables afterwards.
pub fn load_config() -> anyhow::Result<Config> {
    let mut config = load_config_file()?;
    config.secrets = load_secrets();

    // VISION_PROVIDER переопределяет провайдера по умолчанию
    if let Ok(provider) = std::env::var("VISION_PROVIDER") {
        if !provider.trim().is_empty() {
            config.vision.default_provider = provider;
        }
    }
    if let Ok(worksheet) = std::env::var("GOOGLE_SHEETS_WORKSHEET") {
        if !worksheet.trim().is_empty() {
            config.sheets.worksheet = worksheet;
        }
    }

    validate(&config)?;
    Ok(config)
}

fn load_config_file() -> anyhow::Result<Config> {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    tracing::info!("Using default embedded configuration");
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok(config)
}

fn load_secrets() -> Secrets {
    let env = |name: &str| std::env::var(name).unwrap_or_default();
    Secrets {
        auth_token: env("AUTH_TOKEN"),
        anthropic_api_key: env("ANTHROPIC_API_KEY"),
        google_api_key: env("GOOGLE_API_KEY"),
        xai_api_key: env("XAI_API_KEY"),
        spreadsheet_id: env("GOOGLE_SHEETS_ID"),
        service_account_file: {
            let path = env("GOOGLE_SERVICE_ACCOUNT_FILE");
            if path.is_empty() {
                "service_account.json".into()
            } else {
                path
            }
        },
    }
}

fn validate(config: &Config) -> anyhow::Result<()> {
    for provider in &config.vision.providers {
        VisionProviderKind::from_str(provider).map_err(|e| anyhow::anyhow!(e))?;
    }
    if !config.is_enabled_provider(&config.vision.default_provider) {
        anyhow::bail!(
            "default_provider '{}' is not in the provider list",
            config.vision.default_provider
        );
    }
    if !config
        .expense
        .categories
        .contains(&config.expense.default_category)
    {
        anyhow::bail!(
            "default_category '{}' is not in the category list",
            config.expense.default_category
        );
    }
    if config.sheets.columns.is_empty() {
        anyhow::bail!("sheets.columns must not be empty");
    }
    Ok(())
}

pub fn init_config(config: Config) -> anyhow::Result<()> {
    CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("Config already initialized"))
}

pub fn config() -> &'static Config {
    CONFIG.get().expect("Config has not been initialized")
}

#[cfg(test)]
pub fn test_config() -> Config {
    toml::from_str(DEFAULT_CONFIG).expect("embedded default config is valid")
}

#[cfg(test)]
pub fn init_test_config() {
    let _ = CONFIG.set(test_config());
}

impl Config {
    pub fn is_known_category(&self, category: &str) -> bool {
        self.expense.categories.iter().any(|c| c == category)
    }

    pub fn is_known_payment_method(&self, method: &str) -> bool {
        self.expense.payment_methods.iter().any(|m| m == method)
    }

    pub fn is_enabled_provider(&self, provider: &str) -> bool {
        self.vision.providers.iter().any(|p| p == provider)
    }

    /// 1-based индекс колонки по имени
    pub fn column_index(&self, name: &str) -> Option<u32> {
        self.sheets
            .columns
            .iter()
            .position(|c| c == name)
            .map(|i| i as u32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.sheets.columns.len(), 10);
        assert_eq!(config.expense.default_category, "Разни");
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_default_category_is_in_closed_set() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.is_known_category(&config.expense.default_category));
        assert!(!config.is_known_category("NonExistent"));
    }

    #[test]
    fn test_column_index_is_one_based() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.column_index("Дата"), Some(1));
        assert_eq!(config.column_index("Категория"), Some(2));
        assert_eq!(config.column_index("БУЛСТАТ"), Some(10));
        assert_eq!(config.column_index("NoSuchColumn"), None);
    }

    #[test]
    fn test_default_provider_is_enabled() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.is_enabled_provider(&config.vision.default_provider));
        assert!(!config.is_enabled_provider("gpt4"));
        for provider in &config.vision.providers {
            assert!(VisionProviderKind::from_str(provider).is_ok());
        }
    }
}
