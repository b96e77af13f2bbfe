/// Server configuration loaded from environment variables
///
/// A `.env` file is loaded first when present (development).
///
/// # Variables
///
/// | Variable | Default |
/// |---|---|
/// | `API_HOST` | `0.0.0.0` |
/// | `API_PORT` | `8080` |
/// | `CORS_ORIGINS` | `*` (comma separated) |
/// | `PRODUCTION` | `false` |
/// | `DATABASE_URL` | required |
/// | `DATABASE_MAX_CONNECTIONS` | `10` |
/// | `DATABASE_RUN_MIGRATIONS` | `true` |
/// | `DATABASE_STATEMENT_TIMEOUT_MS` | unset (no limit) |
/// | `JWT_SECRET` | required, at least 32 characters |
/// | `BOARD_ACTIVATE_ON_CREATE` | `false` |
/// | `BOARD_ON_ACTIVE_DELETE` | `leave_none` or `promote_most_recent` |
/// | `TASK_UNIQUE_NAMES_PER_COLUMN` | `false` |
/// | `DB_CONSISTENCY` | `read_committed` or `serializable` |

use std::env;
use taskboard_shared::{
    activation::{ActivationPolicy, OnActiveDelete},
    db::transaction::ConsistencyLevel,
    ordering::OrderingPolicy,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub board: BoardConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed origins; `*` enables permissive CORS
    pub cors_origins: Vec<String>,

    /// Enables HSTS
    pub production: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
    pub consistency: ConsistencyLevel,

    /// Per-statement limit in milliseconds
    pub statement_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
}

/// Behaviour knobs of the board/task core
#[derive(Debug, Clone, Default)]
pub struct BoardConfig {
    pub activate_on_create: bool,
    pub on_active_delete: OnActiveDelete,
    pub unique_task_names_per_column: bool,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(name: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{} must be a boolean, got '{}'", name, other),
    }
}

fn bool_var(name: &str, default: bool) -> anyhow::Result<bool> {
    match env::var(name) {
        Ok(value) => parse_bool(name, &value),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let port = var_or("API_PORT", "8080").parse::<u16>()?;

        let cors_origins = var_or("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = var_or("DATABASE_MAX_CONNECTIONS", "10").parse::<u32>()?;

        let statement_timeout_ms = match env::var("DATABASE_STATEMENT_TIMEOUT_MS") {
            Ok(value) => Some(value.parse::<u64>()?),
            Err(_) => None,
        };

        let consistency = var_or("DB_CONSISTENCY", "read_committed")
            .parse::<ConsistencyLevel>()
            .map_err(anyhow::Error::msg)?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let on_active_delete = var_or("BOARD_ON_ACTIVE_DELETE", "leave_none")
            .parse::<OnActiveDelete>()
            .map_err(anyhow::Error::msg)?;

        Ok(Self {
            api: ApiConfig {
                host: var_or("API_HOST", "0.0.0.0"),
                port,
                cors_origins,
                production: bool_var("PRODUCTION", false)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                run_migrations: bool_var("DATABASE_RUN_MIGRATIONS", true)?,
                consistency,
                statement_timeout_ms,
            },
            jwt: JwtConfig { secret: jwt_secret },
            board: BoardConfig {
                activate_on_create: bool_var("BOARD_ACTIVATE_ON_CREATE", false)?,
                on_active_delete,
                unique_task_names_per_column: bool_var("TASK_UNIQUE_NAMES_PER_COLUMN", false)?,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn ordering_policy(&self) -> OrderingPolicy {
        OrderingPolicy {
            unique_task_names_per_column: self.board.unique_task_names_per_column,
            consistency: self.database.consistency,
        }
    }

    pub fn activation_policy(&self) -> ActivationPolicy {
        ActivationPolicy {
            activate_on_create: self.board.activate_on_create,
            on_active_delete: self.board.on_active_delete,
            consistency: self.database.consistency,
        }
    }
}
