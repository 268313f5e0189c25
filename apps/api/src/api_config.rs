use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use atlas_core::{AppError, UserId};
use axum::http::HeaderName;
use tracing_subscriber::EnvFilter;

const DEFAULT_ACTOR_HEADER: &str = "x-actor-id";

/// Storage backend selected with `ATLAS_STORE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Memory,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub store: StoreBackend,
    pub api_host: String,
    pub api_port: u16,
    pub actor_header: HeaderName,
    pub bootstrap_super_admin: Option<UserId>,
    pub memory_user_ids: Vec<UserId>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let store = match env::var("ATLAS_STORE")
            .unwrap_or_else(|_| "postgres".to_owned())
            .as_str()
        {
            "postgres" => StoreBackend::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "ATLAS_STORE must be either 'postgres' or 'memory', got '{other}'"
                )));
            }
        };

        if migrate_only && store == StoreBackend::Memory {
            return Err(AppError::Validation(
                "migrate requires ATLAS_STORE=postgres".to_owned(),
            ));
        }

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = parse_env("API_PORT", 3001)?;

        let actor_header = env::var("ACTOR_HEADER")
            .unwrap_or_else(|_| DEFAULT_ACTOR_HEADER.to_owned())
            .to_ascii_lowercase();
        let actor_header = HeaderName::from_str(actor_header.as_str()).map_err(|error| {
            AppError::Validation(format!("invalid ACTOR_HEADER '{actor_header}': {error}"))
        })?;

        let bootstrap_super_admin = env::var("BOOTSTRAP_SUPER_ADMIN_ID")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse_user_id("BOOTSTRAP_SUPER_ADMIN_ID", value.as_str()))
            .transpose()?;

        let memory_user_ids = env::var("MEMORY_USER_IDS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| parse_user_id("MEMORY_USER_IDS", value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            migrate_only,
            store,
            api_host,
            api_port,
            actor_header,
            bootstrap_super_admin,
            memory_user_ids,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }

    /// Accounts registered as active when running on the in-memory store,
    /// the bootstrap admin first.
    pub fn memory_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.bootstrap_super_admin.into_iter().collect();
        for user_id in &self.memory_user_ids {
            if !users.contains(user_id) {
                users.push(*user_id);
            }
        }
        users
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        Err(_) => Ok(default),
    }
}

fn parse_user_id(name: &str, value: &str) -> Result<UserId, AppError> {
    UserId::from_str(value).map_err(|error| AppError::Validation(format!("{name}: {error}")))
}
