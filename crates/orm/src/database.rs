//! Database Integration - connection options and the connection pool
//!
//! [`ConnectionPool`] is an explicitly owned, lazily connected pool: build it
//! from [`ConnectOptions`], call [`ConnectionPool::initialize`] once at
//! start-up, and pass it to the executor and model methods. Acquiring before
//! initialization fails with `PoolNotReady`; initializing twice fails with
//! `PoolAlreadyInitialized`.
//!
//! For applications that prefer one process-wide pool,
//! [`create_connection_pool`] and [`global_pool`] wrap a single guarded
//! instance.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sqlx::any::AnyPoolOptions;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool};

use crate::backends::{redact_url, DatabaseBackendType, SqlDialect};
use crate::error::{ModelError, ModelResult};

/// Database connection pool error types
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Connection pool has not been initialized")]
    NotReady,

    #[error("Connection pool has already been initialized")]
    AlreadyInitialized,

    #[error("Connection acquisition failed: {0}")]
    AcquisitionFailed(#[from] sqlx::Error),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Connection timeout after {timeout}s")]
    ConnectionTimeout { timeout: u64 },

    #[error("Health check failed: {reason}")]
    HealthCheckFailed { reason: String },
}

/// ORM-specific error for database operations
impl From<PoolError> for ModelError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::NotReady => ModelError::PoolNotReady,
            PoolError::AlreadyInitialized => ModelError::PoolAlreadyInitialized,
            PoolError::AcquisitionFailed(sqlx_err) => {
                ModelError::Connection(format!("Database connection failed: {}", sqlx_err))
            }
            PoolError::PoolClosed => ModelError::Connection("Database pool is closed".to_string()),
            PoolError::ConnectionTimeout { timeout } => {
                ModelError::Connection(format!("Database connection timeout after {}s", timeout))
            }
            PoolError::HealthCheckFailed { reason } => {
                ModelError::Connection(format!("Database health check failed: {}", reason))
            }
        }
    }
}

/// Connection pool tuning beyond the size bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Seconds to wait for a free connection
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: 30,
            idle_timeout: Some(600),  // 10 minutes
            max_lifetime: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

fn default_backend() -> DatabaseBackendType {
    DatabaseBackendType::MySQL
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_charset() -> String {
    "utf8".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_size() -> u32 {
    10
}

fn default_min_size() -> u32 {
    1
}

/// Pool initialization parameters
///
/// `user`, `password` and `database` are required unless a full `url` is
/// supplied; everything else has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectOptions {
    #[serde(default = "default_backend")]
    pub backend: DatabaseBackendType,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    /// Required with discrete fields; an empty string is a valid password
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: String,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default = "default_true")]
    pub autocommit: bool,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[serde(default = "default_min_size")]
    pub min_size: u32,
    /// Full connection URL; takes precedence over the discrete fields
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl ConnectOptions {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            backend: default_backend(),
            host: default_host(),
            port: default_port(),
            user: user.into(),
            password: Some(password.into()),
            database: database.into(),
            charset: default_charset(),
            autocommit: true,
            max_size: default_max_size(),
            min_size: default_min_size(),
            url: None,
            pool: PoolConfig::default(),
        }
    }

    /// Options for a full connection URL (`mysql://`, `postgres://`, `sqlite:`)
    pub fn from_url(url: impl Into<String>) -> ModelResult<Self> {
        let url = url.into();
        let backend = DatabaseBackendType::from_url(&url)?;
        Ok(Self {
            backend,
            url: Some(url),
            ..Self::new("", "", "")
        })
    }

    /// Read options from the environment.
    ///
    /// `DATABASE_URL` wins if set; otherwise `DB_USER`, `DB_PASSWORD` and
    /// `DB_DATABASE` are required and `DB_HOST`, `DB_PORT`, `DB_BACKEND` are
    /// optional. `DB_CHARSET`, `DB_AUTOCOMMIT`, `DB_MAX_SIZE` and
    /// `DB_MIN_SIZE` apply in both cases.
    pub fn from_env() -> ModelResult<Self> {
        let mut options = match std::env::var("DATABASE_URL") {
            Ok(url) => Self::from_url(url)?,
            Err(_) => {
                let mut options =
                    Self::new(required_env("DB_USER")?, required_env("DB_PASSWORD")?, required_env("DB_DATABASE")?);
                if let Some(backend) = optional_env::<DatabaseBackendType>("DB_BACKEND")? {
                    options.backend = backend;
                }
                if let Ok(host) = std::env::var("DB_HOST") {
                    options.host = host;
                }
                if let Some(port) = optional_env("DB_PORT")? {
                    options.port = port;
                }
                options
            }
        };

        if let Ok(charset) = std::env::var("DB_CHARSET") {
            options.charset = charset;
        }
        if let Some(autocommit) = optional_env("DB_AUTOCOMMIT")? {
            options.autocommit = autocommit;
        }
        if let Some(max_size) = optional_env("DB_MAX_SIZE")? {
            options.max_size = max_size;
        }
        if let Some(min_size) = optional_env("DB_MIN_SIZE")? {
            options.min_size = min_size;
        }

        options.validate()?;
        Ok(options)
    }

    pub fn with_backend(mut self, backend: DatabaseBackendType) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_min_size(mut self, min_size: u32) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn with_pool_config(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Backend the options resolve to (a `url` overrides `backend`)
    pub fn resolved_backend(&self) -> ModelResult<DatabaseBackendType> {
        match &self.url {
            Some(url) => DatabaseBackendType::from_url(url),
            None => Ok(self.backend),
        }
    }

    /// Check required keys and size bounds
    pub fn validate(&self) -> ModelResult<()> {
        if self.url.is_none() {
            if self.database.is_empty() {
                return Err(ModelError::Configuration("database is required".to_string()));
            }
            if self.backend != DatabaseBackendType::SQLite {
                if self.user.is_empty() {
                    return Err(ModelError::Configuration("user is required".to_string()));
                }
                if self.password.is_none() {
                    return Err(ModelError::Configuration("password is required".to_string()));
                }
            }
        }
        if self.max_size == 0 {
            return Err(ModelError::Configuration("max_size must be at least 1".to_string()));
        }
        if self.min_size > self.max_size {
            return Err(ModelError::Configuration(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    /// Connection URL handed to the driver
    pub fn connection_url(&self) -> ModelResult<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        if self.backend == DatabaseBackendType::SQLite {
            return Ok(match self.database.as_str() {
                ":memory:" => "sqlite::memory:".to_string(),
                path => format!("sqlite://{}", path),
            });
        }

        let mut url = url::Url::parse(&format!(
            "{}://{}:{}/{}",
            self.backend.scheme(),
            self.host,
            self.port,
            self.database
        ))
        .map_err(|e| ModelError::Configuration(format!("Invalid connection parameters: {}", e)))?;
        url.set_username(&self.user)
            .map_err(|_| ModelError::Configuration("Invalid user name".to_string()))?;
        url.set_password(self.password.as_deref())
            .map_err(|_| ModelError::Configuration("Invalid password".to_string()))?;
        if self.backend == DatabaseBackendType::MySQL {
            url.query_pairs_mut().append_pair("charset", &self.charset);
        }
        Ok(url.to_string())
    }
}

fn required_env(key: &str) -> ModelResult<String> {
    std::env::var(key)
        .map_err(|_| ModelError::Configuration(format!("{} is required", key)))
}

fn optional_env<T>(key: &str) -> ModelResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ModelError::Configuration(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Connection pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_connections: u32,
    pub idle_connections: u32,
    pub active_connections: u32,
    pub acquire_count: u64,
    pub acquire_errors: u64,
    pub created_at: Instant,
}

/// Bounded pool of database connections shared across tasks
pub struct ConnectionPool {
    options: ConnectOptions,
    backend: DatabaseBackendType,
    pool: OnceLock<AnyPool>,
    acquire_count: AtomicU64,
    acquire_errors: AtomicU64,
    created_at: Instant,
}

impl ConnectionPool {
    /// Create an unconnected pool; call [`ConnectionPool::initialize`] before use
    pub fn new(options: ConnectOptions) -> ModelResult<Self> {
        options.validate()?;
        let backend = options.resolved_backend()?;
        Ok(Self {
            options,
            backend,
            pool: OnceLock::new(),
            acquire_count: AtomicU64::new(0),
            acquire_errors: AtomicU64::new(0),
            created_at: Instant::now(),
        })
    }

    /// Create and initialize a pool in one step
    pub async fn connect(options: ConnectOptions) -> ModelResult<Self> {
        let pool = Self::new(options)?;
        pool.initialize().await?;
        Ok(pool)
    }

    /// Open the pool's connections. Fails if already initialized.
    pub async fn initialize(&self) -> ModelResult<()> {
        if self.pool.get().is_some() {
            return Err(PoolError::AlreadyInitialized.into());
        }

        let url = self.options.connection_url()?;
        tracing::info!("Creating connection pool for {} ({})", self.backend, redact_url(&url));
        tracing::debug!(
            "Pool configuration: max={}, min={}, timeout={}s, idle_timeout={:?}s, max_lifetime={:?}s, test_before_acquire={}",
            self.options.max_size,
            self.options.min_size,
            self.options.pool.acquire_timeout,
            self.options.pool.idle_timeout,
            self.options.pool.max_lifetime,
            self.options.pool.test_before_acquire
        );

        sqlx::any::install_default_drivers();

        let config = &self.options.pool;
        let mut pool_options = AnyPoolOptions::new()
            .max_connections(self.options.max_size)
            .min_connections(self.options.min_size)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .test_before_acquire(config.test_before_acquire)
            .idle_timeout(config.idle_timeout.map(Duration::from_secs))
            .max_lifetime(config.max_lifetime.map(Duration::from_secs));

        if !self.options.autocommit && self.backend == DatabaseBackendType::MySQL {
            pool_options = pool_options.after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query::<Any>("SET autocommit=0").execute(&mut *conn).await?;
                    Ok(())
                })
            });
        }

        let pool = pool_options.connect(&url).await.map_err(|e| {
            tracing::error!("Failed to create database pool: {}", e);
            ModelError::Connection(format!("Failed to create database pool: {}", e))
        })?;

        if let Err(pool) = self.pool.set(pool) {
            // Lost a race with a concurrent initialize
            pool.close().await;
            return Err(PoolError::AlreadyInitialized.into());
        }

        tracing::info!(
            "Database pool created successfully with {} max connections",
            self.options.max_size
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.get().is_some()
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    pub fn backend(&self) -> DatabaseBackendType {
        self.backend
    }

    /// SQL dialect of the connected backend
    pub fn dialect(&self) -> SqlDialect {
        self.backend.dialect()
    }

    fn inner(&self) -> Result<&AnyPool, PoolError> {
        let pool = self.pool.get().ok_or(PoolError::NotReady)?;
        if pool.is_closed() {
            return Err(PoolError::PoolClosed);
        }
        Ok(pool)
    }

    /// Acquire a connection; it returns to the pool when dropped, on every
    /// exit path including cancellation.
    pub async fn acquire(&self) -> Result<PoolConnection<Any>, PoolError> {
        let pool = self.inner()?;
        self.acquire_count.fetch_add(1, Ordering::Relaxed);

        match pool.acquire().await {
            Ok(conn) => {
                tracing::debug!(
                    "Database connection acquired (total: {}, idle: {})",
                    pool.size(),
                    pool.num_idle()
                );
                Ok(conn)
            }
            Err(e) => {
                self.acquire_errors.fetch_add(1, Ordering::Relaxed);
                let pool_error = self.classify_error(e);
                tracing::error!("Failed to acquire database connection: {}", pool_error);
                Err(pool_error)
            }
        }
    }

    /// Acquire a connection and begin a transaction that owns it
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, Any>, PoolError> {
        let pool = self.inner()?;
        self.acquire_count.fetch_add(1, Ordering::Relaxed);

        match pool.begin().await {
            Ok(tx) => {
                tracing::debug!("Database transaction started");
                Ok(tx)
            }
            Err(e) => {
                self.acquire_errors.fetch_add(1, Ordering::Relaxed);
                let pool_error = self.classify_error(e);
                tracing::error!("Failed to begin database transaction: {}", pool_error);
                Err(pool_error)
            }
        }
    }

    /// Classify sqlx errors into pool-specific errors
    fn classify_error(&self, error: sqlx::Error) -> PoolError {
        match &error {
            sqlx::Error::PoolTimedOut => PoolError::ConnectionTimeout {
                timeout: self.options.pool.acquire_timeout,
            },
            sqlx::Error::PoolClosed => PoolError::PoolClosed,
            _ => PoolError::AcquisitionFailed(error),
        }
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let (total, idle) = match self.pool.get() {
            Some(pool) => (pool.size(), pool.num_idle() as u32),
            None => (0, 0),
        };

        PoolStats {
            total_connections: total,
            idle_connections: idle,
            active_connections: total.saturating_sub(idle),
            acquire_count: self.acquire_count.load(Ordering::Relaxed),
            acquire_errors: self.acquire_errors.load(Ordering::Relaxed),
            created_at: self.created_at,
        }
    }

    /// Run a trivial query on a pooled connection
    pub async fn health_check(&self) -> Result<Duration, PoolError> {
        let start = Instant::now();
        let mut conn = self.acquire().await.map_err(|e| PoolError::HealthCheckFailed {
            reason: format!("Could not acquire connection: {}", e),
        })?;

        sqlx::query::<Any>("SELECT 1")
            .execute(&mut *conn)
            .await
            .map_err(|e| PoolError::HealthCheckFailed {
                reason: format!("Health check query failed: {}", e),
            })?;

        let duration = start.elapsed();
        tracing::debug!("Database health check passed in {:?}", duration);
        Ok(duration)
    }

    /// Close every connection; waits for checked-out connections to return
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            tracing::info!("Closing connection pool for {}", self.backend);
            pool.close().await;
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("backend", &self.backend)
            .field("initialized", &self.is_initialized())
            .field("max_size", &self.options.max_size)
            .field("min_size", &self.options.min_size)
            .finish()
    }
}

static GLOBAL_POOL: OnceLock<ConnectionPool> = OnceLock::new();

/// Create the process-wide pool. A second call fails with
/// `PoolAlreadyInitialized` instead of replacing the first pool.
pub async fn create_connection_pool(options: ConnectOptions) -> ModelResult<&'static ConnectionPool> {
    if GLOBAL_POOL.get().is_some() {
        return Err(ModelError::PoolAlreadyInitialized);
    }

    let pool = ConnectionPool::connect(options).await?;
    if let Err(pool) = GLOBAL_POOL.set(pool) {
        pool.close().await;
        return Err(ModelError::PoolAlreadyInitialized);
    }
    global_pool()
}

/// The process-wide pool, or `PoolNotReady` before [`create_connection_pool`]
pub fn global_pool() -> ModelResult<&'static ConnectionPool> {
    GLOBAL_POOL.get().ok_or(ModelError::PoolNotReady)
}
