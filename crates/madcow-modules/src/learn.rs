//! Per-nick fact storage.
//!
//! `set <db> <nick> <value>` stores `value` under `nick` in one of the
//! [`DATABASES`]. Other modules can read the stored facts back with
//! [`Learn::lookup`].
//!
//! State is kept in memory and, when `data_file` is configured, mirrored to a
//! JSON document of the form `{ "<db>": { "<nick>": "<value>" } }`. The file
//! is read lazily on first use and rewritten after every successful `set`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use madcow_core::{
    BoxedModule, MatchArgs, Module, ModuleDescriptor, ModuleError, ModuleOptions, ModuleResult,
    Pattern, Request,
};

/// Databases that may be written with `set`.
pub const DATABASES: &[&str] = &["location", "email", "karma"];

/// Configuration for `[modules.config.learn]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnConfig {
    /// JSON file the databases are persisted to. In-memory only when unset.
    pub data_file: Option<PathBuf>,
}

type Databases = BTreeMap<String, BTreeMap<String, String>>;

/// The learn module.
pub struct Learn {
    pattern: Pattern,
    data_file: Option<PathBuf>,
    store: OnceCell<Mutex<Databases>>,
}

impl Learn {
    pub fn new(config: LearnConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Pattern::case_insensitive(r"^\s*set\s+(\S+)\s+(\S+)\s+(.+)$")?,
            data_file: config.data_file,
            store: OnceCell::new(),
        })
    }

    async fn store(&self) -> ModuleResult<&Mutex<Databases>> {
        self.store
            .get_or_try_init(|| async {
                let databases = match &self.data_file {
                    Some(path) => load(path).await?,
                    None => Databases::new(),
                };
                Ok::<_, ModuleError>(Mutex::new(databases))
            })
            .await
    }

    /// Returns the value stored for `key` in `db`. Keys are case-insensitive.
    pub async fn lookup(&self, db: &str, key: &str) -> ModuleResult<Option<String>> {
        let store = self.store().await?.lock().await;
        Ok(store
            .get(db)
            .and_then(|entries| entries.get(&key.to_lowercase()))
            .cloned())
    }

    /// Stores `val` for `key` in `db` and persists the result.
    ///
    /// The in-memory databases only change once the file has been written.
    pub async fn set(&self, db: &str, key: &str, val: &str) -> ModuleResult<()> {
        let mut store = self.store().await?.lock().await;
        let mut updated = store.clone();
        updated
            .entry(db.to_string())
            .or_default()
            .insert(key.to_lowercase(), val.to_string());

        if let Some(path) = &self.data_file {
            save(path, &updated).await?;
            debug!(path = %path.display(), db, "Saved learn databases");
        }
        *store = updated;
        Ok(())
    }
}

async fn load(path: &Path) -> ModuleResult<Databases> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Databases::new()),
        Err(e) => Err(e.into()),
    }
}

async fn save(path: &Path, databases: &Databases) -> ModuleResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let json = serde_json::to_vec_pretty(databases)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[async_trait]
impl Module for Learn {
    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn options(&self) -> ModuleOptions {
        ModuleOptions::default().allow_threading(false)
    }

    fn help(&self) -> Option<&str> {
        Some("set <location|email> <nick> <val> - set db attribs")
    }

    async fn response(&self, args: &MatchArgs, req: &Request) -> ModuleResult<Option<String>> {
        let nick = req.nick();
        let (Some(db), Some(key), Some(val)) = (args.get(0), args.get(1), args.get(2)) else {
            return Ok(None);
        };

        if !DATABASES.contains(&db) {
            return Ok(Some(format!("{nick}: unknown database")));
        }

        match self.set(db, key, val).await {
            Ok(()) => Ok(Some(format!("{nick}: set {key}'s {db} to {val}"))),
            Err(e) => {
                warn!(db, key, error = %e, "Failed to store learned value");
                Ok(Some(format!("{nick}: couldn't set that")))
            }
        }
    }
}

/// Static descriptor for the learn module.
pub static LEARN_MODULE: ModuleDescriptor = ModuleDescriptor {
    name: "learn",
    desc: "stores per-nick locations, e-mail addresses and karma",
    create: |ctx| {
        Box::pin(async move {
            let config: LearnConfig = ctx.get_config()?;
            let learn = Learn::new(config).map_err(|e| ModuleError::msg(e.to_string()))?;
            Ok::<BoxedModule, ModuleError>(Arc::new(learn))
        })
    },
};
