//! Process-wide, deduplicating context factory.
//!
//! Rewritten modules call the factory with the identity emitted by the plugin.
//! Every call for the same `(package, context, major version)` returns the very
//! same [`Context`] instance, no matter how many copies of the declaring module
//! were bundled.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};

pub const NATIVE_NAMESPACE: &str = "global-context";
pub const SELECTOR_NAMESPACE: &str = "global-context-selector";

static SEMVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[=v]?\s*(\d+)\.(\d+)\.(\d+)(?:[-+][0-9A-Za-z.+-]*)?\s*$")
        .expect("semver pattern is valid")
});

static GLOBAL_STORE: LazyLock<Arc<Store>> = LazyLock::new(Default::default);

type Entry = Arc<dyn Any + Send + Sync>;
type Store = Mutex<HashMap<String, Entry>>;

/// A shared context: its registry key and the default value it was created with.
#[derive(Debug)]
pub struct Context<T> {
    key: String,
    default_value: T,
}

impl<T> Context<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn default_value(&self) -> &T {
        &self.default_value
    }
}

pub type ContextHandle<T> = Arc<Context<T>>;

/// Where the registry is running, used to decide whether a reload purges entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionEnv {
    pub is_browser: bool,
    pub is_production: bool,
}

impl ExecutionEnv {
    /// Server-side environment; production iff `NODE_ENV=production`.
    pub fn from_env() -> Self {
        Self::server(std::env::var("NODE_ENV").ok().as_deref())
    }

    /// Server-side environment for a given `NODE_ENV` value.
    pub fn server(node_env: Option<&str>) -> Self {
        Self {
            is_browser: false,
            is_production: node_env.is_some_and(|v| v == "production"),
        }
    }

    fn purges_on_reload(&self) -> bool {
        !self.is_browser && !self.is_production
    }
}

/// Major component of a semver version string.
pub fn major_version(version: &str) -> Result<u64> {
    SEMVER
        .captures(version)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| Error::InvalidVersion(version.to_string()))
}

/// A view of a context store restricted to one namespace.
///
/// [`ContextRegistry::native`] and [`ContextRegistry::selector`] share the
/// process-wide store; [`ContextRegistry::isolated`] gets a private one.
#[derive(Clone)]
pub struct ContextRegistry {
    namespace: String,
    store: Arc<Store>,
}

impl ContextRegistry {
    pub fn global(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            store: Arc::clone(&GLOBAL_STORE),
        }
    }

    pub fn isolated(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            store: Arc::default(),
        }
    }

    pub fn native() -> Self {
        Self::global(NATIVE_NAMESPACE)
    }

    pub fn selector() -> Self {
        Self::global(SELECTOR_NAMESPACE)
    }

    /// Another namespace over the same store.
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            store: Arc::clone(&self.store),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `"<namespace>:<package>/<context>/@<major>"`
    pub fn key(&self, context_name: &str, package_name: &str, package_version: &str) -> Result<String> {
        let major = major_version(package_version)?;
        Ok(format!(
            "{}{package_name}/{context_name}/@{major}",
            self.prefix()
        ))
    }

    /// Returns the context for this identity, creating it with `default_value`
    /// on first use. Later calls ignore their `default_value`.
    pub fn acquire<T>(
        &self,
        default_value: T,
        context_name: &str,
        package_name: &str,
        package_version: &str,
    ) -> Result<ContextHandle<T>>
    where
        T: Send + Sync + 'static,
    {
        let key = self.key(context_name, package_name, package_version)?;
        let entry = {
            let mut store = self.lock();
            let entry = store.entry(key.clone()).or_insert_with(|| {
                debug!(%key, "creating global context");
                Arc::new(Context {
                    key: key.clone(),
                    default_value,
                }) as Entry
            });
            Arc::clone(entry)
        };
        entry
            .downcast::<Context<T>>()
            .map_err(|_| Error::ContextTypeMismatch { key })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of entries in this registry's namespace.
    pub fn len(&self) -> usize {
        let prefix = self.prefix();
        self.lock().keys().filter(|k| k.starts_with(&prefix)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry in this namespace; returns how many were removed.
    pub fn purge(&self) -> usize {
        let prefix = self.prefix();
        let mut store = self.lock();
        let before = store.len();
        store.retain(|key, _| {
            let stale = key.starts_with(&prefix);
            if stale {
                debug!(%key, "deleting global context");
            }
            !stale
        });
        before - store.len()
    }

    /// Reload hook for development servers: purges only outside production and
    /// outside the browser.
    pub fn on_reload(&self, env: ExecutionEnv) -> usize {
        if env.purges_on_reload() {
            self.purge()
        } else {
            0
        }
    }
}
