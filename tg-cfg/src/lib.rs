//! Configuration flags for `tg`.
//!
//! Every knob of the generator (concurrency, timeouts, how missing IDL folders are treated, ...)
//! is a statically defined [`Config`] that gets registered into a [`ConfigSet`]. Values can then
//! be updated at runtime by name, from a project manifest, the environment, or the command line.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{
    Arc, RwLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use anyhow::Context;
use compact_str::CompactString;
use tg_ore::assert_none;

/// Prefix for environment variables that override a [`Config`], e.g. `TG_CONCURRENCY`.
pub const ENV_PREFIX: &str = "TG_";

/// A single configuration setting.
pub struct Config<V: ConfigDefault> {
    name: &'static str,
    desc: &'static str,
    value: V,
}

impl<V: ConfigDefault> Config<V> {
    /// Define a new [`Config`] with a default value.
    pub const fn new(name: &'static str, desc: &'static str, default: V) -> Self {
        Config {
            name,
            desc,
            value: default,
        }
    }

    /// Read the value of this [`Config`] from the provided [`ConfigSet`].
    ///
    /// # Panics
    /// * If this [`Config`] was never registered with the [`ConfigSet`].
    pub fn read(&self, set: &ConfigSet) -> V::StoredValue {
        let Some(entry) = set.configs.get(self.name) else {
            panic!("tried to read unregistered config {}", self.name);
        };
        V::from_shared(&entry.value)
    }
}

/// A thread-safe shareable set of [`Config`]s.
///
/// Clones share their values, an update through one clone is observed by all of them.
#[derive(Clone, Debug)]
pub struct ConfigSet {
    configs: Arc<BTreeMap<CompactString, ConfigSetEntry>>,
}

impl ConfigSet {
    /// Returns a new [`ConfigSetBuilder`].
    pub fn builder() -> ConfigSetBuilder {
        ConfigSetBuilder::default()
    }

    /// Update [`Config`] in this [`ConfigSet`] with the specified value.
    ///
    /// # Panics
    /// * If [`Config`] was not previously registered with the original [`ConfigSetBuilder`].
    pub fn update<V: ConfigDefault>(&self, config: &'static Config<V>, value: V) {
        let entry = self
            .configs
            .get(config.name)
            .expect("tried to update unregistered config");
        entry.value.store(value.into_stored().into_dyn());
    }

    /// Update the [`Config`] in this [`ConfigSet`] with `name` to `value`.
    ///
    /// # Errors
    ///
    /// * If no config named `name` exists in this set.
    /// * If the config specified by `name` cannot parse `value`.
    ///
    pub fn try_update(&self, name: &str, value: &str) -> Result<(), anyhow::Error> {
        let entry = self
            .configs
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("no config named '{name}' found"))?;
        entry
            .value
            .store_parsed(value)
            .with_context(|| format!("invalid value '{value}' for config '{name}'"))?;
        Ok(())
    }

    /// Parse an assignment of the form `name=value` and apply it with [`ConfigSet::try_update`].
    pub fn try_assign(&self, assignment: &str) -> Result<(), anyhow::Error> {
        let Some((name, value)) = assignment.split_once('=') else {
            anyhow::bail!("expected 'name=value', found '{assignment}'");
        };
        self.try_update(name.trim(), value.trim())
    }

    /// Apply overrides from the process environment, see [`ConfigSet::apply_env_with`].
    pub fn apply_env(&self) -> Result<(), anyhow::Error> {
        self.apply_env_with(|var| std::env::var(var).ok())
    }

    /// Apply overrides for every registered config whose [`ENV_PREFIX`]ed variable is set
    /// according to `lookup`.
    ///
    /// Returns an error for the first variable that fails to parse.
    pub fn apply_env_with<F>(&self, lookup: F) -> Result<(), anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        for name in self.configs.keys() {
            let var = tg_ore::env::override_var(ENV_PREFIX, name);
            if let Some(value) = lookup(&var) {
                self.try_update(name, &value)
                    .with_context(|| format!("from environment variable {var}"))?;
            }
        }
        Ok(())
    }

    /// Iterate over the name, current value, and description of every config in this set.
    pub fn entries(&self) -> impl Iterator<Item = (&str, String, &'static str)> + '_ {
        self.configs
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.value.to_string(), entry.desc))
    }
}

impl fmt::Display for ConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value, desc) in self.entries() {
            writeln!(f, "{name} => {value}\n\t└─ '{desc}'")?;
        }
        Ok(())
    }
}

/// Single entry within a [`ConfigSet`].
#[derive(Clone, Debug)]
struct ConfigSetEntry {
    value: SharedConfigValue,
    desc: &'static str,
}

/// A builder for a [`ConfigSet`].
#[derive(Default, Debug)]
pub struct ConfigSetBuilder {
    configs: BTreeMap<CompactString, (DynConfigValue, &'static str)>,
}

impl ConfigSetBuilder {
    /// Register a [`Config`] into this [`ConfigSetBuilder`] with the default value.
    ///
    /// # Panics
    /// * If a config with the same name was already registered.
    pub fn register<V: ConfigDefault>(&mut self, config: &'static Config<V>) -> &mut Self {
        let value = config.value.into_stored().into_dyn();
        let prev = self
            .configs
            .insert(CompactString::const_new(config.name), (value, config.desc));
        assert_none!(prev, "config '{}' registered more than once", config.name);
        self
    }

    /// Consumes this [`ConfigSetBuilder`] constructing a [`ConfigSet`].
    pub fn build(self) -> ConfigSet {
        let configs = self
            .configs
            .into_iter()
            .map(|(name, (value, desc))| {
                let entry = ConfigSetEntry {
                    value: value.into_shared(),
                    desc,
                };
                (name, entry)
            })
            .collect();
        ConfigSet {
            configs: Arc::new(configs),
        }
    }
}

/// Types that can be provided as a default to a [`Config`].
pub trait ConfigDefault {
    /// The type that actually gets stored in a [`ConfigSet`].
    type StoredValue: ConfigValue;

    fn into_stored(&self) -> Self::StoredValue;
    fn from_shared(val: &SharedConfigValue) -> Self::StoredValue;
}

impl ConfigDefault for bool {
    type StoredValue = bool;

    fn into_stored(&self) -> Self::StoredValue {
        *self
    }

    fn from_shared(val: &SharedConfigValue) -> Self::StoredValue {
        let SharedConfigValue::Bool(val) = val else {
            panic!("programming error, found {val:?} for bool")
        };
        val.load(Ordering::SeqCst)
    }
}

impl ConfigDefault for u64 {
    type StoredValue = u64;

    fn into_stored(&self) -> Self::StoredValue {
        *self
    }

    fn from_shared(val: &SharedConfigValue) -> Self::StoredValue {
        let SharedConfigValue::U64(val) = val else {
            panic!("programming error, found {val:?} for u64")
        };
        val.load(Ordering::SeqCst)
    }
}

impl ConfigDefault for &str {
    type StoredValue = CompactString;

    fn into_stored(&self) -> Self::StoredValue {
        CompactString::new(self)
    }

    fn from_shared(val: &SharedConfigValue) -> Self::StoredValue {
        let SharedConfigValue::String(val) = val else {
            panic!("programming error, found {val:?} for string")
        };
        let read_lock = val.read().expect("SharedConfigValue::String lock poisoned");
        read_lock.clone()
    }
}

pub trait ConfigValue {
    fn into_dyn(self) -> DynConfigValue;
}

impl ConfigValue for bool {
    fn into_dyn(self) -> DynConfigValue {
        DynConfigValue::Bool(self)
    }
}

impl ConfigValue for u64 {
    fn into_dyn(self) -> DynConfigValue {
        DynConfigValue::U64(self)
    }
}

impl ConfigValue for CompactString {
    fn into_dyn(self) -> DynConfigValue {
        DynConfigValue::String(self)
    }
}

/// "Type erased" configuration values.
#[derive(Debug)]
pub enum DynConfigValue {
    Bool(bool),
    U64(u64),
    String(CompactString),
}

impl DynConfigValue {
    fn into_shared(self) -> SharedConfigValue {
        match self {
            DynConfigValue::Bool(val) => SharedConfigValue::Bool(Arc::new(AtomicBool::new(val))),
            DynConfigValue::U64(val) => SharedConfigValue::U64(Arc::new(AtomicU64::new(val))),
            DynConfigValue::String(val) => SharedConfigValue::String(Arc::new(RwLock::new(val))),
        }
    }
}

/// Shareable instance of [`DynConfigValue`].
#[derive(Clone, Debug)]
pub enum SharedConfigValue {
    Bool(Arc<AtomicBool>),
    U64(Arc<AtomicU64>),
    String(Arc<RwLock<CompactString>>),
}

impl SharedConfigValue {
    fn store(&self, value: DynConfigValue) {
        match (self, value) {
            (SharedConfigValue::Bool(shared), DynConfigValue::Bool(val)) => {
                shared.store(val, Ordering::SeqCst);
            }
            (SharedConfigValue::U64(shared), DynConfigValue::U64(val)) => {
                shared.store(val, Ordering::SeqCst);
            }
            (SharedConfigValue::String(shared), DynConfigValue::String(val)) => {
                let mut write_lock = shared
                    .write()
                    .expect("SharedConfigValue::String lock poisoned");
                *write_lock = val;
            }
            (shared, val) => unreachable!("tried to update shared {shared:?} with {val:?}"),
        }
    }

    fn store_parsed(&self, value: &str) -> Result<(), anyhow::Error> {
        let parsed = match self {
            SharedConfigValue::Bool(_) => {
                let value = value.to_ascii_lowercase();
                let val = match value.as_str() {
                    "true" | "yes" | "on" | "1" => true,
                    "false" | "no" | "off" | "0" => false,
                    other => anyhow::bail!("'{other}' is not a boolean"),
                };
                DynConfigValue::Bool(val)
            }
            SharedConfigValue::U64(_) => DynConfigValue::U64(value.parse()?),
            SharedConfigValue::String(_) => DynConfigValue::String(CompactString::new(value)),
        };
        self.store(parsed);
        Ok(())
    }
}

impl fmt::Display for SharedConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharedConfigValue::Bool(val) => write!(f, "{}", val.load(Ordering::SeqCst)),
            SharedConfigValue::U64(val) => write!(f, "{}", val.load(Ordering::SeqCst)),
            SharedConfigValue::String(val) => {
                let read_lock = val.read().expect("SharedConfigValue::String lock poisoned");
                write!(f, "{}", *read_lock)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use super::*;

    pub static TEST_CONFIG_A: Config<bool> =
        Config::new("test_config_a", "A test configuration value.", true);
    pub static TEST_CONFIG_B: Config<&'static str> =
        Config::new("test_config_b", "A test configuration value.", "foobar");
    pub static TEST_CONFIG_C: Config<u64> =
        Config::new("test_config_c", "A test configuration value.", 1);

    fn test_set() -> ConfigSet {
        let mut config_set = ConfigSet::builder();
        config_set
            .register(&TEST_CONFIG_A)
            .register(&TEST_CONFIG_B)
            .register(&TEST_CONFIG_C);
        config_set.build()
    }

    #[test]
    fn smoketest_read() {
        let config_set = test_set();

        assert!(TEST_CONFIG_A.read(&config_set));
        assert_eq!(TEST_CONFIG_B.read(&config_set), "foobar");
        assert_eq!(TEST_CONFIG_C.read(&config_set), 1);
    }

    #[test]
    fn smoketest_update_is_shared() {
        let config_set = test_set();
        let config_set_2 = config_set.clone();

        config_set.update(&TEST_CONFIG_A, false);
        assert!(!TEST_CONFIG_A.read(&config_set_2));

        config_set.update(&TEST_CONFIG_B, "hello world!");
        assert_eq!(TEST_CONFIG_B.read(&config_set_2), "hello world!");
    }

    #[test]
    fn smoketest_parse() {
        let config_set = test_set();

        config_set.try_update("test_config_a", "no").unwrap();
        assert!(!TEST_CONFIG_A.read(&config_set));

        config_set.try_assign("test_config_c = 8").unwrap();
        assert_eq!(TEST_CONFIG_C.read(&config_set), 8);

        config_set.try_update("test_config_b", "anotha one").unwrap();
        assert_eq!(TEST_CONFIG_B.read(&config_set), "anotha one");
    }

    #[test]
    fn smoketest_parse_errors() {
        let config_set = test_set();

        assert!(config_set.try_update("not_a_config", "1").is_err());
        assert!(config_set.try_update("test_config_a", "maybe").is_err());
        assert!(config_set.try_update("test_config_c", "-3").is_err());
        assert!(config_set.try_assign("test_config_c").is_err());

        // Failed updates leave the previous value in place.
        assert_eq!(TEST_CONFIG_C.read(&config_set), 1);
    }

    #[test]
    fn smoketest_env_overrides() {
        let config_set = test_set();
        let env = BTreeMap::from([
            ("TG_TEST_CONFIG_A".to_string(), "false".to_string()),
            ("TG_TEST_CONFIG_C".to_string(), "4".to_string()),
        ]);

        config_set
            .apply_env_with(|var| env.get(var).cloned())
            .unwrap();
        assert!(!TEST_CONFIG_A.read(&config_set));
        assert_eq!(TEST_CONFIG_B.read(&config_set), "foobar");
        assert_eq!(TEST_CONFIG_C.read(&config_set), 4);

        let bad = BTreeMap::from([("TG_TEST_CONFIG_C".to_string(), "lots".to_string())]);
        let err = config_set
            .apply_env_with(|var| bad.get(var).cloned())
            .unwrap_err();
        assert!(format!("{err:#}").contains("TG_TEST_CONFIG_C"));
    }

    #[test]
    fn smoketest_display() {
        let config_set = test_set();
        let rendered = config_set.to_string();
        assert!(rendered.contains("test_config_b => foobar"));
        assert_eq!(config_set.entries().count(), 3);
    }
}
