//! Single interface for registering all of the [`Config`]s for the generator.

use tg_cfg::{Config, ConfigSet, ConfigSetBuilder};

pub static MANIFEST_FILENAME: Config<&'static str> = Config::new(
    "manifest_filename",
    "The filename of the optional per-project manifest.",
    "ThriftGen.toml",
);

pub static IDL_SUFFIX: Config<&'static str> = Config::new(
    "idl_suffix",
    "File extension of IDL files, matched case-insensitively.",
    "thrift",
);

pub static TOLERATE_MISSING_IDL_ROOT: Config<bool> = Config::new(
    "tolerate_missing_idl_root",
    "Treat a missing or unreadable IDL folder as containing no IDL files.",
    true,
);

pub static CONCURRENCY: Config<u64> = Config::new(
    "concurrency",
    "Number of thrift compiler processes to run at once within a pass.",
    1,
);

pub static FAIL_FAST: Config<bool> = Config::new(
    "fail_fast",
    "Stop a pass at the first failed IDL file instead of collecting every failure.",
    true,
);

pub static TIMEOUT_MS: Config<u64> = Config::new(
    "timeout_ms",
    "Milliseconds a single compiler process may run before it is terminated, 0 for no limit.",
    0,
);

pub static KILL_GRACE_MS: Config<u64> = Config::new(
    "kill_grace_ms",
    "Milliseconds to wait after asking a compiler process to terminate before killing it.",
    5_000,
);

/// Register every [`Config`] the generator reads.
pub fn all_cfgs(builder: &mut ConfigSetBuilder) {
    builder
        .register(&MANIFEST_FILENAME)
        .register(&IDL_SUFFIX)
        .register(&TOLERATE_MISSING_IDL_ROOT)
        .register(&CONCURRENCY)
        .register(&FAIL_FAST)
        .register(&TIMEOUT_MS)
        .register(&KILL_GRACE_MS);
}

/// A [`ConfigSet`] with every config at its default value.
pub fn default_set() -> ConfigSet {
    let mut builder = ConfigSet::builder();
    all_cfgs(&mut builder);
    builder.build()
}
