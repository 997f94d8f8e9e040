//! Utilities for reading environment variables.

use std::ffi::OsStr;

/// Returns true if the environment variable is set, and is _not_ one of the following:
/// `'0', '', 'no', 'false'`.
pub fn is_truthy<K: AsRef<OsStr>>(var: K) -> bool {
    let Some(value) = std::env::var_os(var) else {
        return false;
    };
    is_truthy_value(&value)
}

/// Returns true if `value` is _not_ one of the "falsey" strings `'0', '', 'no', 'false'`,
/// compared case-insensitively.
pub fn is_truthy_value(value: &OsStr) -> bool {
    static FALSEY: &[&str] = &["0", "", "no", "false"];

    let value = value.to_ascii_lowercase();
    !FALSEY.iter().any(|falsey| value == *falsey)
}

/// Name of the environment variable that overrides the setting `name`, e.g. `TG_` and
/// `fail_fast` become `TG_FAIL_FAST`.
pub fn override_var(prefix: &str, name: &str) -> String {
    let mut var = String::with_capacity(prefix.len() + name.len());
    var.push_str(prefix);
    var.extend(name.chars().map(|c| match c {
        '-' | '.' => '_',
        c => c.to_ascii_uppercase(),
    }));
    var
}
