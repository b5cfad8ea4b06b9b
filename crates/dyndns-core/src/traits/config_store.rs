// # Config Store Trait
//
// Read-only view of the option store the scheduler pulls its update
// target from.
//
// Values are handed out as owned copies: callers are free to normalize
// them (e.g. lower-casing the domain into a zone name) without touching
// the store's own data.

use crate::config::DynDnsOption;

/// Trait for configuration store implementations
pub trait ConfigStore: Send + Sync {
    /// Get a string option, `None` when absent
    fn get_string(&self, option: DynDnsOption) -> Option<String>;

    /// Get an integer option, `None` when absent or not an integer
    fn get_int(&self, option: DynDnsOption) -> Option<i64>;

    /// Get a boolean option, `None` when absent or not a boolean
    ///
    /// The default implementation accepts the usual spellings of string
    /// values and treats non-zero integers as true.
    fn get_bool(&self, option: DynDnsOption) -> Option<bool> {
        if let Some(value) = self.get_string(option) {
            return match value.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            };
        }
        self.get_int(option).map(|v| v != 0)
    }
}
