//! Configuration access port trait.

/// Raw `[section] key` lookup. Typed parsing and validation live in
/// [`crate::domain::config_validation`] so malformed values are reported
/// instead of silently replaced by defaults.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
}
