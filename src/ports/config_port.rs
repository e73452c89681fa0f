//! Configuration access port trait.

/// Raw string access. Parsing and range checks live in `config_validation`,
/// so a malformed value is reported instead of replaced by a default.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Keys present in `section`, sorted. Empty when the section is absent.
    fn keys(&self, section: &str) -> Vec<String>;
}
