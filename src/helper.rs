use std::{env, fs};
use std::path::Path;

/// Resolve a configuration override: the environment variable's value, or
/// the contents of the file it points to, or the given default.
pub fn env_or_default(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(env_var) => {
            if Path::new(&env_var).is_file() {
                fs::read_to_string(env_var)
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            } else {
                env_var
            }
        }
        Err(_) => default.to_string(),
    }
}
