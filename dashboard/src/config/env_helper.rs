use std::str::FromStr;

use anyhow::{Context, Result};

/// Load and parse a required environment variable
///
/// # Errors
///
/// Returns an error when the variable is unset or does not parse as `T`
pub fn load_env_var<T: FromStr>(var_name: &str) -> Result<T> {
    let var = std::env::var(var_name).context(format!("{} is not set", var_name))?;
    var.parse::<T>()
        .map_err(|_| anyhow::anyhow!("{} has invalid value {}", var_name, var))
}

/// Load an environment variable, falling back to a default when it is unset
pub fn load_env_var_or<T: FromStr>(var_name: &str, default: T) -> Result<T> {
    match std::env::var(var_name) {
        Ok(var) => var
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} has invalid value {}", var_name, var)),
        Err(_) => Ok(default),
    }
}
