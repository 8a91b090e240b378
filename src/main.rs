use crate::config::{Config, ConfigError};

mod config;

fn main() -> Result<(), ConfigError>
{
    Config::new().execute()
}
