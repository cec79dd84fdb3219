//! Bootstrap utilities for the mongo-provision binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the PROVISION_LOG environment variable.
///
/// Defaults to "info" level if PROVISION_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Command-line arguments the binary does not accept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgsError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("Unknown argument: {0}")]
    UnknownArgument(String),
}

/// Config file path from `--config <path>`, `--config=<path>` or `-c <path>`.
///
/// `args` excludes the program name. Any other argument is an error.
pub fn parse_config_path<I>(args: I) -> Result<Option<String>, ArgsError>
where
    I: IntoIterator<Item = String>,
{
    let mut path = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let value = if arg == "--config" || arg == "-c" {
            args.next()
                .filter(|v| !v.is_empty() && !v.starts_with('-'))
                .ok_or_else(|| ArgsError::MissingValue(arg.clone()))?
        } else if let Some(value) = arg.strip_prefix("--config=") {
            if value.is_empty() {
                return Err(ArgsError::MissingValue("--config".to_string()));
            }
            value.to_string()
        } else {
            return Err(ArgsError::UnknownArgument(arg));
        };
        path = Some(value);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_config_path() {
        assert_eq!(
            parse_config_path(args(&["--config", "a.yaml"])),
            Ok(Some("a.yaml".to_string()))
        );
        assert_eq!(
            parse_config_path(args(&["--config=b.yaml"])),
            Ok(Some("b.yaml".to_string()))
        );
        assert_eq!(
            parse_config_path(args(&["-c", "c.yaml"])),
            Ok(Some("c.yaml".to_string()))
        );
        assert_eq!(parse_config_path(args(&[])), Ok(None));
    }

    #[test]
    fn test_parse_config_path_rejects_missing_value() {
        assert_eq!(
            parse_config_path(args(&["--config"])),
            Err(ArgsError::MissingValue("--config".to_string()))
        );
        assert_eq!(
            parse_config_path(args(&["--config="])),
            Err(ArgsError::MissingValue("--config".to_string()))
        );
        assert_eq!(
            parse_config_path(args(&["-c", "--config=a.yaml"])),
            Err(ArgsError::MissingValue("-c".to_string()))
        );
    }

    #[test]
    fn test_parse_config_path_rejects_unknown_arguments() {
        assert_eq!(
            parse_config_path(args(&["--confg", "prod.yaml"])),
            Err(ArgsError::UnknownArgument("--confg".to_string()))
        );
        assert_eq!(
            parse_config_path(args(&["--config", "a.yaml", "extra"])),
            Err(ArgsError::UnknownArgument("extra".to_string()))
        );
    }
}
