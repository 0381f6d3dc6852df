use clap::{Parser, Subcommand};

use crate::tracing::{LogLevel, TracingFormat};

#[derive(Parser, Debug)]
#[command(name = "regprobe")]
#[command(about = "Best-effort, read-only container registry inspection")]
#[command(
    long_about = "Looks up what an image reference currently points at in its registry.\n\
                  Prints nothing and exits with status 1 when the answer is inconclusive."
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        env = "REGPROBE_USERNAME",
        default_value = "",
        hide_default_value = true,
        help = "Registry username, used for every host"
    )]
    pub username: String,

    #[arg(
        long,
        global = true,
        env = "REGPROBE_PASSWORD",
        default_value = "",
        hide_default_value = true,
        hide_env_values = true,
        help = "Registry password or token, used for every host"
    )]
    pub password: String,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub log_level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    #[command(about = "Print the image id (config digest) of a single-platform image")]
    ImageId {
        #[arg(help = "Image reference, e.g. nginx:1.25-alpine")]
        image: String,
    },
    #[command(about = "Print the per-platform manifest digests, one per line")]
    ManifestDigests {
        #[arg(help = "Image reference, e.g. nginx:1.25-alpine")]
        image: String,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREDENTIAL_VARS: [&str; 2] = ["REGPROBE_USERNAME", "REGPROBE_PASSWORD"];

    #[test]
    fn test_cli_default_values() {
        temp_env::with_vars_unset(CREDENTIAL_VARS, || {
            let cli = Cli::try_parse_from(["regprobe", "image-id", "alpine"]).unwrap();

            assert_eq!(cli.log_level, LogLevel::Warn);
            assert_eq!(cli.log_format, TracingFormat::Compact);
            assert_eq!(cli.username, "");
            assert_eq!(cli.password, "");
            assert_eq!(
                cli.command,
                Commands::ImageId {
                    image: "alpine".to_string()
                }
            );
        });
    }

    #[test]
    fn test_manifest_digests_with_global_flags() {
        temp_env::with_vars_unset(CREDENTIAL_VARS, || {
            let cli = Cli::try_parse_from([
                "regprobe",
                "manifest-digests",
                "ghcr.io/team/app:v1",
                "--username",
                "bot",
                "--password",
                "pw",
                "--log-level",
                "debug",
                "--log-format",
                "json",
            ])
            .unwrap();

            assert_eq!(cli.username, "bot");
            assert_eq!(cli.password, "pw");
            assert_eq!(cli.log_level, LogLevel::Debug);
            assert_eq!(cli.log_format, TracingFormat::Json);
            assert_eq!(
                cli.command,
                Commands::ManifestDigests {
                    image: "ghcr.io/team/app:v1".to_string()
                }
            );
        });
    }

    #[test]
    fn test_credentials_from_env() {
        temp_env::with_vars(
            [
                ("REGPROBE_USERNAME", Some("env-user")),
                ("REGPROBE_PASSWORD", Some("env-pass")),
            ],
            || {
                let cli = Cli::try_parse_from(["regprobe", "image-id", "alpine"]).unwrap();
                assert_eq!(cli.username, "env-user");
                assert_eq!(cli.password, "env-pass");
            },
        );
    }

    #[test]
    fn test_image_is_required() {
        assert!(Cli::try_parse_from(["regprobe", "image-id"]).is_err());
        assert!(Cli::try_parse_from(["regprobe"]).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        assert!(
            Cli::try_parse_from(["regprobe", "--log-level", "loud", "image-id", "alpine"]).is_err()
        );
    }
}
