use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tour-booking", version, about = "Tour catalog and booking server")]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run migrations and start the HTTP server (default).
    Serve,
    /// Apply database migrations and exit.
    Migrate,
    /// Create an administrator account.
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long, env = "TOUR_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
}

impl Cli {
    /// Splits the arguments into the config path and the command to run.
    pub fn into_parts(self) -> (PathBuf, Command) {
        (self.config, self.command.unwrap_or(Command::Serve))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["tour-booking", "--config", "prod.yaml"]).unwrap();
        let (config, command) = cli.into_parts();
        assert_eq!(config, PathBuf::from("prod.yaml"));
        assert!(matches!(command, Command::Serve));
    }

    #[test]
    fn create_admin_takes_credentials() {
        let cli = Cli::try_parse_from([
            "tour-booking",
            "create-admin",
            "--username",
            "owner",
            "--password",
            "s3cret-pass",
        ])
        .unwrap();

        match cli.into_parts().1 {
            Command::CreateAdmin {
                username,
                password,
                email,
            } => {
                assert_eq!(username, "owner");
                assert_eq!(password, "s3cret-pass");
                assert!(email.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn clap_definition_is_consistent() {
        use clap::CommandFactory;
        <Cli as CommandFactory>::command().debug_assert();
    }
}
