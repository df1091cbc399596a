//! [`Args`] definitions.

use clap::{Parser, Subcommand};

/// Server of the staff roster and compliance system.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    /// Maintenance command to run instead of serving the API.
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Args {
    /// Parses command line arguments.
    ///
    /// # Errors
    ///
    /// Errors if failed to parse command line arguments.
    pub fn parse() -> Result<Self, clap::Error> {
        <Self as Parser>::try_parse()
    }
}

/// Maintenance command.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Creates a new administrator account and exits.
    CreateAdmin {
        /// Username of the new administrator.
        #[arg(short, long)]
        username: String,

        /// Password of the new administrator.
        #[arg(short, long, env = "ROSTER_ADMIN_PASSWORD")]
        password: String,
    },
}

#[cfg(test)]
mod spec {
    use clap::Parser as _;

    use super::{Args, Command};

    #[test]
    fn serves_by_default() {
        let args = Args::try_parse_from(["roster-server"]).unwrap();

        assert_eq!(args.config, "config.toml");
        assert!(args.command.is_none());
    }

    #[test]
    fn parses_create_admin() {
        let args = Args::try_parse_from([
            "roster-server",
            "--config",
            "prod.toml",
            "create-admin",
            "--username",
            "root",
            "--password",
            "s3cret",
        ])
        .unwrap();

        assert_eq!(args.config, "prod.toml");
        assert!(matches!(
            args.command,
            Some(Command::CreateAdmin { username, password })
                if username == "root" && password == "s3cret",
        ));
    }
}
