//! CLI argument parsing for the contact-import-worker binary.

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "contact-import-worker", about = "Bulk CSV contact import worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Print a signed access token for local testing
    IssueToken {
        /// User the token is issued for
        #[arg(long)]
        user_id: Uuid,
        #[arg(long)]
        email: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["contact-import-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["contact-import-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_serve_command_parses() {
        let cli = Cli::parse_from(["contact-import-worker", "serve"]);
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn test_cli_issue_token_parses_user_id() {
        let user_id = Uuid::new_v4();
        let cli = Cli::parse_from([
            "contact-import-worker",
            "issue-token",
            "--user-id",
            &user_id.to_string(),
        ]);
        match cli.command {
            Some(Command::IssueToken { user_id: parsed, email }) => {
                assert_eq!(parsed, user_id);
                assert!(email.is_none());
            }
            _ => panic!("expected issue-token"),
        }
    }

    #[test]
    fn test_cli_issue_token_rejects_bad_uuid() {
        assert!(Cli::try_parse_from(["contact-import-worker", "issue-token", "--user-id", "nope"]).is_err());
    }
}
