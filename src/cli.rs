//! Command line interface for the `mqframe` demo binary.

use std::path::PathBuf;

use clap::Parser;

/// Runs a deposit service and client over in-memory queues.
#[derive(Debug, Parser)]
#[command(name = "mqframe", version, about = "Synchronous messaging demo over in-memory queues")]
pub struct Cli {
    /// TOML settings file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the number of server workers.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Number of deposits to send.
    #[arg(short, long, default_value_t = 3)]
    pub deposits: u32,

    /// Amount of each deposit.
    #[arg(short, long, default_value_t = 100)]
    pub amount: u64,

    /// Lose the first reply so the client has to resend.
    #[arg(long)]
    pub drop_first_reply: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn parses_defaults() {
        let cli = Cli::parse_from(["mqframe"]);
        assert_eq!(cli.deposits, 3);
        assert_eq!(cli.amount, 100);
        assert!(!cli.drop_first_reply);
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::parse_from(["mqframe", "-w", "4", "--drop-first-reply", "-c", "mq.toml"]);
        assert_eq!(cli.workers, Some(4));
        assert!(cli.drop_first_reply);
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("mq.toml")));
    }
}
