use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dorafetch")]
#[command(author, version, about = "Telegram bot that downloads videos and audio from links", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot
    Run {
        /// Use webhook mode instead of long polling (needs WEBHOOK_URL)
        #[arg(long)]
        webhook: bool,
    },

    /// Delete stale artifacts from the download folder once and exit
    Sweep {
        /// Override the maximum artifact age in seconds
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
