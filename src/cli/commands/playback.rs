use clap::{Arg, ArgMatches, Command};

pub const ARG_PLAYBACK_POLL: &str = "playback-poll-seconds";
pub const ARG_PLAYBACK_BATCH: &str = "playback-batch-size";
pub const ARG_PLAYBACK_MAX_ATTEMPTS: &str = "playback-max-attempts";
pub const ARG_PLAYBACK_BACKOFF_BASE: &str = "playback-backoff-base-seconds";
pub const ARG_PLAYBACK_BACKOFF_MAX: &str = "playback-backoff-max-seconds";

/// Tuning for the playback-event queue worker.
#[derive(Debug, Clone)]
pub struct Options {
    pub poll_seconds: u64,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_base_seconds: u64,
    pub backoff_max_seconds: u64,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            poll_seconds: matches
                .get_one::<u64>(ARG_PLAYBACK_POLL)
                .copied()
                .unwrap_or(5),
            batch_size: matches
                .get_one::<usize>(ARG_PLAYBACK_BATCH)
                .copied()
                .unwrap_or(50),
            max_attempts: matches
                .get_one::<u32>(ARG_PLAYBACK_MAX_ATTEMPTS)
                .copied()
                .unwrap_or(5),
            backoff_base_seconds: matches
                .get_one::<u64>(ARG_PLAYBACK_BACKOFF_BASE)
                .copied()
                .unwrap_or(5),
            backoff_max_seconds: matches
                .get_one::<u64>(ARG_PLAYBACK_BACKOFF_MAX)
                .copied()
                .unwrap_or(300),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PLAYBACK_POLL)
                .long(ARG_PLAYBACK_POLL)
                .help("Playback queue poll interval in seconds")
                .env("RESONA_PLAYBACK_POLL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_PLAYBACK_BATCH)
                .long(ARG_PLAYBACK_BATCH)
                .help("Playback queue batch size per poll")
                .env("RESONA_PLAYBACK_BATCH_SIZE")
                .default_value("50")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_PLAYBACK_MAX_ATTEMPTS)
                .long(ARG_PLAYBACK_MAX_ATTEMPTS)
                .help("Max attempts before marking a playback event as failed")
                .env("RESONA_PLAYBACK_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_PLAYBACK_BACKOFF_BASE)
                .long(ARG_PLAYBACK_BACKOFF_BASE)
                .help("Base delay for playback queue retry backoff")
                .env("RESONA_PLAYBACK_BACKOFF_BASE_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_PLAYBACK_BACKOFF_MAX)
                .long(ARG_PLAYBACK_BACKOFF_MAX)
                .help("Max delay for playback queue retry backoff")
                .env("RESONA_PLAYBACK_BACKOFF_MAX_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        temp_env::with_vars(
            [
                ("RESONA_PLAYBACK_POLL_SECONDS", None::<&str>),
                ("RESONA_PLAYBACK_BATCH_SIZE", None::<&str>),
            ],
            || {
                let command = with_args(Command::new("resona"));
                let matches = command.get_matches_from(vec!["resona"]);
                let options = Options::parse(&matches);
                assert_eq!(options.poll_seconds, 5);
                assert_eq!(options.batch_size, 50);
                assert_eq!(options.max_attempts, 5);
                assert_eq!(options.backoff_base_seconds, 5);
                assert_eq!(options.backoff_max_seconds, 300);
            },
        );
    }

    #[test]
    fn parse_overrides() {
        let command = with_args(Command::new("resona"));
        let matches = command.get_matches_from(vec![
            "resona",
            "--playback-poll-seconds",
            "1",
            "--playback-batch-size",
            "10",
            "--playback-max-attempts",
            "3",
        ]);
        let options = Options::parse(&matches);
        assert_eq!(options.poll_seconds, 1);
        assert_eq!(options.batch_size, 10);
        assert_eq!(options.max_attempts, 3);
    }
}
