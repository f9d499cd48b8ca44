use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";

/// Google sign-in credentials. Both are optional; without them the
/// `/v1/auth/google` route answers 503.
#[derive(Debug, Clone)]
pub struct Options {
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        Self {
            client_id: get_non_empty(ARG_GOOGLE_CLIENT_ID),
            client_secret: get_non_empty(ARG_GOOGLE_CLIENT_SECRET).map(SecretString::from),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("OAuth client id for Google sign-in")
                .env("RESONA_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_SECRET)
                .long(ARG_GOOGLE_CLIENT_SECRET)
                .help("OAuth client secret for Google sign-in")
                .env("RESONA_GOOGLE_CLIENT_SECRET"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_absent_credentials() {
        temp_env::with_vars(
            [
                ("RESONA_GOOGLE_CLIENT_ID", None::<&str>),
                ("RESONA_GOOGLE_CLIENT_SECRET", None::<&str>),
            ],
            || {
                let command = with_args(Command::new("resona"));
                let matches = command.get_matches_from(vec!["resona"]);
                let options = Options::parse(&matches);
                assert!(options.client_id.is_none());
                assert!(options.client_secret.is_none());
            },
        );
    }

    #[test]
    fn parse_blank_env_treated_as_absent() {
        temp_env::with_vars([("RESONA_GOOGLE_CLIENT_ID", Some(""))], || {
            let command = with_args(Command::new("resona"));
            let matches = command.get_matches_from(vec!["resona"]);
            let options = Options::parse(&matches);
            assert!(options.client_id.is_none());
        });
    }
}
