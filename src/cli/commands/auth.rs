use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl-seconds";
pub const ARG_OTP_TTL: &str = "otp-ttl-seconds";
pub const ARG_OTP_COOLDOWN: &str = "otp-cooldown-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub frontend_base_url: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub otp_ttl_seconds: u64,
    pub otp_cooldown_seconds: u64,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .map(SecretString::from);
        let Some(jwt_secret) = jwt_secret else {
            anyhow::bail!("missing required argument: --{ARG_JWT_SECRET}");
        };

        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .unwrap_or_else(|| "http://localhost:5173".to_string());

        Ok(Self {
            jwt_secret,
            frontend_base_url,
            access_token_ttl_seconds: matches
                .get_one::<i64>(ARG_ACCESS_TOKEN_TTL)
                .copied()
                .unwrap_or(900),
            refresh_token_ttl_seconds: matches
                .get_one::<i64>(ARG_REFRESH_TOKEN_TTL)
                .copied()
                .unwrap_or(604_800),
            otp_ttl_seconds: matches.get_one::<u64>(ARG_OTP_TTL).copied().unwrap_or(600),
            otp_cooldown_seconds: matches
                .get_one::<u64>(ARG_OTP_COOLDOWN)
                .copied()
                .unwrap_or(30),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign access tokens (HS256)")
                .env("RESONA_JWT_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL, used for CORS and the cookie Secure flag")
                .env("RESONA_FRONTEND_BASE_URL")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token TTL in seconds")
                .env("RESONA_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token TTL in seconds")
                .env("RESONA_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_OTP_TTL)
                .long(ARG_OTP_TTL)
                .help("One-time code TTL in seconds")
                .env("RESONA_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OTP_COOLDOWN)
                .long(ARG_OTP_COOLDOWN)
                .help("Cooldown before reissuing a one-time code")
                .env("RESONA_OTP_COOLDOWN_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn matches(args: Vec<&str>) -> ArgMatches {
        let command = Command::new("resona");
        let command = with_args(command);
        command.get_matches_from(args)
    }

    #[test]
    fn parse_defaults() {
        temp_env::with_vars(
            [
                ("RESONA_JWT_SECRET", None::<&str>),
                ("RESONA_FRONTEND_BASE_URL", None::<&str>),
            ],
            || {
                let matches = matches(vec!["resona", "--jwt-secret", "sekret"]);
                let options = Options::parse(&matches).expect("options");
                assert_eq!(options.jwt_secret.expose_secret(), "sekret");
                assert_eq!(options.frontend_base_url, "http://localhost:5173");
                assert_eq!(options.access_token_ttl_seconds, 900);
                assert_eq!(options.refresh_token_ttl_seconds, 604_800);
                assert_eq!(options.otp_ttl_seconds, 600);
                assert_eq!(options.otp_cooldown_seconds, 30);
            },
        );
    }

    #[test]
    fn parse_requires_secret() {
        temp_env::with_vars([("RESONA_JWT_SECRET", None::<&str>)], || {
            let command = Command::new("resona");
            let command = with_args(command);
            let result = command.try_get_matches_from(vec!["resona"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn parse_rejects_blank_secret() {
        temp_env::with_vars([("RESONA_JWT_SECRET", Some("  "))], || {
            let matches = matches(vec!["resona"]);
            assert!(Options::parse(&matches).is_err());
        });
    }
}
