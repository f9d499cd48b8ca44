use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_PAYMENT_BASE_URL: &str = "payment-base-url";
pub const ARG_PAYMENT_API_KEY: &str = "payment-api-key";
pub const ARG_PAYMENT_CALLBACK_URL: &str = "payment-callback-url";

/// Payment gateway wiring. Optional; without a base URL and key the billing
/// routes answer 503.
#[derive(Debug, Clone)]
pub struct Options {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub callback_url: Option<String>,
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
            base_url: get_non_empty(ARG_PAYMENT_BASE_URL),
            api_key: get_non_empty(ARG_PAYMENT_API_KEY).map(SecretString::from),
            callback_url: get_non_empty(ARG_PAYMENT_CALLBACK_URL),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PAYMENT_BASE_URL)
                .long(ARG_PAYMENT_BASE_URL)
                .help("Payment gateway base URL")
                .env("RESONA_PAYMENT_BASE_URL"),
        )
        .arg(
            Arg::new(ARG_PAYMENT_API_KEY)
                .long(ARG_PAYMENT_API_KEY)
                .help("API key sent to the payment gateway")
                .env("RESONA_PAYMENT_API_KEY"),
        )
        .arg(
            Arg::new(ARG_PAYMENT_CALLBACK_URL)
                .long(ARG_PAYMENT_CALLBACK_URL)
                .help("URL the gateway redirects to after checkout")
                .env("RESONA_PAYMENT_CALLBACK_URL"),
        )
}
