//! Tracing setup and logging helpers.
//!
//! The library only emits events. Installing a subscriber is the host
//! application's call; `sense-cli` does it through
//! [`init_journald_or_stdout`]. Without one, the library stays silent.
//!
//! Modules use `crate::tracing::prelude::*` for the `trace!()`, `debug!()`,
//! `info!()`, `warn!()`, and `error!()` macros.

use std::env;
use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

use prelude::*;

/// Install the `sense-cli` subscriber.
///
/// Services started by systemd have `JOURNAL_STREAM` set and log to the
/// journal. Everything else, or a journal that cannot be opened, gets
/// formatted lines on stdout.
pub fn init_journald_or_stdout() {
    let under_systemd = env::var_os("JOURNAL_STREAM").is_some();
    match under_systemd.then(tracing_journald::layer) {
        Some(Ok(journald)) => tracing_subscriber::registry().with(journald).init(),
        Some(Err(e)) => {
            init_stdout();
            warn!(error = %e, "Journald unavailable, logging to stdout.");
        }
        None => init_stdout(),
    }
}

// RUST_LOG picks the verbosity; info when unset or unparsable.
fn init_stdout() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();
    let lines = tracing_subscriber::fmt::layer().with_timer(LocalTimer);

    tracing_subscriber::registry().with(filter).with(lines).init();
}

// Wall-clock HH:MM:SS in the local offset, UTC if that is unknown.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or(OffsetDateTime::now_utc());
        let formatted = now
            .format(time::macros::format_description!("[hour]:[minute]:[second]"))
            .map_err(|_| std::fmt::Error)?;
        write!(w, "{formatted}")
    }
}

/// Mask an email address for logging.
///
/// Keeps the first two characters of the local part and its last one, so
/// `testuser@example.com` becomes `te*****r@example.com`. Input without an
/// `@` is returned as-is.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_string();
    };

    let chars: Vec<char> = local.chars().collect();
    let masked: String = chars
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i >= 2 && i + 1 < chars.len() {
                '*'
            } else {
                *c
            }
        })
        .collect();

    format!("{masked}@{domain}")
}
