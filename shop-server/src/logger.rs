//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise `shop_server=<level>,security=info,tower_http=info`.

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Default filter directives for `level`
pub fn default_directives(level: &str) -> String {
    format!("shop_server={level},security=info,tower_http=info")
}

/// Initialize the global subscriber, writing to a daily rolling file when `log_dir` exists
pub fn init_logger(log_level: &str, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false);

    if let Some(dir) = log_dir
        && dir.is_dir()
    {
        let file_appender = tracing_appender::rolling::daily(dir, "shop-server");
        subscriber.with_ansi(false).with_writer(file_appender).init();
        return;
    }

    subscriber.init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_parse() {
        let directives = default_directives("debug");
        assert_eq!(directives, "shop_server=debug,security=info,tower_http=info");
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
