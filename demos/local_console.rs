use tracing::{debug, error, info, info_span, warn};
use tracing_logdriver::{init_logging_with_config, Level, LogFormat, LoggingConfig};

fn main() {
    let config = LoggingConfig {
        project_id: "demo-project".to_string(),
        level: Level::Debug,
        format: LogFormat::Local,
    };
    if let Err(e) = init_logging_with_config(config) {
        eprintln!("{e}");
        return;
    }

    debug!(cache = "warm", "starting service");
    let span = info_span!("request", method = "GET", path = "/cart");
    let _guard = span.enter();
    info!(items = 3, "cart loaded");
    warn!(latency_ms = 812, "slow upstream");
    error!(reason = "invalid password", user_id = 42, "authentication failed");
}
