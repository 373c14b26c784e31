use std::io::Write;

/// Initialize process-wide logging.
///
/// Levels come from RUST_LOG, defaulting to info. Safe to call more
/// than once (subsequent calls are no-ops), which keeps test setups
/// simple.
pub fn setup_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} [{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
}
