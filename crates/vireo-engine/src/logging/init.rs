use std::io::Write;
use std::sync::Once;
use std::thread;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "vireo_engine::session=debug,vireo_engine::native=trace").
///
/// `write_style` controls ANSI coloring behavior.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,

    /// Level used when neither `env_filter` nor `RUST_LOG` is set.
    pub default_level: log::LevelFilter,

    /// Prefix each line with the emitting thread's name.
    pub thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            default_level: log::LevelFilter::Info,
            thread_names: true,
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// This function is idempotent; subsequent calls are ignored.
/// Intended usage is early in `main`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = &config.env_filter {
            builder.parse_filters(filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(config.default_level);
        }

        builder.write_style(config.write_style);

        // UI, render and pacer threads interleave; millisecond stamps and the
        // thread name keep handshakes readable.
        let thread_names = config.thread_names;
        builder.format(move |buf, record| {
            let ts = buf.timestamp_millis();
            if thread_names {
                let current = thread::current();
                writeln!(
                    buf,
                    "{ts} {:<5} [{}] {}: {}",
                    record.level(),
                    current.name().unwrap_or("?"),
                    record.target(),
                    record.args()
                )
            } else {
                writeln!(buf, "{ts} {:<5} {}: {}", record.level(), record.target(), record.args())
            }
        });

        // Another logger may already be installed (tests, embedding hosts).
        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized");
    });
}
