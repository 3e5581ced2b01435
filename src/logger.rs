use log::LevelFilter;
use env_logger::Builder;
use std::io::Write;
use chrono::Local;

/// Timestamped logger. `RUST_LOG` overrides the default `info` level.
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let _ = Builder::new()
        .format(|buf, record| {
            writeln!(buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn repeated_init_is_harmless() {
        super::init();
        super::init();
        log::info!("still logging");
    }
}
