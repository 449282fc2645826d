use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Evaluates to the `Ok` value of `$expr`, or logs its error as a warning and evaluates to
/// `()`.
#[macro_export]
macro_rules! with_warn {
    ($expr: expr) => ($crate::with_warn!("{}", $expr));
    ($fmt: tt, $expr: expr) => (match $expr {
        Ok(v) => v,
        Err(e) => ::log::warn!($fmt, e),
    });
}

pub struct SimpleLogger {
    level: LevelFilter,
}

impl SimpleLogger {
    pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(SimpleLogger { level }))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] [{}] {}", record.target(), record.level(), record.args());
        }
    }

    fn flush(&self) {}
}
