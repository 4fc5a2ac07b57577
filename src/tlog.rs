use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

// `slog::Level::Info.as_usize()`
const DEFAULT_LOG_LEVEL: usize = 4;

static LOG_LEVEL: AtomicUsize = AtomicUsize::new(DEFAULT_LOG_LEVEL);

pub fn set_log_level(lvl: slog::Level) {
    LOG_LEVEL.store(lvl.as_usize(), Ordering::Relaxed);
}

#[inline]
pub fn log_level() -> slog::Level {
    level_from_usize(LOG_LEVEL.load(Ordering::Relaxed))
}

fn level_from_usize(lvl: usize) -> slog::Level {
    slog::Level::from_usize(lvl).unwrap_or(slog::Level::Info)
}

pub struct Drain;

pub fn root() -> slog::Logger {
    slog::Logger::root(Drain, slog::o!())
}

#[macro_export]
macro_rules! tlog {
    ($lvl:ident, $($args:tt)*) => {{
        let logger = $crate::tlog::root();
        slog::slog_log!(logger, slog::Level::$lvl, "", $($args)*);
    }}
}

impl slog::Drain for Drain {
    type Ok = ();
    type Err = slog::Never;
    fn log(
        &self,
        record: &slog::Record,
        values: &slog::OwnedKVList,
    ) -> Result<Self::Ok, Self::Err> {
        // Max level is constant = trace
        // It's hardcoded in Cargo.toml dependency features
        // In runtime it's managed by `set_log_level`
        if !record.level().is_at_least(log_level()) {
            return Ok(());
        }

        let mut s = StrSerializer {
            str: format!("{}: {}", record.level().as_short_str(), record.msg()),
        };

        use slog::KV;
        // StrSerializer never fails, the results are ignored on purpose
        let _ = record.kv().serialize(record, &mut s);
        let _ = values.serialize(record, &mut s);

        // Nowhere to report a failed write to stderr
        let _ = writeln!(
            std::io::stderr().lock(),
            "{} [{}:{}]",
            s.str,
            record.file(),
            record.line()
        );
        Ok(())
    }
}

struct StrSerializer {
    pub str: String,
}

impl slog::Serializer for StrSerializer {
    fn emit_arguments(&mut self, key: slog::Key, val: &std::fmt::Arguments) -> slog::Result {
        use std::fmt::Write;
        write!(&mut self.str, ", {key}: {val}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::Serializer;

    #[test]
    fn serializer_appends_key_values() {
        let mut s = StrSerializer {
            str: "substituted ordering expressions".into(),
        };
        s.emit_arguments("phase", &format_args!("{}", "aggregation"))
            .unwrap();
        s.emit_arguments("changed", &format_args!("{}", 2)).unwrap();

        assert_eq!(
            s.str,
            "substituted ordering expressions, phase: aggregation, changed: 2"
        );
    }

    #[test]
    fn default_level_is_info() {
        assert_eq!(
            slog::Level::from_usize(DEFAULT_LOG_LEVEL),
            Some(slog::Level::Info)
        );
    }

    #[test]
    fn stored_level_converts_back() {
        for lvl in [slog::Level::Critical, slog::Level::Warning, slog::Level::Trace] {
            assert_eq!(level_from_usize(lvl.as_usize()), lvl);
        }
        assert_eq!(level_from_usize(0), slog::Level::Info);
        assert_eq!(level_from_usize(42), slog::Level::Info);
    }

    #[test]
    fn setting_current_level_keeps_it() {
        // Other tests log concurrently, so the global level is only
        // rewritten with the value it already has.
        let current = log_level();
        set_log_level(current);
        assert_eq!(log_level(), current);
    }
}
