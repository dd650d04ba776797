//! The Logger collaborator contract (§6): leveled logging with key/value
//! context, decoupled from any particular backend.

/// A leveled logger taking a message plus `(key, value)` context pairs.
pub trait Logger: Send + Sync {
    fn debug(&self, msg: &str, kv: &[(&str, &str)]);
    fn info(&self, msg: &str, kv: &[(&str, &str)]);
    fn warn(&self, msg: &str, kv: &[(&str, &str)]);
    fn error(&self, msg: &str, kv: &[(&str, &str)]);
}

fn format_kv(msg: &str, kv: &[(&str, &str)]) -> String {
    if kv.is_empty() {
        return msg.to_string();
    }
    let mut out = String::from(msg);
    for (k, v) in kv {
        out.push_str(&format!(" {k}={v}"));
    }
    out
}

/// Forwards to the `log` crate's leveled macros — the teacher crate's own
/// logging dependency, activated here rather than introduced.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacadeLogger;

impl Logger for LogFacadeLogger {
    fn debug(&self, msg: &str, kv: &[(&str, &str)]) {
        log::debug!("{}", format_kv(msg, kv));
    }

    fn info(&self, msg: &str, kv: &[(&str, &str)]) {
        log::info!("{}", format_kv(msg, kv));
    }

    fn warn(&self, msg: &str, kv: &[(&str, &str)]) {
        log::warn!("{}", format_kv(msg, kv));
    }

    fn error(&self, msg: &str, kv: &[(&str, &str)]) {
        log::error!("{}", format_kv(msg, kv));
    }
}
