//! Verbosity-gated wrappers around `tracing`.
//!
//! `gateway_log!(level_setting, Info, field = value, "message")` emits the
//! event through the matching `tracing` macro only when the configured
//! [`LogLevel`](crate::config::LogLevel) allows it.

macro_rules! gateway_log {
    (@emit Error, $($arg:tt)+) => { ::tracing::error!($($arg)+) };
    (@emit Warning, $($arg:tt)+) => { ::tracing::warn!($($arg)+) };
    (@emit Info, $($arg:tt)+) => { ::tracing::info!($($arg)+) };
    (@emit Debug, $($arg:tt)+) => { ::tracing::debug!($($arg)+) };
    ($verbosity:expr, $level:ident, $($arg:tt)+) => {
        if $verbosity.allows($crate::config::LogLevel::$level) {
            gateway_log!(@emit $level, $($arg)+);
        }
    };
}
