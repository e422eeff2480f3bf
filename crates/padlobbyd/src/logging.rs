// Colorized wrappers for logging

use fern::Dispatch;

#[doc(hidden)]
#[inline(always)]
pub fn format_log(message: &str) -> String {
    let now = chrono::Local::now().format("%Y.%m.%d %H:%M:%S").to_string();
    format!("[{now}] {message}")
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {{
        let message = $crate::logging::format_log(&format!($($arg)*));
        ::log::error!("{}", ::colored::Colorize::bright_red(message.as_str()));
    }};
}

#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {{
        let message = $crate::logging::format_log(&format!($($arg)*));
        ::log::info!("{message}");
    }};
}

#[macro_export]
macro_rules! print_debug {
    ($($arg:tt)*) => {{
        let message = $crate::logging::format_log(&format!($($arg)*));
        ::log::debug!("{}", ::colored::Colorize::dimmed(message.as_str()));
    }};
}

#[macro_export]
macro_rules! print_warning {
    ($($arg:tt)*) => {{
        let message = $crate::logging::format_log(&format!($($arg)*));
        ::log::warn!("{}", ::colored::Colorize::bright_yellow(message.as_str()));
    }};
}

/// Setup the logger. Only the padlobby crates log above errors.
pub fn setup(verbose: bool, no_color: bool) -> Result<(), log::SetLoggerError> {
    let log_level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    Dispatch::new()
        .level(log::LevelFilter::Error)
        .level_for("padlobbyd", log_level)
        .level_for("padlobby_gamepad", log_level)
        .level_for("padlobby_workspace", log_level)
        .chain(std::io::stdout())
        .apply()?;

    if no_color {
        colored::control::set_override(false);
    }
    Ok(())
}
