//! Nice kpsym output formatting.

use std::fmt;

use log;

const KPSYM_BANNER_LENGTH: usize = 103;

/// Logs a warning to the `kpsym-output` logger as well as to the default logger.
macro_rules! kpsym_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::warn!($fmt, $($($arg)*)?);
        log::warn!(target: "kpsym-output", $fmt, $($($arg)*)?);
    }
}

/// Logs a main output line to the `kpsym-output` logger.
macro_rules! kpsym_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "kpsym-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {kpsym_output, kpsym_warn};

/// Writes a nicely formatted subtitle.
pub(crate) fn write_subtitle(f: &mut fmt::Formatter<'_>, subtitle: &str) -> fmt::Result {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    writeln!(f, "{subtitle}")?;
    writeln!(f, "{bar}")?;
    Ok(())
}

/// Logs a nicely formatted section title to the `kpsym-output` logger.
pub(crate) fn log_title(title: &str) {
    let length = title.chars().count().max(KPSYM_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    kpsym_output!("┌──{bar}──┐");
    kpsym_output!("│§ {title:^length$} §│");
    kpsym_output!("└──{bar}──┘");
}

/// Logs a nicely formatted subtitle to the `kpsym-output` logger.
pub(crate) fn log_subtitle(subtitle: &str) {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    kpsym_output!("{}", subtitle);
    kpsym_output!("{}", bar);
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging `kpsym` outputs nicely.
pub(crate) trait KpsymOutput: fmt::Debug + fmt::Display {
    /// Logs display output nicely.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            kpsym_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> KpsymOutput for T where T: fmt::Debug + fmt::Display {}
