//! Terminal output utilities: styled messages, tables, and prompts. Honors
//! `NO_COLOR` and falls back to ASCII icons outside a UTF-8 locale.

pub mod prompt;
pub mod table;

use std::io::{IsTerminal, stderr, stdout};
use std::sync::atomic::{AtomicBool, Ordering};

static COLOR_ENABLED: AtomicBool = AtomicBool::new(true);
static UNICODE_ENABLED: AtomicBool = AtomicBool::new(true);

static IS_TTY: std::sync::LazyLock<bool> =
    std::sync::LazyLock::new(|| stdout().is_terminal() && stderr().is_terminal());

static NO_COLOR: std::sync::LazyLock<bool> =
    std::sync::LazyLock::new(|| std::env::var("NO_COLOR").is_ok());

/// One of the four message icons, with a Unicode and an ASCII rendering.
#[derive(Debug, Clone, Copy)]
pub enum Icon {
    Success,
    Warning,
    Error,
    Info,
}

impl Icon {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "✓",
            Self::Warning => "⚠",
            Self::Error => "✗",
            Self::Info => "ℹ",
        }
    }

    const fn ascii(self) -> &'static str {
        match self {
            Self::Success => "[ok]",
            Self::Warning => "[warn]",
            Self::Error => "[err]",
            Self::Info => "[info]",
        }
    }

    fn render(self) -> &'static str {
        if unicode_enabled() { self.as_str() } else { self.ascii() }
    }
}

/// Initializes color/Unicode detection from `--verbose`'s inverse (quiet)
/// and the environment. Called once at CLI startup.
pub fn init(force_ansi: Option<bool>, quiet: bool) {
    let colors = match force_ansi {
        Some(v) => v,
        None => *IS_TTY && !*NO_COLOR,
    };
    COLOR_ENABLED.store(colors, Ordering::Relaxed);

    let unicode = std::env::var("LANG")
        .or_else(|_| std::env::var("LC_ALL"))
        .map(|l| l.to_uppercase().contains("UTF"))
        .unwrap_or(cfg!(not(windows)));
    UNICODE_ENABLED.store(unicode && !quiet, Ordering::Relaxed);
}

#[must_use]
pub fn colors_enabled() -> bool {
    COLOR_ENABLED.load(Ordering::Relaxed)
}

#[must_use]
pub fn unicode_enabled() -> bool {
    UNICODE_ENABLED.load(Ordering::Relaxed)
}

pub fn success(text: &str) {
    use owo_colors::OwoColorize;
    let icon = Icon::Success.render();
    if colors_enabled() {
        println!("{} {text}", icon.green());
    } else {
        println!("{icon} {text}");
    }
}

pub fn warning(text: &str) {
    use owo_colors::OwoColorize;
    let icon = Icon::Warning.render();
    if colors_enabled() {
        eprintln!("{} {}", icon.yellow(), text.yellow());
    } else {
        eprintln!("{icon} {text}");
    }
}

pub fn error(text: &str) {
    use owo_colors::OwoColorize;
    let icon = Icon::Error.render();
    if colors_enabled() {
        eprintln!("{} {}", icon.red(), text.red());
    } else {
        eprintln!("{icon} {text}");
    }
}

pub fn info(text: &str) {
    use owo_colors::OwoColorize;
    let icon = Icon::Info.render();
    if colors_enabled() {
        println!("{} {text}", icon.blue());
    } else {
        println!("{icon} {text}");
    }
}

pub fn package(name: &str, version: Option<&str>) {
    use owo_colors::OwoColorize;
    if colors_enabled() {
        match version {
            Some(v) => println!("  {} {}", name.green(), v.yellow()),
            None => println!("  {}", name.green()),
        }
    } else {
        match version {
            Some(v) => println!("  {name} {v}"),
            None => println!("  {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_falls_back_to_ascii_without_unicode() {
        UNICODE_ENABLED.store(false, Ordering::Relaxed);
        assert_eq!(Icon::Success.render(), "[ok]");
        UNICODE_ENABLED.store(true, Ordering::Relaxed);
    }
}
