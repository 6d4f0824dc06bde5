// ----------------------------
// File: src/color.rs
// ----------------------------
//! ANSI color helpers for diagnostics and the verbose TAC dump. Color is
//! on by default on a capable terminal; `NO_COLOR`, a missing or dumb
//! `TERM`, or an explicit `set_enabled(false)` turn it off.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";
const BRIGHT_RED: &str = "\x1b[91m";

static ENABLED: OnceLock<AtomicBool> = OnceLock::new();

fn cell() -> &'static AtomicBool {
    ENABLED.get_or_init(|| AtomicBool::new(default_from_env()))
}

fn default_from_env() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    match env::var("TERM") {
        Ok(term) => !term.is_empty() && term != "dumb",
        Err(_) => false,
    }
}

pub fn set_enabled(enable: bool) {
    cell().store(enable, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    cell().load(Ordering::Relaxed)
}

fn colorize(code: &str, text: &str) -> String {
    if !is_enabled() {
        return text.to_string();
    }
    format!("{code}{text}{RESET}")
}

pub fn red(text: &str) -> String {
    colorize(RED, text)
}

pub fn bright_red(text: &str) -> String {
    colorize(BRIGHT_RED, text)
}

pub fn green(text: &str) -> String {
    colorize(GREEN, text)
}

pub fn yellow(text: &str) -> String {
    colorize(YELLOW, text)
}

pub fn blue(text: &str) -> String {
    colorize(BLUE, text)
}

pub fn cyan(text: &str) -> String {
    colorize(CYAN, text)
}

pub fn gray(text: &str) -> String {
    colorize(GRAY, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_color_passes_text_through() {
        set_enabled(false);
        assert_eq!(red("boom"), "boom");
        set_enabled(true);
        assert_eq!(red("boom"), "\x1b[31mboom\x1b[0m");
        set_enabled(false);
    }
}
