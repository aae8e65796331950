//! Step and summary output

use super::context::UiContext;
use console::style;

#[derive(Debug, Clone, Copy)]
enum Level {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Level {
    fn plain_tag(self) -> String {
        match self {
            Self::Ok => style("[OK]").green().to_string(),
            Self::Warn => style("[WARN]").yellow().to_string(),
            Self::Fail => style("[FAIL]").red().to_string(),
            Self::Info => style("[INFO]").cyan().to_string(),
        }
    }
}

fn emit(ctx: &UiContext, level: Level, message: String) {
    if ctx.is_interactive() {
        let result = match level {
            Level::Ok => cliclack::log::success(&message),
            Level::Warn => cliclack::log::warning(&message),
            Level::Fail => cliclack::log::error(&message),
            Level::Info => cliclack::log::info(&message),
        };
        if result.is_ok() {
            return;
        }
    }
    println!("  {} {}", level.plain_tag(), message);
}

/// Title line for a multi-step command
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.is_interactive() && cliclack::intro(style(title).cyan().bold()).is_ok() {
        return;
    }
    println!("{}", style(title).cyan().bold());
}

pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() && cliclack::outro(style(message).green().bold()).is_ok() {
        return;
    }
    println!("{} {}", style("[OK]").green(), message);
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    emit(ctx, Level::Ok, message.to_string());
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    emit(ctx, Level::Ok, format!("{} ({})", message, style(detail).dim()));
}

pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    emit(ctx, Level::Warn, format!("{} - {}", message, style(hint).dim()));
}

pub fn step_error(ctx: &UiContext, message: &str) {
    emit(ctx, Level::Fail, message.to_string());
}

pub fn step_info(ctx: &UiContext, message: &str) {
    emit(ctx, Level::Info, message.to_string());
}

/// Dimmed secondary line
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() && cliclack::log::remark(message).is_ok() {
        return;
    }
    println!("  {}", style(message).dim());
}

/// Bold heading followed by a blank line
pub fn section(title: &str) {
    println!();
    println!("{}", style(title).bold());
}

pub fn key_value(key: &str, value: &str) {
    println!("  {:<14} {}", style(format!("{}:", key)).dim(), value);
}

/// Key/value pair coloured green when healthy, yellow otherwise
pub fn key_value_status(key: &str, value: &str, ok: bool) {
    let value = if ok {
        style(value).green()
    } else {
        style(value).yellow()
    };
    println!("  {:<14} {}", style(format!("{}:", key)).dim(), value);
}
