//! Styled step and key/value lines

use super::context::UiContext;
use console::{style, Style};

pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        println!("{}", style(title).cyan().bold());
    } else {
        println!("{}", title);
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        println!("  {} {}", style("✓").green(), message);
    } else {
        println!("  {} {}", style("[OK]").green(), message);
    }
}

pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        println!("  {} {}", style("!").yellow(), message);
    } else {
        println!("  {} {}", style("[WARN]").yellow(), message);
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        println!("  {} {}", style("•").cyan(), message);
    } else {
        println!("  {} {}", style("[INFO]").cyan(), message);
    }
}

pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Key/value line colored by whether the value is good news
pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, ok: bool) {
    if ctx.use_fancy_output() {
        let value_style = if ok { Style::new().green() } else { Style::new().yellow() };
        println!("  {}: {}", style(key).dim(), value_style.apply_to(value));
    } else {
        let prefix = if ok { "[OK]" } else { "[WARN]" };
        println!("  {} {}: {}", prefix, key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_non_interactive() {
        let ctx = UiContext::non_interactive();
        section(&ctx, "demo");
        step_ok(&ctx, "web is healthy");
        step_warn(&ctx, "db is not healthy");
        step_info(&ctx, "rebuild suggested");
        key_value(&ctx, "project", "demo");
        key_value_status(&ctx, "web", "healthy", true);
    }
}
