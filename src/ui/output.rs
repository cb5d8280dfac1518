use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

/// Rows removed along with the deleted row
pub fn cascaded(table: &str, column: &str, rows: usize, depth: usize) {
    println!(
        "{} {} {} {}",
        Icons::CASCADE.style(theme().error.clone()),
        format!("{} row(s) in {}", rows, table).style(theme().error.clone()),
        muted(&format!("via {}", column)),
        muted(&format!("(depth {})", depth))
    );
}

/// References cleared by the delete
pub fn nulled(table: &str, column: &str, rows: usize) {
    println!(
        "{} {} {}",
        Icons::NULLED.style(theme().warn.clone()),
        format!("{} row(s) in {}", rows, table).style(theme().warn.clone()),
        muted(&format!("{} set to NULL", column))
    );
}

/// Rows that reject the delete
pub fn blocked(table: &str, column: &str, rows: usize) {
    println!(
        "{} {} {}",
        Icons::BLOCKED,
        format!("{} row(s) in {}", rows, table).style(theme().error.clone()),
        muted(&format!("restrict on {}", column))
    );
}

pub fn timing(elapsed: &str) {
    println!("{} {}", Icons::CLOCK.style(theme().dim.clone()), elapsed);
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}
