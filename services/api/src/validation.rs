//! Input validation utilities

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

/// Validate an attendee or event name
pub fn validate_name(field: &str, name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("{} is required", field));
    }

    if name.chars().count() > 200 {
        return Err(format!("{} must be at most 200 characters long", field));
    }

    if name.chars().any(char::is_control) {
        return Err(format!("{} cannot contain control characters", field));
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate an event date (`YYYY-MM-DD`)
pub fn validate_date(date: &str) -> Result<(), String> {
    static DATE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = DATE_REGEX
        .get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("Failed to compile date regex"));

    if !regex.is_match(date) || NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err("Date must be a valid YYYY-MM-DD date".to_string());
    }

    Ok(())
}

/// Validate an event start time (`HH:MM`, 24h)
pub fn validate_time(time: &str) -> Result<(), String> {
    static TIME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = TIME_REGEX
        .get_or_init(|| Regex::new(r"^\d{2}:\d{2}$").expect("Failed to compile time regex"));

    if !regex.is_match(time) || NaiveTime::parse_from_str(time, "%H:%M").is_err() {
        return Err("Time must be a valid HH:MM time".to_string());
    }

    Ok(())
}

/// Validate a pass template reference
pub fn validate_template_url(url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Ok(());
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(());
    }

    match url.strip_prefix("s3://").and_then(|rest| rest.split_once('/')) {
        Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(()),
        _ => Err("Template must be an http(s):// or s3://bucket/key URL".to_string()),
    }
}
