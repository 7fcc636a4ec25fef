//! Explicit input checks, called at the entry of each service operation.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ApiError;

static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").expect("hardcoded username regex is valid")
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .expect("hardcoded email regex is valid")
});

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_CONTENT_LEN: usize = 100_000;
pub const MAX_CATEGORY_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1_000;
pub const MAX_COMMENT_LEN: usize = 5_000;
pub const MAX_IMAGE_URL_LEN: usize = 2_048;

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::Validation(message.into())
}

pub fn username(value: &str) -> Result<(), ApiError> {
    if USERNAME_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(invalid(
            "username must be 3-32 characters of letters, digits, '_', '.' or '-'",
        ))
    }
}

pub fn email(value: &str) -> Result<(), ApiError> {
    if value.len() <= 254 && EMAIL_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(invalid("email address is not valid"))
    }
}

pub fn password(value: &str) -> Result<(), ApiError> {
    let length = value.chars().count();
    if value.trim().is_empty() {
        return Err(invalid("password must not be blank"));
    }
    if length < MIN_PASSWORD_LEN {
        return Err(invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if length > MAX_PASSWORD_LEN {
        return Err(invalid(format!(
            "password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Required free text: not blank, at most `max` characters. Returns the trimmed value.
pub fn text(field: &str, value: &str, max: usize) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(format!("{field} must not be blank")));
    }
    if trimmed.chars().count() > max {
        return Err(invalid(format!("{field} must be at most {max} characters")));
    }
    Ok(trimmed.to_string())
}

/// Optional free text that may be empty, at most `max` characters.
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<String, ApiError> {
    let trimmed = value.unwrap_or_default().trim();
    if trimmed.chars().count() > max {
        return Err(invalid(format!("{field} must be at most {max} characters")));
    }
    Ok(trimmed.to_string())
}

pub fn image_url(value: &str) -> Result<(), ApiError> {
    let is_http = value.starts_with("https://") || value.starts_with("http://");
    if !is_http || value.len() > MAX_IMAGE_URL_LEN || value.chars().any(char::is_whitespace) {
        return Err(invalid("imageUrl must be an http(s) URL"));
    }
    Ok(())
}

pub fn positive_id(field: &str, value: i64) -> Result<(), ApiError> {
    if value > 0 {
        Ok(())
    } else {
        Err(invalid(format!("{field} must be a positive id")))
    }
}
