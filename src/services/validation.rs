use std::collections::HashMap;

use crate::auth::MAX_PASSWORD_BYTES;

/// Field name to message, rendered as `field_errors` in 400 responses.
pub type FieldErrors = HashMap<String, String>;

pub fn require<'a>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            errors.insert(field.to_string(), format!("{} is required", capitalize(field)));
            None
        }
    }
}

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.chars().count() > 100 {
        return Err("Name must be at most 100 characters".to_string());
    }
    Ok(())
}

/// Basic shape check: one `@`, non-empty local part, dotted domain.
pub fn validate_email_format(email: &str) -> Result<(), String> {
    if email.chars().any(char::is_whitespace) {
        return Err("Invalid email format".to_string());
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format".to_string());
    };
    if local.is_empty() || domain.contains('@') {
        return Err("Invalid email format".to_string());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(format!("Password must be at most {} bytes", MAX_PASSWORD_BYTES));
    }
    Ok(())
}

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
