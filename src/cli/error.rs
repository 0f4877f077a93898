// Error handling utilities for consistent error messages and exit codes

use std::process;

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, missing resources, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exit with an internal error (exit code >1)
/// Internal errors are for unexpected system failures, database corruption, etc.
pub fn internal_error(message: &str) -> ! {
    eprintln!("Internal error: {}", message);
    process::exit(2);
}

/// Validate that a string is not empty
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Validate that a record ID is valid (positive integer)
pub fn validate_id(id_str: &str, entity: &str) -> Result<i64, String> {
    id_str.parse::<i64>()
        .map_err(|_| format!("Invalid {} ID: '{}'. ID must be a number.", entity, id_str))
        .and_then(|id| {
            if id > 0 {
                Ok(id)
            } else {
                Err(format!("Invalid {} ID: {}. ID must be positive.", entity, id))
            }
        })
}

/// Validate a company or dealer name (printable, no leading/trailing whitespace)
pub fn validate_name(name: &str, entity: &str) -> Result<(), String> {
    validate_non_empty(name, &format!("{} name", entity))?;
    if name.trim() != name {
        return Err(format!("{} name '{}' has leading or trailing whitespace", entity, name));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(format!("{} name contains control characters", entity));
    }
    if name.parse::<i64>().is_ok() {
        return Err(format!("{} name '{}' cannot be purely numeric (it would read as an ID)", entity, name));
    }
    Ok(())
}

/// Minimal email shape check: one '@' with text on both sides
pub fn validate_email(email: &str) -> Result<(), String> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() == 2 && !parts[0].is_empty() && parts[1].contains('.') && !email.contains(' ') {
        Ok(())
    } else {
        Err(format!("Invalid email: '{}'", email))
    }
}

/// Validate lot code format (alphanumeric, underscores, hyphens)
pub fn validate_lot_code(code: &str) -> Result<(), String> {
    if code.trim().is_empty() {
        return Err("Lot code cannot be empty".to_string());
    }

    if code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        Ok(())
    } else {
        Err(format!("Invalid lot code: '{}'. Lot codes can only contain letters, numbers, underscores, and hyphens.", code))
    }
}

/// Split a `field=value` argument
pub fn parse_field_assignment(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid field assignment: '{}'. Expected field=value.", arg)),
    }
}
