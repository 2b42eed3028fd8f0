//! Identifier rules for caller-supplied usernames, filenames and passwords.

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 64;
pub const FILENAME_MAX: usize = 255;
pub const PASSWORD_MAX: usize = 1024;

/// Username: 2-64 chars, ASCII alphanumeric, hyphen, underscore.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.len() < USERNAME_MIN || username.len() > USERNAME_MAX {
        return Err(format!(
            "Username must be {}-{} characters",
            USERNAME_MIN, USERNAME_MAX
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(
            "Username may only contain alphanumeric characters, hyphens, and underscores"
                .to_string(),
        );
    }
    Ok(())
}

/// Filename: a single path component of 1-255 bytes without control characters.
pub fn validate_filename(filename: &str) -> Result<(), String> {
    if filename.is_empty() || filename.len() > FILENAME_MAX {
        return Err(format!("Filename must be 1-{} bytes", FILENAME_MAX));
    }
    if filename == "." || filename == ".." {
        return Err("Filename cannot be '.' or '..'".to_string());
    }
    if filename
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err("Filename may not contain slashes or control characters".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() || password.len() > PASSWORD_MAX {
        return Err(format!("Password must be 1-{} bytes", PASSWORD_MAX));
    }
    Ok(())
}
