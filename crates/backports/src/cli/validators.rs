//! Input validators for CLI arguments.
//!
//! Each validator returns the cleaned value or a message clap shows to the
//! user as-is.

/// Validate an issue key such as `OCPBUGS-1234`.
///
/// Keys are a project part and a numeric part joined by a hyphen. Surrounding
/// whitespace is trimmed.
pub fn validate_issue_key(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Issue key cannot be empty".to_string());
    }

    let Some((project, number)) = s.rsplit_once('-') else {
        return Err(format!(
            "Invalid issue key: '{s}'. Expected format: PROJECT-NUMBER (e.g., OCPBUGS-1234)"
        ));
    };

    if project.is_empty() || !project.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!(
            "Invalid project in issue key '{s}': use letters, digits or underscores"
        ));
    }
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("Invalid number in issue key '{s}': expected digits"));
    }

    Ok(s.to_string())
}

/// Validate a deadline in whole seconds; zero is rejected.
pub fn validate_deadline(s: &str) -> Result<u64, String> {
    match s.trim().parse::<u64>() {
        Ok(0) => Err("Deadline must be at least 1 second".to_string()),
        Ok(secs) => Ok(secs),
        Err(_) => Err(format!("Invalid deadline '{s}': expected whole seconds")),
    }
}
