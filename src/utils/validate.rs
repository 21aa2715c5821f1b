use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

pub const MAX_TITLE_LEN: usize = 200;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("invalid username regex"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("invalid email regex")
});

/// Trimmed value, or `None` when nothing but whitespace was sent.
pub fn clean_required(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn clean_optional(value: Option<&str>) -> Option<String> {
    value.and_then(clean_required)
}

/// Required, trimmed title no longer than [`MAX_TITLE_LEN`] characters.
pub fn require_title(value: &str, field: &str) -> Result<String, String> {
    let Some(title) = clean_required(value) else {
        return Err(format!("{field} is required."));
    };
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!(
            "{field} must be at most {MAX_TITLE_LEN} characters."
        ));
    }
    Ok(title)
}

pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.len() < 3 || username.len() > 32 {
        return Err("Username must be between 3 and 32 characters.");
    }
    if !USERNAME_RE.is_match(username) {
        return Err("Username may only contain letters, digits, '.', '_' or '-'.");
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long.");
    }
    if password.trim().is_empty() {
        return Err("Password must not be blank.");
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if !EMAIL_RE.is_match(email) {
        return Err("Email format is invalid.");
    }
    Ok(())
}

/// Accepts absolute http(s) URLs and paths to files served by this portal.
pub fn validate_link(link: &str) -> Result<(), &'static str> {
    if let Some(path) = link.strip_prefix("/files/") {
        if path.is_empty() || path.split('/').any(|segment| segment == ".." || segment.is_empty()) {
            return Err("Local file links must point inside /files/.");
        }
        return Ok(());
    }

    match Url::parse(link) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => Ok(()),
        _ => Err("Links must be http(s) URLs or /files/ paths."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_values_are_trimmed() {
        assert_eq!(clean_required("  Unit 1 "), Some("Unit 1".to_string()));
        assert_eq!(clean_required("   "), None);
        assert_eq!(clean_optional(None), None);
        assert_eq!(clean_optional(Some(" x ")), Some("x".to_string()));
    }

    #[test]
    fn titles_have_a_length_cap() {
        assert_eq!(require_title(" Grade 5 ", "Title").unwrap(), "Grade 5");
        assert_eq!(require_title("", "Title").unwrap_err(), "Title is required.");
        let long = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(require_title(&long, "Title").is_err());
    }

    #[test]
    fn usernames() {
        assert!(validate_username("staff.one").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("no spaces").is_err());
    }

    #[test]
    fn passwords() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("        ").is_err());
    }

    #[test]
    fn emails() {
        assert!(validate_email("office@school.edu").is_ok());
        assert!(validate_email("office@school").is_err());
    }

    #[test]
    fn links() {
        assert!(validate_link("https://youtu.be/abc").is_ok());
        assert!(validate_link("/files/resources/a.pdf").is_ok());
        assert!(validate_link("/files/../secret").is_err());
        assert!(validate_link("/files/").is_err());
        assert!(validate_link("javascript:alert(1)").is_err());
        assert!(validate_link("ftp://example.com/a.pdf").is_err());
    }
}
