use regex::Regex;
use std::collections::BTreeMap;

// Field name -> message; an empty map means the form is valid.
pub type FieldErrors = BTreeMap<&'static str, String>;

pub fn is_valid_email(email: &str) -> bool {
    let email_re = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    email_re.is_match(email)
}

// 3-20 characters: letters, numbers, underscores, hyphens
pub fn is_valid_username(username: &str) -> bool {
    let username_re = Regex::new(r"^[a-zA-Z0-9_-]{3,20}$").unwrap();
    username_re.is_match(username)
}

pub fn validate_login(username: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if username.trim().is_empty() {
        errors.insert("username", "Username is required".to_string());
    }
    if password.is_empty() {
        errors.insert("password", "Password is required".to_string());
    }

    errors
}

#[derive(Clone, Debug, Default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

pub fn validate_signup(form: &SignupForm) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if form.username.trim().is_empty() {
        errors.insert("username", "Username is required".to_string());
    } else if !is_valid_username(&form.username) {
        errors.insert(
            "username",
            "Username must be 3-20 characters and can only contain letters, numbers, underscores, and hyphens".to_string(),
        );
    }

    if form.email.trim().is_empty() {
        errors.insert("email", "Email is required".to_string());
    } else if !is_valid_email(&form.email) {
        errors.insert("email", "Please enter a valid email address".to_string());
    }

    if form.password.is_empty() {
        errors.insert("password", "Password is required".to_string());
    } else if form.password.len() < 6 {
        errors.insert(
            "password",
            "Password should be at least 6 characters".to_string(),
        );
    }

    if form.password != form.confirm_password {
        errors.insert("confirmPassword", "Passwords don't match".to_string());
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_requires_both_fields() {
        let errors = validate_login("  ", "");
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_key("username"));
        assert!(errors.contains_key("password"));

        assert!(validate_login("sam", "hunter2").is_empty());
    }

    #[test]
    fn username_rules() {
        assert!(is_valid_username("sam_01-x"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("way-too-long-for-a-username"));
        assert!(!is_valid_username("bad space"));
    }

    #[test]
    fn email_rules() {
        assert!(is_valid_email("sam@example.com"));
        assert!(!is_valid_email("sam@example"));
        assert!(!is_valid_email("sam example.com"));
    }

    #[test]
    fn signup_collects_field_errors() {
        let form = SignupForm {
            username: "a".to_string(),
            email: "nope".to_string(),
            password: "abc".to_string(),
            confirm_password: "abcd".to_string(),
        };
        let errors = validate_signup(&form);
        assert!(errors.contains_key("username"));
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
        assert!(errors.contains_key("confirmPassword"));

        let good = SignupForm {
            username: "sam".to_string(),
            email: "sam@example.com".to_string(),
            password: "hunter22".to_string(),
            confirm_password: "hunter22".to_string(),
        };
        assert!(validate_signup(&good).is_empty());
    }
}
