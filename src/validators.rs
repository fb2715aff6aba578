//! Form field validation.
//!
//! Every validator takes the raw field text and returns an empty string when the
//! value is acceptable, or a human-readable message otherwise. The form types
//! collect those messages per field so a caller can annotate each input.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

pub const FIRST_NAME_MAX: usize = 35;
pub const LAST_NAME_MAX: usize = 100;
pub const PASSWORD_MIN: usize = 8;

/// `local@domain.tld` somewhere in the value, without whitespace in any part.
static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern compiles"));

pub fn email_validator(email: &str) -> String {
    if email.is_empty() {
        return "Email cannot be empty.".to_string();
    }
    if !EMAIL_PATTERN.is_match(email) {
        return "Sorry, the email is invalid".to_string();
    }
    String::new()
}

pub fn password_validator(password: &str) -> String {
    if password.is_empty() {
        return "Password cannot be empty.".to_string();
    }
    if password.chars().count() < PASSWORD_MIN {
        return format!("Password must be at least {PASSWORD_MIN} characters");
    }
    String::new()
}

pub fn first_name_validator(first_name: &str) -> String {
    name_validator(first_name, "First name", FIRST_NAME_MAX)
}

pub fn last_name_validator(last_name: &str) -> String {
    name_validator(last_name, "Last name", LAST_NAME_MAX)
}

fn name_validator(value: &str, label: &str, max: usize) -> String {
    if value.is_empty() {
        return format!("{label} cannot be empty.");
    }
    if !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return format!("{label} should only contain letters");
    }
    if value.chars().count() > max {
        return "maximum characters exceeded".to_string();
    }
    String::new()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    FirstName,
    LastName,
    Email,
    Password,
    RecordKey,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::FirstName => "first name",
            Field::LastName => "last name",
            Field::Email => "email",
            Field::Password => "password",
            Field::RecordKey => "record key",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Records `message` for `field` unless the validator accepted the value.
    fn check(&mut self, field: Field, message: String) {
        if !message.is_empty() {
            self.push(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check(Field::FirstName, first_name_validator(&self.first_name));
        errors.check(Field::LastName, last_name_validator(&self.last_name));
        errors.check(Field::Email, email_validator(&self.email));
        errors.check(Field::Password, password_validator(&self.password));
        errors.into_result()
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check(Field::Email, email_validator(&self.email));
        errors.check(Field::Password, password_validator(&self.password));
        errors.into_result()
    }
}

#[derive(Debug, Clone)]
pub struct PasswordResetForm {
    pub email: String,
}

impl PasswordResetForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.check(Field::Email, email_validator(&self.email));
        errors.into_result()
    }
}
