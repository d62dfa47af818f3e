//! User value objects

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// User ID value object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Email value object with validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Create a new Email with validation
    pub fn new(email: String) -> Result<Self, String> {
        let email = email.trim().to_lowercase();

        if email.is_empty() {
            return Err("Email cannot be empty".to_string());
        }

        let Some((local, domain)) = email.split_once('@') else {
            return Err("Invalid email format: missing @ symbol".to_string());
        };

        if domain.contains('@') {
            return Err("Invalid email format: multiple @ symbols".to_string());
        }

        if local.is_empty() {
            return Err("Invalid email format: empty local part".to_string());
        }

        if domain.is_empty() || !domain.contains('.') {
            return Err("Invalid email format: domain must contain a dot".to_string());
        }

        if email.len() > 255 {
            return Err("Email too long (max 255 characters)".to_string());
        }

        Ok(Email(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl FromStr for Email {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Public, globally unique display name (2-20 characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    pub const MIN_LENGTH: usize = 2;
    pub const MAX_LENGTH: usize = 20;

    pub fn new(name: String) -> Result<Self, String> {
        let name = name.trim().to_string();
        let len = name.chars().count();

        if len < Self::MIN_LENGTH || len > Self::MAX_LENGTH {
            return Err(format!(
                "Display name must be between {} and {} characters",
                Self::MIN_LENGTH,
                Self::MAX_LENGTH
            ));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Password validation result containing details about why validation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordValidationError {
    pub message: String,
    pub missing_requirements: Vec<String>,
}

impl fmt::Display for PasswordValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Plain-text password accepted at registration
///
/// Requirements:
/// - Minimum 8 characters
/// - At least one digit
/// - At least one uppercase letter
/// - At least one special character (!@#$%^&*(),.?":{}|<>)
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub const MIN_LENGTH: usize = 8;
    const SPECIAL_CHARS: &'static str = "!@#$%^&*(),.?\":{}|<>";

    pub fn new(password: String) -> Result<Self, PasswordValidationError> {
        Self::validate(&password)?;
        Ok(Password(password))
    }

    pub fn validate(password: &str) -> Result<(), PasswordValidationError> {
        let mut missing = Vec::new();

        if password.chars().count() < Self::MIN_LENGTH {
            missing.push(format!("at least {} characters", Self::MIN_LENGTH));
        }

        if !password.chars().any(|c| c.is_ascii_digit()) {
            missing.push("at least one digit".to_string());
        }

        if !password.chars().any(|c| c.is_uppercase()) {
            missing.push("at least one uppercase letter".to_string());
        }

        if !password.chars().any(|c| Self::SPECIAL_CHARS.contains(c)) {
            missing.push("at least one special character".to_string());
        }

        if !missing.is_empty() {
            return Err(PasswordValidationError {
                message: format!("Password must contain: {}", missing.join(", ")),
                missing_requirements: missing,
            });
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Password hash value object (never exposes raw hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    /// Stored hash string (persistence only)
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Intentionally not implementing Display or Serialize to prevent accidental exposure
impl From<String> for PasswordHash {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

/// A per-field switch a user can flip to hide that field from other viewers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyToggle {
    EmailPrivate,
    FirstNamePrivate,
    LastNamePrivate,
    BioPrivate,
    LocationPrivate,
    CreatedAtPrivate,
    IsActivePrivate,
}

impl PrivacyToggle {
    pub const ALL: [PrivacyToggle; 7] = [
        PrivacyToggle::EmailPrivate,
        PrivacyToggle::FirstNamePrivate,
        PrivacyToggle::LastNamePrivate,
        PrivacyToggle::BioPrivate,
        PrivacyToggle::LocationPrivate,
        PrivacyToggle::CreatedAtPrivate,
        PrivacyToggle::IsActivePrivate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyToggle::EmailPrivate => "email_private",
            PrivacyToggle::FirstNamePrivate => "first_name_private",
            PrivacyToggle::LastNamePrivate => "last_name_private",
            PrivacyToggle::BioPrivate => "bio_private",
            PrivacyToggle::LocationPrivate => "location_private",
            PrivacyToggle::CreatedAtPrivate => "created_at_private",
            PrivacyToggle::IsActivePrivate => "is_active_private",
        }
    }
}

impl FromStr for PrivacyToggle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PrivacyToggle::ALL
            .into_iter()
            .find(|toggle| toggle.as_str() == s)
            .ok_or_else(|| format!("Unknown privacy toggle: {}", s))
    }
}

impl fmt::Display for PrivacyToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of toggles a user has switched to "private".
///
/// A toggle that is absent from the set is visible. Settings read from storage
/// with missing or unrecognised toggles therefore expose the field rather than fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivacySettings {
    hidden: BTreeSet<PrivacyToggle>,
}

impl PrivacySettings {
    /// Every toggle visible
    pub fn all_visible() -> Self {
        Self {
            hidden: BTreeSet::new(),
        }
    }

    /// Settings for a freshly registered account: only the email is hidden
    pub fn registration_default() -> Self {
        Self::all_visible().with(PrivacyToggle::EmailPrivate, true)
    }

    /// Build settings from `(column name, value)` pairs. Unknown names and
    /// `None` values leave the field visible.
    pub fn from_named_flags<'a, I>(flags: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<bool>)>,
    {
        let mut settings = Self::all_visible();
        for (name, value) in flags {
            match name.parse::<PrivacyToggle>() {
                Ok(toggle) => settings.set(toggle, value.unwrap_or(false)),
                Err(_) => tracing::debug!(toggle = name, "Ignoring unknown privacy toggle"),
            }
        }
        settings
    }

    pub fn is_hidden(&self, toggle: PrivacyToggle) -> bool {
        self.hidden.contains(&toggle)
    }

    pub fn set(&mut self, toggle: PrivacyToggle, hidden: bool) {
        if hidden {
            self.hidden.insert(toggle);
        } else {
            self.hidden.remove(&toggle);
        }
    }

    pub fn with(mut self, toggle: PrivacyToggle, hidden: bool) -> Self {
        self.set(toggle, hidden);
        self
    }

    pub fn hidden(&self) -> impl Iterator<Item = PrivacyToggle> + '_ {
        self.hidden.iter().copied()
    }
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self::registration_default()
    }
}

/// Per-channel notification opt-ins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub messages_enabled: bool,
    pub messages_from_strangers: bool,
    pub messages_notifications: bool,
    pub forum_reply: bool,
    pub forum_mention: bool,
    pub forum_quote: bool,
    pub email_events: bool,
    pub email_messages: bool,
    pub email_newsletter: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            messages_enabled: true,
            messages_from_strangers: true,
            messages_notifications: true,
            forum_reply: true,
            forum_mention: true,
            forum_quote: true,
            email_events: true,
            email_messages: false,
            email_newsletter: false,
        }
    }
}
