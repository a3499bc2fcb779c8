use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// How the user chose to identify themselves on the start screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignupMethod {
    #[default]
    Email,
    Phone,
}

impl SignupMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignupMethod::Email => "email",
            SignupMethod::Phone => "phone",
        }
    }
}

impl fmt::Display for SignupMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown signup method '{0}', expected 'email' or 'phone'")]
pub struct ParseSignupMethodError(String);

impl FromStr for SignupMethod {
    type Err = ParseSignupMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(SignupMethod::Email),
            "phone" => Ok(SignupMethod::Phone),
            other => Err(ParseSignupMethodError(other.to_string())),
        }
    }
}

/// The funnel is strictly linear. The step counter shown to the user is
/// derived from the screen so the two cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    #[default]
    Start,
    /// Identifier accepted, OTP send in flight.
    Submitted,
    Otp,
    Profile,
    Finish,
    Done,
}

impl Screen {
    pub fn step(&self) -> u8 {
        match self {
            Screen::Start => 1,
            Screen::Submitted => 2,
            Screen::Otp => 3,
            Screen::Profile => 4,
            Screen::Finish => 5,
            Screen::Done => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Start => "start",
            Screen::Submitted => "submitted",
            Screen::Otp => "otp",
            Screen::Profile => "profile",
            Screen::Finish => "finish",
            Screen::Done => "done",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locally generated token identifying a browser-equivalent session before
/// any account exists. Opaque to the backend and the analytics sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnonymousId(pub String);

impl AnonymousId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnonymousId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
