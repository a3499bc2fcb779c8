use serde::{Deserialize, Serialize};

use crate::domain::SignupMethod;

/// Request body for `POST /otp/send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSendRequest {
    pub user_id: String,
    pub signup_method: SignupMethod,
    pub platform: String,
    pub device: String,
}

/// The backend returns the OTP value directly so the client can display it.
/// A stand-in for out-of-band delivery (SMS/email), not a security model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSendResponse {
    pub otp: String,
}

/// Request body for `POST /otp/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerifyRequest {
    pub user_id: String,
    pub otp: String,
    pub signup_method: SignupMethod,
    pub platform: String,
    pub device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerifyResponse {
    pub success: bool,
}

/// Request body for `POST /signup/complete`. The response body is unused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupCompleteRequest {
    pub user_id: String,
    pub signup_method: SignupMethod,
    pub platform: String,
    pub device: String,
}
