use chrono::{DateTime, Duration, Utc};
use mongodb::bson::{doc, Bson, Document};
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

use crate::db::mongo::stored_time;
use crate::error::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_NAME_LEN: usize = 2;
pub const OTP_TTL_MINUTES: i64 = 15;
/// Guesses allowed per issued code, the correct one included.
pub const MAX_OTP_ATTEMPTS: i32 = 5;

/// The two one-time codes a user document can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpPurpose {
    Verification,
    Reset,
}

impl OtpPurpose {
    pub fn code_field(self) -> &'static str {
        match self {
            OtpPurpose::Verification => "verifyOtp",
            OtpPurpose::Reset => "resetOtp",
        }
    }

    pub fn expiry_field(self) -> &'static str {
        match self {
            OtpPurpose::Verification => "verifyOtpExpireAt",
            OtpPurpose::Reset => "resetOtpExpireAt",
        }
    }

    pub fn attempts_field(self) -> &'static str {
        match self {
            OtpPurpose::Verification => "verifyOtpAttempts",
            OtpPurpose::Reset => "resetOtpAttempts",
        }
    }
}

/// Stores a fresh code and restarts its attempt count.
pub fn otp_issue_update(purpose: OtpPurpose, otp: &str, now: DateTime<Utc>) -> Document {
    let mut set = Document::new();
    set.insert(purpose.code_field(), otp);
    set.insert(purpose.expiry_field(), stored_time(otp_expiry(now)));
    set.insert(purpose.attempts_field(), 0);
    doc! { "$set": set }
}

/// Matches the user only while `purpose` still has attempts left. A
/// missing counter counts as none used.
pub fn otp_attempt_filter(email: &str, purpose: OtpPurpose) -> Document {
    let mut filter = doc! { "email": email };
    filter.insert(
        purpose.attempts_field(),
        doc! { "$not": { "$gte": MAX_OTP_ATTEMPTS } },
    );
    filter
}

pub fn otp_attempt_update(purpose: OtpPurpose) -> Document {
    let mut inc = Document::new();
    inc.insert(purpose.attempts_field(), 1);
    doc! { "$inc": inc }
}

/// Drops the code and its expiry. With `reset_attempts` the counter goes
/// too; without it a spent code stays locked until a new one is issued.
pub fn otp_clear_fields(purpose: OtpPurpose, reset_attempts: bool) -> Document {
    let mut unset = Document::new();
    unset.insert(purpose.code_field(), Bson::String(String::new()));
    unset.insert(purpose.expiry_field(), Bson::String(String::new()));
    if reset_attempts {
        unset.insert(purpose.attempts_field(), Bson::String(String::new()));
    }
    unset
}

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)+$",
        )
        .expect("email regex is valid")
    });
    re.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_signup(name: &str, email: &str, password: &str) -> AppResult<()> {
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(AppError::bad_request("Name must be at least 2 characters"));
    }
    if !is_valid_email(email) {
        return Err(AppError::bad_request("Invalid email address"));
    }
    validate_password(password)
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request("Password must be at least 8 characters"));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Six-digit one-time code.
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", code)
}

pub fn otp_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(OTP_TTL_MINUTES)
}

/// Checks a submitted code against the stored one and its expiry.
pub fn check_otp(
    submitted: &str,
    stored: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    match (stored, expires_at) {
        (Some(stored), Some(expires_at)) if !stored.is_empty() => {
            if expires_at < now {
                Err(AppError::bad_request("OTP has expired"))
            } else if stored != submitted.trim() {
                Err(AppError::bad_request("Invalid OTP"))
            } else {
                Ok(())
            }
        }
        _ => Err(AppError::bad_request("Invalid OTP")),
    }
}
