use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use entity::{user, verification_code};

use crate::crypto::{hash_password_phc, verify_password_phc};
use crate::error::{AppError, AppResult};
use crate::jwt::{encode_claims, Claims};
use crate::rate_limit::VERIFICATION_RESEND_COOLDOWN_SECS;
use crate::util::{generate_reset_token, generate_verification_code, normalize_email};

pub const VERIFICATION_CODE_TTL_SECS: i64 = 10 * 60;
pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

pub async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> AppResult<Option<user::Model>> {
    debug!(email, "looking up user by email");
    Ok(user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await?)
}

pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i32) -> AppResult<Option<user::Model>> {
    Ok(user::Entity::find_by_id(id).one(db).await?)
}

/// Store a fresh code for `email` and return it for mailing.
///
/// Refuses registered addresses and requests inside the resend cooldown.
pub async fn issue_verification_code<C: ConnectionTrait>(db: &C, email: &str, now: i64) -> AppResult<String> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::bad_request("Email is required."));
    }
    if find_by_email(db, &email).await?.is_some() {
        return Err(AppError::bad_request("Email already registered. Please log in"));
    }

    if let Some(existing) = verification_code::Entity::find_by_id(email.clone()).one(db).await? {
        let wait = existing.created_at + VERIFICATION_RESEND_COOLDOWN_SECS - now;
        if wait > 0 {
            return Err(AppError::TooManyRequests {
                message: format!("Please wait {wait} seconds before requesting a new code."),
                retry_after: wait,
            });
        }
    }

    let code = generate_verification_code()?;
    let row = verification_code::ActiveModel {
        email: Set(email.clone()),
        code: Set(code.clone()),
        expires_at: Set(now + VERIFICATION_CODE_TTL_SECS),
        created_at: Set(now),
    };
    verification_code::Entity::insert(row)
        .on_conflict(
            OnConflict::column(verification_code::Column::Email)
                .update_columns([
                    verification_code::Column::Code,
                    verification_code::Column::ExpiresAt,
                    verification_code::Column::CreatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    info!(email = %email, "verification code issued");
    Ok(code)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "code")]
    pub verification_code: String,
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn register<C: ConnectionTrait>(db: &C, input: RegisterInput, now: i64) -> AppResult<user::Model> {
    let email = normalize_email(&input.email);
    let code = input.verification_code.trim();
    if email.is_empty() || input.password.is_empty() || code.is_empty() {
        return Err(AppError::bad_request("All fields are required."));
    }

    if find_by_email(db, &email).await?.is_some() {
        return Err(AppError::bad_request("Email already registered. Please log in"));
    }

    let Some(stored) = verification_code::Entity::find_by_id(email.clone()).one(db).await? else {
        return Err(AppError::bad_request("Please request a verification code first."));
    };
    if stored.code != code || stored.expires_at <= now {
        warn!(email = %email, "rejected verification code");
        return Err(AppError::bad_request("Incorrect or expired verification code."));
    }

    let created = user::ActiveModel {
        email: Set(email.clone()),
        name: Set(input.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())),
        password_hash: Set(Some(hash_password_phc(&input.password)?)),
        role: Set(user::Role::User.as_str().to_string()),
        reset_token: Set(None),
        reset_expires: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    verification_code::Entity::delete_by_id(email.clone()).exec(db).await?;
    info!(user_id = created.id, "user registered");
    Ok(created)
}

/// Issued session: the signed token and its claims.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub claims: Claims,
    pub user: user::Model,
}

pub async fn login<C: ConnectionTrait>(
    db: &C,
    email: &str,
    password: &str,
    secret: &[u8],
    ttl_secs: i64,
    now: i64,
) -> AppResult<Session> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::bad_request("Email and password are required."));
    }

    let invalid = || AppError::bad_request("Invalid email or password");
    let user = find_by_email(db, email).await?.ok_or_else(invalid)?;
    let Some(stored) = user.password_hash.as_deref() else {
        return Err(invalid());
    };
    if !verify_password_phc(password, stored) {
        warn!(user_id = user.id, "failed login");
        return Err(invalid());
    }

    let claims = Claims::for_user(&user, now, ttl_secs);
    let token = encode_claims(secret, &claims)?;
    info!(user_id = user.id, "login");
    Ok(Session {
        token,
        claims,
        user,
    })
}

/// Store a reset token for `email` and return it for the reset link.
pub async fn start_password_reset<C: ConnectionTrait>(db: &C, email: &str, now: i64) -> AppResult<String> {
    let Some(user) = find_by_email(db, email).await?.filter(|u| !u.is_guest()) else {
        return Err(AppError::not_found("Email not found."));
    };

    let token = generate_reset_token()?;
    let mut active = user.into_active_model();
    active.reset_token = Set(Some(token.clone()));
    active.reset_expires = Set(Some(now + RESET_TOKEN_TTL_SECS));
    active.updated_at = Set(now);
    active.update(db).await?;
    Ok(token)
}

pub async fn reset_password<C: ConnectionTrait>(
    db: &C,
    token: &str,
    new_password: &str,
    now: i64,
) -> AppResult<()> {
    let token = token.trim();
    if token.is_empty() || new_password.is_empty() {
        return Err(AppError::bad_request("Invalid or expired token."));
    }

    let found = user::Entity::find()
        .filter(user::Column::ResetToken.eq(token))
        .filter(user::Column::ResetExpires.gt(now))
        .one(db)
        .await?;
    let Some(user) = found else {
        return Err(AppError::bad_request("Invalid or expired token."));
    };

    let user_id = user.id;
    let mut active = user.into_active_model();
    active.password_hash = Set(Some(hash_password_phc(new_password)?));
    active.reset_token = Set(None);
    active.reset_expires = Set(None);
    active.updated_at = Set(now);
    active.update(db).await?;
    info!(user_id, "password reset");
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

pub async fn change_password<C: ConnectionTrait>(db: &C, input: ChangePasswordInput, now: i64) -> AppResult<()> {
    if input.email.trim().is_empty() || input.old_password.is_empty() || input.new_password.is_empty() {
        return Err(AppError::bad_request("All fields are required."));
    }

    let Some(user) = find_by_email(db, &input.email).await? else {
        return Err(AppError::not_found("User doesn't exist"));
    };
    let matches = user
        .password_hash
        .as_deref()
        .is_some_and(|stored| verify_password_phc(&input.old_password, stored));
    if !matches {
        return Err(AppError::bad_request("Current password is incorrect."));
    }

    let user_id = user.id;
    let mut active = user.into_active_model();
    active.password_hash = Set(Some(hash_password_phc(&input.new_password)?));
    active.updated_at = Set(now);
    active.update(db).await?;
    info!(user_id, "password changed");
    Ok(())
}
