//! Credential storage, token minting and token verification.
//!
//! Passwords are stored as PBKDF2-HMAC-SHA256 hashes with a per-user random salt.
//! Tokens are HS256 JWTs whose `sub` is the user id; verification is stateless.

use std::num::NonZeroU32;

use base64::{engine::general_purpose, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::{
    digest, pbkdf2,
    rand::{SecureRandom, SystemRandom},
};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::{
    error::ApiError,
    model::{AccessToken, Claims, User},
    schema::{LoginSchema, RegisterSchema},
};

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;
const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = digest::SHA256_OUTPUT_LEN;
const HASH_SCHEME: &str = "pbkdf2-sha256";

// Verified against when the username is unknown, so both login failures cost one derivation.
const DUMMY_HASH: &str =
    "pbkdf2-sha256$100000$dG9kby1hcGktZHVtbXkhIQ==$x30SWUxk8VO1IZf8upV+DgP4pkn/BQxZCMNQ8M4EJgA=";

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| ApiError::Internal("failed to generate password salt".to_string()))?;

    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
        .ok_or_else(|| ApiError::Internal("PBKDF2 iteration count must be non-zero".to_string()))?;
    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &mut hash);

    Ok(format!(
        "{}${}${}${}",
        HASH_SCHEME,
        PBKDF2_ITERATIONS,
        general_purpose::STANDARD.encode(salt),
        general_purpose::STANDARD.encode(hash)
    ))
}

/// Returns false for a wrong password and for anything that is not a hash we produced.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }

    let Some(iterations) = iterations.parse().ok().and_then(NonZeroU32::new) else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (
        general_purpose::STANDARD.decode(salt),
        general_purpose::STANDARD.decode(hash),
    ) else {
        return false;
    };

    pbkdf2::verify(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &hash).is_ok()
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {}", e)))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(password: String, stored: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| ApiError::Internal(format!("password verification task failed: {}", e)))
}

/// Signing material plus the lifetime given to every token minted with it.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64) -> Result<AccessToken, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: unix_seconds(now),
            exp: unix_seconds(now + self.ttl),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {}", e)))?;

        Ok(AccessToken {
            access_token: token,
            token_type: "bearer".to_string(),
            expires_in: self.ttl.num_seconds(),
        })
    }

    /// Checks signature and expiry, returning the user id the token was minted for.
    pub fn verify(&self, token: &str) -> Result<i64, ApiError> {
        let decoded = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                ApiError::Unauthorized("Could not validate credentials".to_string())
            })?;

        decoded
            .claims
            .sub
            .parse()
            .map_err(|_| ApiError::Unauthorized("Could not validate credentials".to_string()))
    }
}

fn unix_seconds(at: DateTime<Utc>) -> u64 {
    at.timestamp().max(0) as u64
}

/// Resolves the caller from an `Authorization` header value.
pub fn authenticate(keys: &TokenKeys, authorization: Option<&str>) -> Result<i64, ApiError> {
    let header = authorization
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid authorization header".to_string()))?;

    keys.verify(token)
}

pub async fn register(pool: &SqlitePool, body: RegisterSchema) -> Result<User, ApiError> {
    if find_user_by_username(pool, &body.username).await?.is_some() {
        return Err(username_taken());
    }

    let hashed_password = hash_password_blocking(body.password).await?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, email, hashed_password, created_at) VALUES (?, ?, ?, ?) \
         RETURNING id, username, email, hashed_password, created_at",
    )
    .bind(&body.username)
    .bind(&body.email)
    .bind(hashed_password)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => username_taken(),
        other => ApiError::Database(other),
    })?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

pub async fn login(
    pool: &SqlitePool,
    keys: &TokenKeys,
    body: LoginSchema,
) -> Result<AccessToken, ApiError> {
    let user = find_user_by_username(pool, &body.username).await?;
    let stored = user
        .as_ref()
        .map(|user| user.hashed_password.clone())
        .unwrap_or_else(|| DUMMY_HASH.to_string());
    let verified = verify_password_blocking(body.password, stored).await?;

    match user {
        Some(user) if verified => {
            info!(user_id = user.id, "user logged in");
            keys.issue(user.id)
        }
        _ => {
            warn!(username = %body.username, "login failed");
            Err(ApiError::Unauthorized(
                "Incorrect username or password".to_string(),
            ))
        }
    }
}

pub async fn find_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, hashed_password, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

async fn find_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, hashed_password, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

fn username_taken() -> ApiError {
    ApiError::Conflict("Username already registered".to_string())
}
