use sqlx::PgPool;

use crate::config::get_config;
use crate::database::pg_store::PgStore;
use crate::database::store::{EntityKind, EntityStore};
use crate::dto::auth_dto::{AccessResponse, LoginRequest, LoginResponse, RegisterRequest};
use crate::dto::catalog_dto::{CreateUserPayload, UpdateUserPayload};
use crate::dto::snapshot_dto::UserView;
use crate::error::{Error, Result};
use crate::models::user::{Role, User, UserDraft};
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::token::{access_token, decode_token, refresh_token, TokenType};

/// Accounts: self-registration, login, token refresh and admin management.
#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

async fn ensure_username_free<S: EntityStore + ?Sized>(store: &mut S, username: &str, except: Option<i64>) -> Result<()> {
    match store.find_user_by_username(username).await? {
        Some(other) if Some(other.id) != except => Err(Error::Conflict(
            "A user with that username already exists.".to_string(),
        )),
        _ => Ok(()),
    }
}

async fn ensure_group<S: EntityStore + ?Sized>(store: &mut S, group_id: Option<i64>) -> Result<()> {
    match group_id {
        Some(id) if !store.exists(EntityKind::Group, id).await? => Err(Error::BadRequest(
            format!("Invalid pk \"{}\" - object does not exist.", id),
        )),
        _ => Ok(()),
    }
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Self-registration always creates a participant.
    pub async fn register(&self, payload: RegisterRequest) -> Result<UserView> {
        let mut conn = self.pool.acquire().await?;
        let mut store = PgStore::new(&mut *conn);
        let username = payload.username.trim().to_string();
        ensure_username_free(&mut store, &username, None).await?;

        let hash = hash_password(&payload.password)?;
        let user = store
            .insert_user(
                &UserDraft {
                    username,
                    full_name: payload.full_name,
                    workplace: payload.workplace.unwrap_or_default(),
                    role: Role::Participant,
                    group_id: None,
                    is_active: true,
                },
                Some(&hash),
            )
            .await?;
        tracing::info!(user_id = user.id, "participant registered");
        Ok(UserView::from(&user))
    }

    pub async fn login(&self, payload: LoginRequest) -> Result<LoginResponse> {
        let mut conn = self.pool.acquire().await?;
        let user = PgStore::new(&mut *conn)
            .find_user_by_username(payload.username.trim())
            .await?;

        let user = match user {
            Some(user) if verify_password(&payload.password, user.password_hash.as_deref())? => user,
            _ => return Err(Error::BadRequest("Login yoki parol xato".to_string())),
        };
        if !user.is_active {
            return Err(Error::BadRequest("Foydalanuvchi nofaol".to_string()));
        }

        Ok(LoginResponse {
            access: access_token(&user)?,
            refresh: refresh_token(&user)?,
            user: UserView::from(&user),
        })
    }

    pub async fn refresh(&self, refresh: &str) -> Result<AccessResponse> {
        let claims = decode_token(refresh, &get_config().jwt_secret, TokenType::Refresh)?;
        let mut conn = self.pool.acquire().await?;
        let user = PgStore::new(&mut *conn)
            .find_user(claims.user_id()?)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| Error::Unauthorized("User not found or inactive".to_string()))?;
        Ok(AccessResponse {
            access: access_token(&user)?,
        })
    }

    pub async fn list(&self) -> Result<Vec<UserView>> {
        let mut conn = self.pool.acquire().await?;
        let users = PgStore::new(&mut *conn).list_users(None).await?;
        Ok(users.iter().map(UserView::from).collect())
    }

    pub async fn get(&self, id: i64) -> Result<UserView> {
        let mut conn = self.pool.acquire().await?;
        let user = PgStore::new(&mut *conn)
            .find_user(id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
        Ok(UserView::from(&user))
    }

    /// Without a password the account is created but cannot log in.
    pub async fn create(&self, payload: CreateUserPayload) -> Result<UserView> {
        let mut conn = self.pool.acquire().await?;
        let mut store = PgStore::new(&mut *conn);
        let username = payload.username.trim().to_string();
        ensure_username_free(&mut store, &username, None).await?;
        ensure_group(&mut store, payload.group_id).await?;

        let hash = payload
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(hash_password)
            .transpose()?;
        let user = store
            .insert_user(
                &UserDraft {
                    username,
                    full_name: payload.full_name,
                    workplace: payload.workplace.unwrap_or_default(),
                    role: payload.role.unwrap_or(Role::Participant),
                    group_id: payload.group_id,
                    is_active: true,
                },
                hash.as_deref(),
            )
            .await?;
        Ok(UserView::from(&user))
    }

    /// The password is rehashed only when a non-empty one is given.
    pub async fn update(&self, id: i64, payload: UpdateUserPayload) -> Result<UserView> {
        let mut conn = self.pool.acquire().await?;
        let mut store = PgStore::new(&mut *conn);
        let current: User = store
            .find_user(id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

        let username = payload
            .username
            .map(|u| u.trim().to_string())
            .unwrap_or_else(|| current.username.clone());
        ensure_username_free(&mut store, &username, Some(id)).await?;
        let group_id = payload.group_id.unwrap_or(current.group_id);
        ensure_group(&mut store, group_id).await?;

        let hash = payload
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(hash_password)
            .transpose()?;
        let role = current.role();
        let user = store
            .update_user(
                id,
                &UserDraft {
                    username,
                    full_name: payload.full_name.unwrap_or(current.full_name),
                    workplace: payload.workplace.unwrap_or(current.workplace),
                    role: payload.role.unwrap_or(role),
                    group_id,
                    is_active: payload.is_active.unwrap_or(current.is_active),
                },
                hash.as_deref(),
            )
            .await?;
        Ok(UserView::from(&user))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if PgStore::new(&mut *conn).delete(EntityKind::User, id).await? {
            Ok(())
        } else {
            Err(Error::NotFound("User not found".to_string()))
        }
    }
}
