use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::database::pg_store::PgStore;
use crate::database::store::EntityStore;
use crate::error::{Error, Result};
use crate::models::user::{Role, User};
use crate::utils::token::{decode_token, TokenType};
use crate::AppState;

/// The authenticated account, inserted by [`require_bearer_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn bearer_token(req: &Request) -> Result<&str> {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("Missing authorization header".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| Error::Unauthorized("Bad authorization header".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("Unsupported authorization scheme".to_string()))
}

async fn authenticate(state: &AppState, token: &str) -> Result<User> {
    let config = crate::config::get_config();
    let claims = decode_token(token, &config.jwt_secret, TokenType::Access)?;

    let mut conn = state.pool.acquire().await?;
    let user = PgStore::new(&mut *conn)
        .find_user(claims.user_id()?)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| Error::Unauthorized("User not found or inactive".to_string()))?;
    Ok(user)
}

pub async fn require_bearer_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = match bearer_token(&req) {
        Ok(token) => token.to_string(),
        Err(err) => return err.into_response(),
    };
    match authenticate(&state, &token).await {
        Ok(user) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

/// Allows `user` when its role is one of `allowed`.
pub fn authorize(user: &User, allowed: &[Role]) -> Result<()> {
    if allowed.contains(&user.role()) {
        Ok(())
    } else {
        Err(Error::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ))
    }
}

async fn require_roles(req: Request, next: Next, allowed: &[Role]) -> Response {
    let Some(CurrentUser(user)) = req.extensions().get::<CurrentUser>() else {
        return Error::Unauthorized("Authentication required".to_string()).into_response();
    };
    if let Err(err) = authorize(user, allowed) {
        return err.into_response();
    }
    next.run(req).await
}

pub async fn require_admin(req: Request, next: Next) -> Response {
    require_roles(req, next, &[Role::Admin]).await
}

pub async fn require_participant(req: Request, next: Next) -> Response {
    require_roles(req, next, &[Role::Participant]).await
}
