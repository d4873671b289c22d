use crate::commands::{open_cache, Out};
use crate::session::{AuthUser, Session};
use crate::{Config, Result};
use serde::Serialize;

/// What `viccoin session show` reports. The token itself is never printed.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub logged_in: bool,
    pub user: Option<AuthUser>,
}

/// Stores `token` (and optionally who it belongs to) in the local cache.
pub async fn set_token(config: &Config, token: &str, user: Option<AuthUser>) -> Result<Out<()>> {
    if token.trim().is_empty() {
        anyhow::bail!("The token is empty");
    }
    let cache = open_cache(config);
    Session::new(token.trim(), user).save(cache.as_ref()).await?;
    Ok("The token has been stored".into())
}

pub async fn show_session(config: &Config) -> Result<Out<SessionInfo>> {
    let cache = open_cache(config);
    let session = Session::load(cache.as_ref()).await?;
    let info = SessionInfo {
        logged_in: session.token().is_some(),
        user: session.user().cloned(),
    };
    let message = match (info.logged_in, session.user_id()) {
        (true, Some(id)) => format!("Logged in as user {id}"),
        (true, None) => "Logged in".to_string(),
        (false, _) => "Not logged in".to_string(),
    };
    Ok(Out::new(message, info))
}

/// Forgets the stored token and user.
pub async fn clear_session(config: &Config) -> Result<Out<()>> {
    let cache = open_cache(config);
    Session::clear(cache.as_ref()).await?;
    Ok("Logged out".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_set_show_clear() {
        let env = TestEnv::new().await;
        let config = env.config();
        assert!(!show_session(&config).await.unwrap().structure().unwrap().logged_in);

        let user = AuthUser {
            id: Some("7".into()),
            ..AuthUser::default()
        };
        set_token(&config, " abc ", Some(user)).await.unwrap();
        let shown = show_session(&config).await.unwrap();
        assert_eq!(shown.message(), "Logged in as user 7");

        clear_session(&config).await.unwrap();
        assert!(!show_session(&config).await.unwrap().structure().unwrap().logged_in);
    }

    #[tokio::test]
    async fn test_empty_token_rejected() {
        let env = TestEnv::new().await;
        assert!(set_token(&env.config(), "  ", None).await.is_err());
    }
}
