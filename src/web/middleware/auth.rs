use salvo::http::cookie::{Cookie, SameSite};
use salvo::prelude::*;
use salvo::writing::Scribe;
use tracing::debug;

use crate::config::SessionConfig;
use crate::db::AdminUser;
use crate::web::{ApiError, web_state};

/// Depot key under which the authenticated admin is stored.
pub const ADMIN_KEY: &str = "admin_user";

fn same_site(session: &SessionConfig) -> SameSite {
    match session.same_site.to_ascii_lowercase().as_str() {
        "strict" => SameSite::Strict,
        "lax" => SameSite::Lax,
        _ => SameSite::None,
    }
}

pub fn session_cookie(session: &SessionConfig, token: String) -> Cookie<'static> {
    Cookie::build((session.cookie_name.clone(), token))
        .http_only(true)
        .path("/")
        .secure(session.secure)
        .same_site(same_site(session))
        .max_age(time::Duration::seconds(session.max_age_secs))
        .build()
}

pub fn expired_session_cookie(session: &SessionConfig) -> Cookie<'static> {
    Cookie::build((session.cookie_name.clone(), String::new()))
        .http_only(true)
        .path("/")
        .secure(session.secure)
        .same_site(same_site(session))
        .max_age(time::Duration::ZERO)
        .build()
}

pub fn session_token(req: &Request, session: &SessionConfig) -> Option<String> {
    req.cookie(&session.cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolves the session cookie to an active admin or stops the request
/// with 401.
#[handler]
pub async fn require_admin(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    let (auth, token) = match web_state(depot) {
        Ok(state) => (
            state.auth.clone(),
            session_token(req, &state.config.session),
        ),
        Err(err) => {
            err.render(res);
            ctrl.skip_rest();
            return;
        }
    };

    let Some(token) = token else {
        ApiError::unauthorized().render(res);
        ctrl.skip_rest();
        return;
    };

    match auth.authenticate(&token).await {
        Ok(Some(admin)) => {
            depot.insert(ADMIN_KEY, admin);
        }
        Ok(None) => {
            debug!("rejected admin request with unknown or expired session");
            ApiError::unauthorized().render(res);
            ctrl.skip_rest();
        }
        Err(err) => {
            ApiError::from(err).render(res);
            ctrl.skip_rest();
        }
    }
}

pub fn current_admin(depot: &Depot) -> Result<&AdminUser, ApiError> {
    depot
        .get::<AdminUser>(ADMIN_KEY)
        .map_err(|_| ApiError::unauthorized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_follows_config() {
        let session = SessionConfig {
            same_site: "Lax".to_string(),
            secure: false,
            ..SessionConfig::default()
        };

        let cookie = session_cookie(&session, "token-value".to_string());

        assert_eq!(cookie.name(), "admin_session");
        assert_eq!(cookie.value(), "token-value");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(604_800)));
    }

    #[test]
    fn expired_cookie_clears_value() {
        let cookie = expired_session_cookie(&SessionConfig::default());
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
    }
}
