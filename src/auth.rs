use async_trait::async_trait;
use pgwire::api::ClientInfo;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};

use crate::limits::MAX_NAME_LEN;

/// One shared password for every login. The login name is the identity:
/// it selects the user a session acts as.
#[derive(Debug)]
pub struct StaybookAuthSource {
    password: String,
}

impl StaybookAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for StaybookAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        match login.user() {
            Some(user) if !user.is_empty() && user.len() <= MAX_NAME_LEN => {
                Ok(Password::new(None, self.password.as_bytes().to_vec()))
            }
            _ => Err(login_err("login name missing or too long".into())),
        }
    }
}

/// Login name of the session, as sent in the startup packet.
pub fn session_username<C: ClientInfo>(client: &C) -> PgWireResult<&str> {
    client
        .metadata()
        .get("user")
        .map(String::as_str)
        .ok_or_else(|| login_err("no login name on session".into()))
}

pub(crate) fn login_err(msg: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "28000".into(),
        msg,
    )))
}
