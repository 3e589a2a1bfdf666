//! Authenticator — credential resolution and login orchestration.

use frontdesk_core::error::{FrontdeskError, FrontdeskResult};
use frontdesk_core::store::UserRepository;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token;

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    /// Signed JWT access token.
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// The normalized actor extracted from a verified credential — what
/// request handlers pass on to the permission resolver.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub actor_id: Uuid,
    /// Group hint carried by the token; advisory only. Resolution
    /// always reads the store's current group assignment.
    pub group_id: Option<Uuid>,
}

/// Authentication service.
///
/// Generic over the user repository so that the auth layer has no
/// dependency on the database crate.
pub struct Authenticator<U: UserRepository> {
    users: U,
    config: AuthConfig,
}

impl<U: UserRepository> Authenticator<U> {
    pub fn new(users: U, config: AuthConfig) -> Self {
        Self { users, config }
    }

    /// Authenticate with username/email + password and issue a token.
    pub async fn login(&self, input: LoginInput) -> FrontdeskResult<LoginOutput> {
        // 1. Look up user — try username first, then email.
        let user = match self
            .users
            .get_by_username(&input.username_or_email)
            .await
        {
            Ok(u) => u,
            Err(FrontdeskError::NotFound { .. }) => self
                .users
                .get_by_email(&input.username_or_email)
                .await
                .map_err(|_| AuthError::InvalidCredentials)?,
            Err(e) => return Err(e),
        };

        // 2. Verify password.
        let valid = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;

        if !valid {
            return Err(AuthError::InvalidCredentials.into());
        }

        // 3. Deactivated accounts cannot log in.
        if !user.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        // 4. Issue JWT access token.
        let access_token = token::issue_access_token(user.id, user.group_id, &self.config)?;

        Ok(LoginOutput {
            access_token,
            expires_in: self.config.access_token_lifetime_secs,
        })
    }

    /// Resolve a bearer token into an [`ActorContext`].
    ///
    /// Stateless: verifies signature, expiry, and issuer, then parses
    /// the claims. No store lookup is performed here; fetching the
    /// actor's current state is the resolver's job.
    pub fn resolve(&self, bearer_token: &str) -> FrontdeskResult<ActorContext> {
        let claims = token::validate_access_token(bearer_token, &self.config)?.0;

        let actor_id = Uuid::parse_str(&claims.sub)
            .map_err(|e| AuthError::TokenInvalid(format!("bad subject: {e}")))?;
        let group_id = claims
            .group_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| AuthError::TokenInvalid(format!("bad group hint: {e}")))?;

        Ok(ActorContext { actor_id, group_id })
    }
}
