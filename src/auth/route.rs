use super::session::AuthSession;

/// Pages of the monitoring front end and who may open them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Users,
    UpdateUser(String),
    Monitoring,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Users => "/admin/user-management".to_string(),
            Route::UpdateUser(user_id) => format!("/update-user/{user_id}"),
            Route::Monitoring => "/monitoring".to_string(),
        }
    }

    /// Unknown paths land on the login page.
    pub fn from_path(path: &str) -> Route {
        let path = path.trim_end_matches('/');
        match path {
            "" | "/login" => Route::Login,
            "/register" => Route::Register,
            "/admin/user-management" => Route::Users,
            "/monitoring" => Route::Monitoring,
            other => match other.strip_prefix("/update-user/") {
                Some(user_id) if !user_id.is_empty() && !user_id.contains('/') => {
                    Route::UpdateUser(user_id.to_string())
                }
                _ => Route::Login,
            },
        }
    }

    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Route::Register | Route::Users | Route::UpdateUser(_)
        )
    }

    pub fn allows(&self, session: &AuthSession) -> bool {
        match self {
            Route::Login => true,
            Route::Monitoring => session.is_authenticated(),
            _ => session.is_admin(),
        }
    }

    /// Where a session lands when it asks for this route. Anonymous sessions
    /// go to the login page, signed-in users without the admin role go to the
    /// dashboard.
    pub fn resolve(self, session: &AuthSession) -> Route {
        if self.allows(session) {
            self
        } else if session.is_authenticated() {
            Route::Monitoring
        } else {
            Route::Login
        }
    }
}
