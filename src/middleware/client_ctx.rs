use crate::db::get_db_pool;
use crate::role::{Requester, Role};
use crate::user::Profile;
use actix_session::Session;
use actix_web::dev::{
    self, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{error, web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Client data resolved once at the start of a request cycle.
/// Distinct from ClientCtx because it is defined through request data.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    /// User data. Optional. None is a guest user.
    pub client: Option<Profile>,
    /// The caller's role, resolved from group membership with the
    /// Manager > Agent > Student precedence. Guests fall back to Student,
    /// which only matters after a login check has already passed.
    pub role: Role,
    /// CSRF token for form protection.
    pub csrf_token: String,
    /// Time the request started for page load statistics.
    pub request_start: Instant,
}

impl Default for ClientCtxInner {
    fn default() -> Self {
        Self {
            client: None,
            role: Role::resolve::<&str>(&[]),
            csrf_token: String::new(), // Will be populated from session
            request_start: Instant::now(),
        }
    }
}

impl ClientCtxInner {
    pub async fn from_session(session: &Session) -> Self {
        use crate::group::get_group_names_for_user;
        use crate::middleware::csrf::get_or_create_csrf_token;
        use crate::session::authenticate_client_by_session;

        let db = get_db_pool();
        let client = authenticate_client_by_session(session).await;

        let role = match &client {
            Some(profile) => match get_group_names_for_user(db, profile.id).await {
                Ok(names) => Role::resolve(&names),
                Err(err) => {
                    log::error!("Failed to load groups for user {}: {}", profile.id, err);
                    Role::resolve::<&str>(&[])
                }
            },
            None => Role::resolve::<&str>(&[]),
        };

        // Get or create CSRF token for this session
        let csrf_token = get_or_create_csrf_token(session).unwrap_or_else(|_| String::new());

        ClientCtxInner {
            client,
            role,
            csrf_token,
            ..Default::default()
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug)]
pub struct ClientCtx(Data<ClientCtxInner>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self(Data::new(ClientCtxInner::default()))
    }
}

impl ClientCtx {
    /// Returns instance of Self with components required for ClientCtxInner.
    pub async fn from_session(session: &Session) -> Self {
        Self(Data::new(ClientCtxInner::from_session(session).await))
    }

    pub fn get_or_default_from_extensions(extensions: &mut Extensions) -> Self {
        match extensions.get::<Data<ClientCtxInner>>() {
            // Existing record in extensions; pull it and return clone.
            Some(cbox) => Self(cbox.clone()),
            // No existing record; create and insert it.
            None => {
                let cbox = Data::new(ClientCtxInner::default());
                extensions.insert(cbox.clone());
                Self(cbox)
            }
        }
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<i32> {
        self.0.client.as_ref().map(|u| u.id)
    }

    /// Returns either the user's name or the word for guest.
    pub fn get_name(&self) -> String {
        match &self.0.client {
            Some(user) => user.name.to_owned(),
            None => crate::constants::GUEST_USERNAME.to_owned(),
        }
    }

    pub fn get_user(&self) -> Option<&Profile> {
        self.0.client.as_ref()
    }

    pub fn get_csrf_token(&self) -> &str {
        &self.0.csrf_token
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn is_user(&self) -> bool {
        self.0.client.is_some()
    }

    pub fn is_manager(&self) -> bool {
        self.is_user() && self.0.role.is_manager()
    }

    pub fn is_agent(&self) -> bool {
        self.is_user() && self.0.role.is_agent()
    }

    pub fn is_student(&self) -> bool {
        self.is_user() && self.0.role.is_student()
    }

    /// Require user to be logged in. Returns user_id or ErrorUnauthorized.
    pub fn require_login(&self) -> Result<i32, Error> {
        self.get_id()
            .ok_or_else(|| error::ErrorUnauthorized("Login required"))
    }

    /// The identity lifecycle operations act on behalf of, or
    /// ErrorUnauthorized for guests.
    pub fn require_requester(&self) -> Result<Requester, Error> {
        Ok(Requester::new(self.require_login()?, self.0.role))
    }

    /// Require the Manager role. Returns user_id or a forbidden error.
    pub fn require_manager(&self) -> Result<i32, Error> {
        let id = self.require_login()?;
        if !self.0.role.is_manager() {
            return Err(error::ErrorForbidden("Managers only."));
        }
        Ok(id)
    }

    /// Returns Duration representing request time.
    pub fn request_time(&self) -> Duration {
        Instant::now() - self.0.request_start
    }

    /// Returns human readable representing request time.
    pub fn request_time_as_string(&self) -> String {
        let us = self.request_time().as_micros();
        if us > 5000 {
            format!("{}ms", us / 1000)
        } else {
            format!("{}us", us)
        }
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(ClientCtx::get_or_default_from_extensions(
            &mut req.extensions_mut(),
        )))
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ClientCtxMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ClientCtxMiddleware {
            service: Rc::new(service),
        }))
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        // Borrows of `req` must be done in a precise way to avoid conflicts.
        // This order is important.
        let (httpreq, payload) = req.into_parts();
        let session = Session::extract(&httpreq).into_inner();
        let req = ServiceRequest::from_parts(httpreq, payload);

        Box::pin(async move {
            match session {
                Ok(session) => {
                    req.extensions_mut()
                        .insert(Data::new(ClientCtxInner::from_session(&session).await));
                }
                Err(err) => {
                    log::error!("Unable to extract Session data in middleware: {}", err);
                }
            };

            svc.call(req).await
        })
    }
}
