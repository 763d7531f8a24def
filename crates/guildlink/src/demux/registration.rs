//! Handler registrations
//!
//! `on` takes a flat list of listeners: middlewares first, then handlers,
//! then at most one controller. The order is checked when registering.

use super::controller::Controller;
use futures::future::BoxFuture;
use guildlink_common::ErrorKind;
use guildlink_core::{EventName, GatewayEvent};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Boxed future returned by handlers
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Event handler; receives the session it was triggered from and the event
pub type Handler<S> = Arc<dyn Fn(S, Arc<GatewayEvent>) -> HandlerFuture + Send + Sync>;

/// Predicate run before the handlers; `false` skips the registration
pub type Middleware = Arc<dyn Fn(&GatewayEvent) -> bool + Send + Sync>;

/// One argument to `on`
pub enum Listener<S> {
    Middleware(Middleware),
    Handler(Handler<S>),
    Controller(Arc<dyn Controller>),
}

impl<S> Listener<S> {
    pub fn handler<F, Fut>(f: F) -> Self
    where
        F: Fn(S, Arc<GatewayEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::Handler(Arc::new(move |session, event| Box::pin(f(session, event))))
    }

    pub fn middleware<F>(f: F) -> Self
    where
        F: Fn(&GatewayEvent) -> bool + Send + Sync + 'static,
    {
        Self::Middleware(Arc::new(f))
    }

    pub fn controller(controller: impl Controller + 'static) -> Self {
        Self::Controller(Arc::new(controller))
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Middleware(_) => "middleware",
            Self::Handler(_) => "handler",
            Self::Controller(_) => "controller",
        }
    }
}

impl<S> fmt::Debug for Listener<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Malformed listener list
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("{0} registration has no handlers")]
    NoHandlers(EventName),

    #[error("{event}: middleware at position {position} follows a handler")]
    MiddlewareAfterHandler { event: EventName, position: usize },

    #[error("{event}: controller at position {position} must be the last argument")]
    ControllerNotLast { event: EventName, position: usize },
}

impl RegistrationError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Usage
    }
}

/// Validated registration for one event
pub struct Registration<S> {
    pub(crate) id: u64,
    pub(crate) event: EventName,
    pub(crate) middlewares: Vec<Middleware>,
    pub(crate) handlers: Vec<Handler<S>>,
    pub(crate) controller: Option<Arc<dyn Controller>>,
}

impl<S> Registration<S> {
    pub(crate) fn new(
        id: u64,
        event: EventName,
        listeners: Vec<Listener<S>>,
    ) -> Result<Self, RegistrationError> {
        let total = listeners.len();
        let mut middlewares = Vec::new();
        let mut handlers = Vec::new();
        let mut controller = None;

        for (position, listener) in listeners.into_iter().enumerate() {
            match listener {
                Listener::Middleware(m) => {
                    if !handlers.is_empty() {
                        return Err(RegistrationError::MiddlewareAfterHandler { event, position });
                    }
                    middlewares.push(m);
                }
                Listener::Handler(h) => handlers.push(h),
                Listener::Controller(c) => {
                    if position + 1 != total {
                        return Err(RegistrationError::ControllerNotLast { event, position });
                    }
                    controller = Some(c);
                }
            }
        }

        if handlers.is_empty() {
            return Err(RegistrationError::NoHandlers(event));
        }

        Ok(Self {
            id,
            event,
            middlewares,
            handlers,
            controller,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn event(&self) -> EventName {
        self.event
    }

    pub(crate) fn accepts(&self, event: &GatewayEvent) -> bool {
        self.middlewares.iter().all(|m| m(event))
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.controller.as_ref().is_some_and(|c| c.is_dead())
    }
}

impl<S> fmt::Debug for Registration<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("middlewares", &self.middlewares.len())
            .field("handlers", &self.handlers.len())
            .field("controlled", &self.controller.is_some())
            .finish()
    }
}
