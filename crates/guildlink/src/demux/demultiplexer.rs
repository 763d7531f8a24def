//! Event demultiplexer
//!
//! Fans each decoded event out to the registrations for its name and, when
//! event channels are active, to the channel handed out for that name.
//!
//! `trigger` is called from the single intake task, so registrations see
//! events in the order their shard produced them. Middlewares run inline;
//! each registration's handler chain runs in its own task, handlers within
//! the chain in order.

use super::controller::Controller;
use super::registration::{Listener, Registration, RegistrationError};
use dashmap::DashMap;
use futures::FutureExt;
use guildlink_core::{EventName, GatewayEvent};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

/// Event channel misuse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("event channels are not activated")]
    Disabled,

    #[error("event channel for {0} was already taken")]
    AlreadyTaken(EventName),
}

/// Routes events to handlers and channels
pub struct EventDemultiplexer<S> {
    registrations: DashMap<EventName, Vec<Arc<Registration<S>>>>,
    next_id: AtomicU64,
    /// `None` unless event channels are activated
    channel_size: Option<usize>,
    channels: DashMap<EventName, mpsc::Sender<Arc<GatewayEvent>>>,
}

impl<S> EventDemultiplexer<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// `channel_size` activates event channels with that capacity
    pub fn new(channel_size: Option<usize>) -> Self {
        Self {
            registrations: DashMap::new(),
            next_id: AtomicU64::new(1),
            channel_size: channel_size.map(|size| size.max(1)),
            channels: DashMap::new(),
        }
    }

    /// Validate `listeners` and append them as one registration
    ///
    /// Returns the registration id.
    pub fn register(
        &self,
        event: EventName,
        listeners: Vec<Listener<S>>,
    ) -> Result<u64, RegistrationError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registration = Arc::new(Registration::new(id, event, listeners)?);
        if let Some(controller) = &registration.controller {
            controller.on_insert();
        }

        debug!(event = %event, id, handlers = registration.handlers.len(), "Registered handlers");
        self.registrations.entry(event).or_default().push(registration);
        Ok(id)
    }

    /// Remove a registration; false when unknown
    pub fn deregister(&self, event: EventName, id: u64) -> bool {
        let removed = {
            let Some(mut registrations) = self.registrations.get_mut(&event) else {
                return false;
            };
            let position = registrations.iter().position(|r| r.id == id);
            position.map(|index| registrations.remove(index))
        };

        match removed {
            Some(registration) => {
                if let Some(controller) = &registration.controller {
                    controller.on_remove();
                }
                self.registrations.remove_if(&event, |_, regs| regs.is_empty());
                debug!(event = %event, id, "Removed registration");
                true
            }
            None => false,
        }
    }

    pub fn registration_count(&self, event: EventName) -> usize {
        self.registrations.get(&event).map_or(0, |r| r.len())
    }

    pub fn has_handlers(&self, event: EventName) -> bool {
        self.registration_count(event) > 0
    }

    /// Receiver for every `event`, handed out once
    pub fn event_channel(
        &self,
        event: EventName,
    ) -> Result<mpsc::Receiver<Arc<GatewayEvent>>, ChannelError> {
        let size = self.channel_size.ok_or(ChannelError::Disabled)?;
        match self.channels.entry(event) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(ChannelError::AlreadyTaken(event)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let (tx, rx) = mpsc::channel(size);
                slot.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Deliver one event
    pub fn trigger(&self, session: &S, event: Arc<GatewayEvent>) {
        let name = event.name();
        self.forward_to_channel(name, &event);

        let registrations = match self.registrations.get(&name) {
            Some(regs) => regs.clone(),
            None => {
                trace!(event = %name, "No handlers registered");
                return;
            }
        };

        for registration in registrations {
            if registration.is_dead() {
                self.deregister(name, registration.id);
                continue;
            }
            if !registration.accepts(&event) {
                trace!(event = %name, id = registration.id, "Skipped by middleware");
                continue;
            }
            if let Some(controller) = &registration.controller {
                controller.update();
                if controller.is_dead() {
                    self.deregister(name, registration.id);
                }
            }

            tokio::spawn(run_chain(
                Arc::clone(&registration),
                session.clone(),
                Arc::clone(&event),
            ));
        }
    }

    fn forward_to_channel(&self, name: EventName, event: &Arc<GatewayEvent>) {
        let Some(tx) = self.channels.get(&name).map(|tx| tx.clone()) else {
            return;
        };
        match tx.try_send(Arc::clone(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(event = %name, "Event channel full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(event = %name, "Event channel receiver dropped");
                self.channels.remove(&name);
            }
        }
    }
}

/// Run a registration's handlers in order
///
/// Errors and panics are logged; a failing handler does not stop the ones
/// after it.
async fn run_chain<S>(registration: Arc<Registration<S>>, session: S, event: Arc<GatewayEvent>)
where
    S: Clone + Send + Sync + 'static,
{
    for (index, handler) in registration.handlers.iter().enumerate() {
        let call = handler(session.clone(), Arc::clone(&event));
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                event = %registration.event,
                id = registration.id,
                handler = index,
                error = %e,
                "Handler failed"
            ),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(
                    event = %registration.event,
                    id = registration.id,
                    handler = index,
                    panic = %message,
                    "Handler panicked"
                );
            }
        }
    }
}

impl<S> std::fmt::Debug for EventDemultiplexer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDemultiplexer")
            .field("events", &self.registrations.len())
            .field("channels", &self.channels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::Ctrl;
    use guildlink_core::events::{MessageCreate, TypingStart};
    use guildlink_core::{Message, Snowflake};
    use std::time::Duration;

    type Demux = EventDemultiplexer<mpsc::UnboundedSender<u32>>;

    fn message_event(channel: u64) -> Arc<GatewayEvent> {
        let message = Message {
            channel_id: Snowflake::new(channel),
            ..Message::default()
        };
        Arc::new(GatewayEvent::MessageCreate(MessageCreate { message }))
    }

    /// Handler reporting `tag` through the session sender
    fn reporter(tag: u32) -> Listener<mpsc::UnboundedSender<u32>> {
        Listener::handler(move |tx: mpsc::UnboundedSender<u32>, _event| async move {
            let _ = tx.send(tag);
            Ok(())
        })
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<u32>) -> Vec<u32> {
        let mut seen = Vec::new();
        while let Ok(Some(tag)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            seen.push(tag);
        }
        seen
    }

    #[tokio::test]
    async fn test_controller_limits_calls() {
        let demux = Demux::new(None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        demux
            .register(
                EventName::MessageCreate,
                vec![reporter(1), Listener::controller(Ctrl::calls(2))],
            )
            .unwrap();

        for _ in 0..3 {
            demux.trigger(&tx, message_event(1));
        }

        assert_eq!(drain(&mut rx).await, vec![1, 1]);
        assert_eq!(demux.registration_count(EventName::MessageCreate), 0);
    }

    #[tokio::test]
    async fn test_middleware_short_circuits() {
        let demux = Demux::new(None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        demux
            .register(
                EventName::MessageCreate,
                vec![
                    Listener::middleware(|event| {
                        matches!(event, GatewayEvent::MessageCreate(m) if m.message.channel_id == Snowflake::new(7))
                    }),
                    reporter(7),
                    Listener::controller(Ctrl::calls(1)),
                ],
            )
            .unwrap();

        // Filtered events do not charge the controller
        demux.trigger(&tx, message_event(1));
        demux.trigger(&tx, message_event(7));
        demux.trigger(&tx, message_event(7));

        assert_eq!(drain(&mut rx).await, vec![7]);
    }

    #[tokio::test]
    async fn test_chain_runs_in_order_and_survives_failures() {
        let demux = Demux::new(None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        demux
            .register(
                EventName::MessageCreate,
                vec![
                    reporter(1),
                    Listener::handler(|_tx, _event| async { Err(anyhow::anyhow!("boom")) }),
                    Listener::handler(|_tx, event: Arc<GatewayEvent>| async move {
                        assert!(event.guild_id().is_some(), "handler panic");
                        Ok(())
                    }),
                    reporter(2),
                ],
            )
            .unwrap();

        demux.trigger(&tx, message_event(1));
        assert_eq!(drain(&mut rx).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_only_matching_event_triggers() {
        let demux = Demux::new(None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        demux.register(EventName::TypingStart, vec![reporter(3)]).unwrap();

        demux.trigger(&tx, message_event(1));
        demux.trigger(&tx, Arc::new(GatewayEvent::TypingStart(TypingStart::default())));

        assert_eq!(drain(&mut rx).await, vec![3]);
    }

    #[tokio::test]
    async fn test_deregister() {
        let demux = Demux::new(None);
        let id = demux.register(EventName::MessageCreate, vec![reporter(1)]).unwrap();
        assert!(demux.has_handlers(EventName::MessageCreate));
        assert!(demux.deregister(EventName::MessageCreate, id));
        assert!(!demux.deregister(EventName::MessageCreate, id));
        assert!(!demux.has_handlers(EventName::MessageCreate));
    }

    #[tokio::test]
    async fn test_event_channel_drops_when_full() {
        let demux = Demux::new(Some(1));
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut events = demux.event_channel(EventName::MessageCreate).unwrap();
        assert_eq!(
            demux.event_channel(EventName::MessageCreate).unwrap_err(),
            ChannelError::AlreadyTaken(EventName::MessageCreate)
        );

        demux.trigger(&tx, message_event(1));
        demux.trigger(&tx, message_event(2));

        let first = events.recv().await.unwrap();
        assert!(matches!(&*first, GatewayEvent::MessageCreate(m) if m.message.channel_id == Snowflake::new(1)));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_event_channels_disabled() {
        let demux = Demux::new(None);
        assert_eq!(
            demux.event_channel(EventName::Ready).unwrap_err(),
            ChannelError::Disabled
        );
    }
}
