//! Session idle tracking over D-Bus
//!
//! Screen savers announce lock/unlock through an `ActiveChanged(b)` signal
//! on the session bus (`org.gnome.ScreenSaver` on GNOME). The subscription
//! turns those signals into [`IdleEvent`]s and silently drops everything
//! else the match rule lets through.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{Stream, StreamExt};
use thiserror::Error;

/// Signal member announcing a screen saver state change
pub const ACTIVE_CHANGED: &str = "ActiveChanged";

/// Normalized `ActiveChanged` transition
///
/// `is_active` is the boolean carried by the signal. The agent records
/// presence on `false` and only logs `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleEvent {
    pub is_active: bool,
}

/// Session bus errors
#[derive(Error, Debug)]
pub enum IdleError {
    #[error("session bus unavailable: {0}")]
    Bus(#[from] zbus::Error),
}

/// Filter one raw signal
///
/// `first_arg` is `Some` only when the first signal argument is a boolean.
pub fn classify_signal(member: Option<&str>, first_arg: Option<bool>) -> Option<IdleEvent> {
    if member != Some(ACTIVE_CHANGED) {
        return None;
    }
    first_arg.map(|is_active| IdleEvent { is_active })
}

fn event_from_message(msg: &zbus::Message) -> Option<IdleEvent> {
    let header = msg.header();
    let member = header.member().map(|m| m.as_str());
    let first_arg = first_bool_arg(msg);

    let event = classify_signal(member, first_arg);
    if event.is_none() {
        tracing::debug!("Ignoring bus signal {:?}", member);
    }
    event
}

/// First body argument, if it is a boolean; trailing arguments are ignored
fn first_bool_arg(msg: &zbus::Message) -> Option<bool> {
    let body = msg.body();
    let args: zbus::zvariant::Structure<'_> = body.deserialize().ok()?;
    match args.fields().first() {
        Some(zbus::zvariant::Value::Bool(value)) => Some(*value),
        _ => None,
    }
}

/// Screen saver signal source on the session bus
#[derive(Debug, Clone)]
pub struct IdleEventSource {
    interface: String,
}

impl IdleEventSource {
    /// Watch signals of the given D-Bus interface
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Connect to the session bus and register the signal match
    ///
    /// The subscription lives until it is dropped; there is no explicit
    /// unsubscribe.
    pub async fn subscribe(&self) -> Result<IdleSubscription, IdleError> {
        let connection = zbus::Connection::session().await?;

        let rule = zbus::MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .interface(self.interface.as_str())?
            .build();
        let messages = zbus::MessageStream::for_match_rule(rule, &connection, Some(64)).await?;

        tracing::info!("Listening for {} signals on the session bus", self.interface);

        Ok(IdleSubscription {
            messages: messages.boxed(),
            _connection: connection,
        })
    }
}

/// Stream of [`IdleEvent`]s from the session bus
pub struct IdleSubscription {
    messages: Pin<Box<dyn Stream<Item = zbus::Result<zbus::Message>> + Send>>,
    _connection: zbus::Connection,
}

impl Stream for IdleSubscription {
    type Item = IdleEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<IdleEvent>> {
        loop {
            match self.messages.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(msg))) => {
                    if let Some(event) = event_from_message(&msg) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    tracing::warn!("Dropping malformed bus message: {}", e);
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal<B>(member: &str, body: &B) -> zbus::Message
    where
        B: serde::Serialize + zbus::zvariant::DynamicType,
    {
        zbus::Message::signal("/org/gnome/ScreenSaver", "org.gnome.ScreenSaver", member)
            .unwrap()
            .build(body)
            .unwrap()
    }

    #[test]
    fn test_active_changed_bool_is_forwarded() {
        assert_eq!(
            classify_signal(Some("ActiveChanged"), Some(false)),
            Some(IdleEvent { is_active: false })
        );
        assert_eq!(
            classify_signal(Some("ActiveChanged"), Some(true)),
            Some(IdleEvent { is_active: true })
        );
    }

    #[test]
    fn test_other_members_are_dropped() {
        assert_eq!(classify_signal(Some("WakeUpScreen"), Some(true)), None);
        assert_eq!(classify_signal(Some("activechanged"), Some(false)), None);
        assert_eq!(classify_signal(None, Some(false)), None);
    }

    #[test]
    fn test_non_boolean_payload_is_dropped() {
        assert_eq!(classify_signal(Some("ActiveChanged"), None), None);
    }

    #[test]
    fn test_message_with_bool_body() {
        let msg = signal("ActiveChanged", &true);
        assert_eq!(
            event_from_message(&msg),
            Some(IdleEvent { is_active: true })
        );
    }

    #[test]
    fn test_message_with_string_body() {
        let msg = signal("ActiveChanged", &"locked");
        assert_eq!(event_from_message(&msg), None);
    }

    #[test]
    fn test_message_with_trailing_args() {
        let msg = signal("ActiveChanged", &(false, "session-1", 7u32));
        assert_eq!(
            event_from_message(&msg),
            Some(IdleEvent { is_active: false })
        );
    }

    #[test]
    fn test_message_with_bool_in_second_position() {
        let msg = signal("ActiveChanged", &("locked", true));
        assert_eq!(event_from_message(&msg), None);
    }

    #[test]
    fn test_message_with_empty_body() {
        let msg = signal("ActiveChanged", &());
        assert_eq!(event_from_message(&msg), None);
    }

    #[test]
    fn test_message_with_other_member() {
        let msg = signal("ActiveChangedLater", &false);
        assert_eq!(event_from_message(&msg), None);
    }
}
