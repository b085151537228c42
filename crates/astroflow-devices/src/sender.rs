/*!
 * Outbound message sinks.
 *
 * Devices never talk to the transport directly; they hand [`OutboundMessage`]s
 * to a [`MessageSender`] supplied by the owner of the handler.
 */
use std::fmt::Debug;

use tokio::sync::mpsc;
use tracing::trace;

use crate::device::{DeviceError, Result};
use crate::protocol::OutboundMessage;

/// Sink for messages addressed to the INDI server
pub trait MessageSender: Send + Sync + Debug {
    /// Send one message
    fn send_message(&self, message: OutboundMessage) -> Result<()>;
}

/// A sender that discards every message
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSender;

impl MessageSender for NullSender {
    fn send_message(&self, message: OutboundMessage) -> Result<()> {
        trace!(?message, "Discarding outbound message");
        Ok(())
    }
}

/// A sender that forwards messages over an unbounded `tokio` channel
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelSender {
    /// Create a sender and the receiving end the transport reads from
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSender for ChannelSender {
    fn send_message(&self, message: OutboundMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|e| DeviceError::Send(format!("outbound channel closed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sender_delivers_in_order() {
        let (sender, mut rx) = ChannelSender::new();
        sender
            .send_message(OutboundMessage::GetProperties {
                device: None,
                property: None,
            })
            .unwrap();
        sender
            .send_message(OutboundMessage::GetProperties {
                device: Some("CCD Simulator".to_string()),
                property: None,
            })
            .unwrap();

        assert_eq!(tokio_test::block_on(rx.recv()).unwrap().device(), None);
        assert_eq!(tokio_test::block_on(rx.recv()).unwrap().device(), Some("CCD Simulator"));
    }

    #[test]
    fn test_channel_sender_reports_closed_channel() {
        let (sender, rx) = ChannelSender::new();
        drop(rx);
        let result = sender.send_message(OutboundMessage::GetProperties {
            device: None,
            property: None,
        });
        assert!(matches!(result, Err(DeviceError::Send(_))));
    }

    #[test]
    fn test_null_sender_accepts_everything() {
        assert!(NullSender
            .send_message(OutboundMessage::GetProperties {
                device: None,
                property: None,
            })
            .is_ok());
    }
}
