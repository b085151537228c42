//! Replays a recorded INDI session through a protocol handler and prints
//! every device event.
//!
//! Usage: `cargo run --example replay [session.json]`
//!
//! The session file is a JSON array of inbound messages. Without an argument
//! a short built-in camera session is replayed.

use std::sync::Arc;

use anyhow::Context;
use astroflow_core::event::SharedListener;
use astroflow_devices::{ChannelSender, DeviceEvent, DeviceProtocolHandler, Message};
use tracing::info;

const BUILTIN_SESSION: &str = r#"[
    { "type": "setVector", "device": "CCD Simulator", "name": "CCD_EXPOSURE", "state": "Busy",
      "elements": { "number": [ { "name": "CCD_EXPOSURE_VALUE", "value": 5.0 } ] } },
    { "type": "defVector", "device": "CCD Simulator", "name": "DRIVER_INFO", "permission": "ro",
      "elements": { "text": [
          { "name": "DRIVER_NAME", "value": "CCD Simulator" },
          { "name": "DRIVER_EXEC", "value": "indi_simulator_ccd" },
          { "name": "DRIVER_VERSION", "value": "1.0" },
          { "name": "DRIVER_INTERFACE", "value": "6" } ] } },
    { "type": "defVector", "device": "CCD Simulator", "name": "CONNECTION", "permission": "rw",
      "elements": { "switch": { "rule": "OneOfMany", "elements": [
          { "name": "CONNECT", "value": true },
          { "name": "DISCONNECT", "value": false } ] } } },
    { "type": "defVector", "device": "CCD Simulator", "name": "CCD_EXPOSURE", "permission": "rw", "state": "Idle",
      "elements": { "number": [
          { "name": "CCD_EXPOSURE_VALUE", "value": 0.0, "min": 0.001, "max": 3600.0, "step": 1.0 } ] } },
    { "type": "setVector", "device": "CCD Simulator", "name": "CCD_EXPOSURE", "state": "Busy",
      "elements": { "number": [ { "name": "CCD_EXPOSURE_VALUE", "value": 2.5 } ] } },
    { "type": "setVector", "device": "CCD Simulator", "name": "CCD_EXPOSURE", "state": "Ok",
      "elements": { "number": [ { "name": "CCD_EXPOSURE_VALUE", "value": 0.0 } ] } },
    { "type": "message", "device": "CCD Simulator", "message": "Exposure done, downloading image..." },
    { "type": "delProperty", "device": "CCD Simulator" }
]"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    astroflow_core::logging::init()?;

    let session = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?,
        None => BUILTIN_SESSION.to_string(),
    };
    let messages: Vec<Message> = serde_json::from_str(&session).context("decoding session")?;
    info!("Replaying {} messages", messages.len());

    let (sender, mut outbound) = ChannelSender::new();
    let handler = DeviceProtocolHandler::new(Arc::new(sender));

    let printer: SharedListener<DeviceEvent> = Arc::new(|event: &DeviceEvent| {
        println!("{:<24} {:<20} {:?}", event.event_type(), event.device_name().unwrap_or("-"), event);
    });
    handler.register_event_handler(printer)?;

    for message in messages {
        handler.handle(message);
    }

    if handler.pending_messages() > 0 {
        info!("{} messages still waiting for their device", handler.pending_messages());
    }

    handler.close();

    while let Ok(message) = outbound.try_recv() {
        println!("outbound: {:?}", message);
    }

    Ok(())
}
