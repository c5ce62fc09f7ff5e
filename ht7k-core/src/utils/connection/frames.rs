//! Command Frame Module
//!
//! Transports (websocket, serial line, test harness) hand raw frames to this
//! module. Frames are JSON-encoded `MotorCommand`s; decoded commands are pushed
//! onto `MOTOR_CHANNEL` for the `SystemController` task to execute. The
//! returned reply texts are meant to be echoed back to the sender.

use crate::utils::controllers::{MotorCommand, MOTOR_CHANNEL};

/// Reply for a frame that was decoded and queued.
pub const REPLY_FORWARDED: &str = "Motor command received and forwarded";
/// Reply for a frame that did not decode.
pub const REPLY_INVALID: &str = "Invalid command format";
/// Reply for a frame dropped because the command queue was full.
pub const REPLY_BUSY: &str = "Command queue full";

/// Reasons a frame was not queued by `try_forward`.
#[derive(Debug)]
pub enum ForwardError {
    Decode(serde_json::Error),
    QueueFull(MotorCommand),
}

impl ForwardError {
    /// Reply text for the sender.
    pub fn reply(&self) -> &'static str {
        match self {
            ForwardError::Decode(_) => REPLY_INVALID,
            ForwardError::QueueFull(_) => REPLY_BUSY,
        }
    }
}

/// Decode a text frame.
pub fn decode_text(data: &str) -> Result<MotorCommand, serde_json::Error> {
    serde_json::from_str::<MotorCommand>(data)
}

/// Decode a binary frame.
pub fn decode_binary(data: &[u8]) -> Result<MotorCommand, serde_json::Error> {
    serde_json::from_slice::<MotorCommand>(data)
}

/// Decode a frame and queue it, waiting for room on the channel.
///
/// Returns the reply text for the sender.
pub async fn forward(data: &[u8]) -> &'static str {
    match decode_binary(data) {
        Ok(command) => {
            MOTOR_CHANNEL.send(command).await;
            REPLY_FORWARDED
        }
        Err(error) => {
            tracing::error!(?error, "error deserializing MotorCommand");
            REPLY_INVALID
        }
    }
}

/// Decode a frame and queue it without waiting.
pub fn try_forward(data: &[u8]) -> Result<MotorCommand, ForwardError> {
    let command = decode_binary(data).map_err(|error| {
        tracing::error!(?error, "error deserializing MotorCommand");
        ForwardError::Decode(error)
    })?;
    MOTOR_CHANNEL.try_send(command).map_err(|_| {
        tracing::warn!(?command, "command queue full, frame dropped");
        ForwardError::QueueFull(command)
    })?;
    Ok(command)
}
