//! Message dispatcher
//!
//! Turns each inbound message into an output decision. Parsing is
//! deliberately permissive: text without a leading integer counts as zero,
//! which switches the output off rather than leaving it as it was.

use crate::actuator::{Actuator, OutputLevel};
use tracing::info;

/// Decode a payload byte-for-byte, one character per byte
pub fn decode_payload(payload: &[u8]) -> String {
    payload.iter().map(|&b| char::from(b)).collect()
}

/// Parse the leading integer of `text`
///
/// Leading whitespace is skipped, one optional sign is accepted, and digits
/// are read up to the first non-digit. Anything else yields 0. Values beyond
/// the `i64` range saturate.
pub fn parse_leading_int(text: &str) -> i64 {
    let trimmed = text.trim_start_matches([' ', '\t', '\n', '\r', '\x0b', '\x0c']);

    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for digit in digits.bytes().take_while(u8::is_ascii_digit) {
        let digit = i64::from(digit - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }
    value
}

/// Map a parsed value to an output level
pub fn decide(value: i64, threshold: i64) -> OutputLevel {
    if value >= threshold {
        OutputLevel::On
    } else {
        OutputLevel::Off
    }
}

/// Sole writer of the output line
pub struct Dispatcher<A> {
    actuator: A,
    threshold: i64,
}

impl<A: Actuator> Dispatcher<A> {
    pub fn new(actuator: A, threshold: i64) -> Self {
        Self {
            actuator,
            threshold,
        }
    }

    /// Drive the output to its power-on level
    pub fn initialize_output(&mut self) {
        self.actuator.set_output(OutputLevel::Off);
    }

    /// Handle one message from the subscribed topic
    pub fn on_message(&mut self, topic: &str, payload: &[u8]) -> OutputLevel {
        let _span = crate::dispatch_span!(topic = %topic).entered();

        let message = decode_payload(payload);
        info!(topic = %topic, message = %message, "Message arrived");

        let value = parse_leading_int(&message);
        let level = decide(value, self.threshold);
        self.actuator.set_output(level);

        info!(value, threshold = self.threshold, "LED {}", level);
        level
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }
}
