//! PTY channel for interactive device sessions.

use std::time::Duration;

use bytes::Bytes;
use log::trace;
use regex::bytes::Regex;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};

use super::buffer::PatternBuffer;
use crate::error::TransportError;

/// Configuration for PTY channel behavior.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Upper bound on a single wait for a pattern.
    pub timeout: Duration,

    /// Search depth for pattern matching.
    pub search_depth: usize,

    /// Terminal width.
    pub terminal_width: u32,

    /// Terminal height.
    pub terminal_height: u32,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            search_depth: 1000,
            terminal_width: 511,
            terminal_height: 24,
        }
    }
}

/// Interactive shell channel with prompt-bounded reads.
pub struct PtyChannel {
    channel: Channel<Msg>,
    buffer: PatternBuffer,
    timeout: Duration,
}

impl PtyChannel {
    /// Wrap an open shell channel.
    pub fn new(channel: Channel<Msg>, config: &PtyConfig) -> Self {
        Self {
            channel,
            buffer: PatternBuffer::new(config.search_depth),
            timeout: config.timeout,
        }
    }

    /// Send one line of input (a newline is appended).
    pub async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.channel
            .data(&data[..])
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    /// Read until `pattern` appears in the tail of the output.
    ///
    /// Returns everything received since the previous read, prompt included.
    pub async fn read_until(&mut self, pattern: &Regex) -> Result<Bytes, TransportError> {
        let deadline = tokio::time::Instant::now() + self.timeout;

        loop {
            if self.buffer.tail_contains(pattern) {
                return Ok(self.buffer.take());
            }

            let msg = tokio::time::timeout_at(deadline, self.channel.wait())
                .await
                .map_err(|_| TransportError::Timeout(self.timeout))?;

            match msg {
                Some(ChannelMsg::Data { data }) => {
                    trace!("received {} bytes", data.len());
                    self.buffer.extend(&data);
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    self.buffer.extend(&data);
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(TransportError::Disconnected);
                }
                Some(_) => {}
            }
        }
    }

    /// Close the channel.
    pub async fn close(self) -> Result<(), TransportError> {
        self.channel.eof().await?;
        self.channel.close().await?;
        Ok(())
    }
}
