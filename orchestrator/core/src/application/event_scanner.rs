// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Event Scanner
//!
//! Follows one output stream of the sync engine. Every line is forwarded to a
//! [`LineSink`]; when hot reload is on, lines matching the trigger predicate
//! also produce a [`RestartTrigger`] for the restart coordinator.
//!
//! A scanner is single-use: it consumes the stream until EOF and then ends.
//! Killing the engine closes its pipes, which is how scanners are stopped.

use futures::{Stream, StreamExt};
use regex::Regex;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::SplitStream;
use tracing::{debug, error, info, trace, warn, Instrument};

/// One "the engine started transferring files" observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartTrigger;

/// Decides whether an output line is a restart trigger.
pub trait LinePredicate: Send + Sync {
    fn matches(&self, line: &str) -> bool;
}

/// Regex-backed trigger; the engine's default marker is `INFO  Sending`.
#[derive(Debug, Clone)]
pub struct PatternTrigger {
    pattern: Regex,
}

impl PatternTrigger {
    pub const DEFAULT_PATTERN: &'static str = "INFO  Sending";

    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Default for PatternTrigger {
    fn default() -> Self {
        Self {
            pattern: Regex::new(Self::DEFAULT_PATTERN).expect("default trigger pattern is valid"),
        }
    }
}

impl LinePredicate for PatternTrigger {
    fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }
}

/// Destination for forwarded engine output.
pub trait LineSink: Send + Sync {
    fn line(&self, line: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Forwards lines into `tracing` at a fixed level, tagged with the stream name.
#[derive(Debug, Clone)]
pub struct TracingSink {
    level: LogLevel,
    stream: &'static str,
}

impl TracingSink {
    pub fn new(level: LogLevel, stream: &'static str) -> Self {
        Self { level, stream }
    }

    pub fn stderr() -> Self {
        Self::new(LogLevel::Error, "stderr")
    }

    pub fn stdout() -> Self {
        Self::new(LogLevel::Debug, "stdout")
    }
}

impl LineSink for TracingSink {
    fn line(&self, line: &str) {
        match self.level {
            LogLevel::Error => error!(stream = self.stream, "{}", line),
            LogLevel::Warn => warn!(stream = self.stream, "{}", line),
            LogLevel::Info => info!(stream = self.stream, "{}", line),
            LogLevel::Debug => debug!(stream = self.stream, "{}", line),
            LogLevel::Trace => trace!(stream = self.stream, "{}", line),
        }
    }
}

/// Counters reported when a scanner reaches the end of its stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub lines: u64,
    pub triggers: u64,
}

struct Trigger {
    predicate: Arc<dyn LinePredicate>,
    signal: mpsc::Sender<RestartTrigger>,
}

pub struct EventScanner<R> {
    reader: R,
    sink: Arc<dyn LineSink>,
    trigger: Option<Trigger>,
}

impl<R> EventScanner<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R, sink: Arc<dyn LineSink>) -> Self {
        Self {
            reader,
            sink,
            trigger: None,
        }
    }

    /// Enable trigger detection. Only called when hot reload is on, so a
    /// scanner without a trigger can never signal a restart.
    pub fn with_trigger(
        mut self,
        predicate: Arc<dyn LinePredicate>,
        signal: mpsc::Sender<RestartTrigger>,
    ) -> Self {
        self.trigger = Some(Trigger { predicate, signal });
        self
    }

    /// Consume the stream until EOF.
    pub async fn run(self) -> ScanSummary {
        let mut summary = ScanSummary::default();
        let mut lines = Box::pin(lines(self.reader));

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!(error = %e, "stopped reading engine output");
                    break;
                }
            };
            summary.lines += 1;

            if let Some(trigger) = &self.trigger {
                if trigger.predicate.matches(&line) {
                    summary.triggers += 1;
                    // Blocks while the coordinator is busy; the debounce
                    // window absorbs the backlog.
                    if trigger.signal.send(RestartTrigger).await.is_err() {
                        trace!("restart coordinator is gone, dropping trigger");
                    }
                }
            }

            self.sink.line(&line);
        }

        summary
    }

    pub fn spawn(self) -> JoinHandle<ScanSummary> {
        tokio::spawn(self.run().in_current_span())
    }
}

/// Lazily split a byte stream into lines. Invalid UTF-8 is replaced rather than
/// ending the stream, and a trailing `\r` is dropped.
pub fn lines<R>(reader: R) -> impl Stream<Item = std::io::Result<String>>
where
    R: AsyncRead + Unpin,
{
    SplitStream::new(BufReader::new(reader).split(b'\n')).map(|chunk| {
        chunk.map(|mut bytes| {
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            String::from_utf8_lossy(&bytes).into_owned()
        })
    })
}
