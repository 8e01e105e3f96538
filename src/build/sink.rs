//! Byte-bounded build log writer

use crate::core::config::OverflowPolicy;
use crate::core::output;
use std::io::{self, Write};

/// What happened to one chunk handed to [`BoundedLogSink::write`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The ceiling was hit inside this chunk; the rest was dropped
    Truncated,
    /// The ceiling was already reached; nothing was written
    Discarded,
}

/// Writes at most `limit` bytes, then reports the overflow exactly once.
pub struct BoundedLogSink<W: Write> {
    writer: W,
    label: String,
    written: u64,
    limit: u64,
    policy: OverflowPolicy,
    notice: Option<OverflowPolicy>,
}

impl<W: Write> BoundedLogSink<W> {
    pub fn new(writer: W, label: impl Into<String>, limit: u64, policy: OverflowPolicy) -> Self {
        BoundedLogSink {
            writer,
            label: label.into(),
            written: 0,
            limit,
            policy,
            notice: None,
        }
    }

    pub fn write(&mut self, bytes: &[u8]) -> io::Result<WriteOutcome> {
        if self.notice.is_some() {
            return Ok(WriteOutcome::Discarded);
        }
        let room = self.limit - self.written;
        if bytes.len() as u64 <= room {
            self.writer.write_all(bytes)?;
            self.written += bytes.len() as u64;
            return Ok(WriteOutcome::Written);
        }

        // room < bytes.len(), so it fits in usize
        let head = &bytes[..room as usize];
        self.writer.write_all(head)?;
        self.writer.flush()?;
        self.written = self.limit;
        self.report_overflow();
        Ok(WriteOutcome::Truncated)
    }

    fn report_overflow(&mut self) {
        let message = format!(
            "{} exceeded the log limit of {} bytes, further output is discarded",
            self.label, self.limit
        );
        match self.policy {
            OverflowPolicy::Warn => output::warning(&message),
            OverflowPolicy::Error => output::error(&message),
        }
        self.notice = Some(self.policy);
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Severity of the overflow notice, once one was emitted
    pub fn notice(&self) -> Option<OverflowPolicy> {
        self.notice
    }

    /// The ceiling was exceeded under the `error` policy
    pub fn failed(&self) -> bool {
        self.notice == Some(OverflowPolicy::Error)
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
