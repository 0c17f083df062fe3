use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::config::ParseFlags;

/// Class of the source a message was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// The STREAMS kernel log device.
    SunStreams,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::SunStreams => f.write_str("sun-streams"),
        }
    }
}

/// Facility and severity decoded from a `<PRI>` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Priority {
    pub facility: u8,
    pub severity: u8,
}

impl Priority {
    /// Largest valid priority value (`local7.debug`).
    pub const MAX: u16 = 191;

    pub fn from_value(value: u16) -> Option<Self> {
        if value > Self::MAX {
            return None;
        }
        Some(Self {
            facility: (value >> 3) as u8,
            severity: (value & 0x07) as u8,
        })
    }

    pub fn value(self) -> u16 {
        (u16::from(self.facility) << 3) | u16::from(self.severity)
    }

    pub fn severity_name(self) -> &'static str {
        match self.severity {
            0 => "emerg",
            1 => "alert",
            2 => "crit",
            3 => "err",
            4 => "warning",
            5 => "notice",
            6 => "info",
            _ => "debug",
        }
    }

    pub fn facility_name(self) -> &'static str {
        const NAMES: [&str; 24] = [
            "kern", "user", "mail", "daemon", "auth", "syslog", "lpr", "news", "uucp", "cron",
            "authpriv", "ftp", "ntp", "security", "console", "solaris-cron", "local0", "local1",
            "local2", "local3", "local4", "local5", "local6", "local7",
        ];
        NAMES
            .get(usize::from(self.facility))
            .copied()
            .unwrap_or("unknown")
    }
}

/// One record read from a source, as handed to the next pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    /// The record exactly as produced by the transport.
    pub raw: Bytes,
    pub source: SourceKind,
    /// Identifier of the driver that owns the reader.
    pub source_id: Arc<str>,
    /// Diagnostic label, usually the device path.
    pub label: Arc<str>,
    pub flags: ParseFlags,
    /// Sequence number within the reader, starting at 1.
    pub seq: u64,
}

impl LogMessage {
    /// Decode the leading `<PRI>`.
    ///
    /// Returns `None` when the record does not start with a well-formed
    /// priority of at most three digits in range.
    pub fn priority(&self) -> Option<Priority> {
        self.split_priority().and_then(|(value, _)| Priority::from_value(value))
    }

    /// The message text following the `<PRI>` prefix, or the whole record.
    pub fn message(&self) -> &[u8] {
        match self.split_priority() {
            Some((_, rest)) => rest,
            None => &self.raw,
        }
    }

    fn split_priority(&self) -> Option<(u16, &[u8])> {
        let rest = self.raw.strip_prefix(b"<")?;
        let end = rest.iter().position(|&b| b == b'>')?;
        let digits = &rest[..end];
        if digits.is_empty() || digits.len() > 3 || !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        let value = digits
            .iter()
            .fold(0u16, |acc, &d| acc * 10 + u16::from(d - b'0'));
        Some((value, &rest[end + 1..]))
    }
}

/// Receives messages from a reader; the next element of the pipe graph.
pub trait MessageSink: Send + Sync {
    fn queue(&self, msg: LogMessage);
}

impl<F> MessageSink for F
where
    F: Fn(LogMessage) + Send + Sync,
{
    fn queue(&self, msg: LogMessage) {
        self(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(raw: &'static [u8]) -> LogMessage {
        LogMessage {
            raw: Bytes::from_static(raw),
            source: SourceKind::SunStreams,
            source_id: Arc::from("s_streams"),
            label: Arc::from("/dev/log"),
            flags: ParseFlags::LOCAL,
            seq: 1,
        }
    }

    #[test]
    fn decodes_priority() {
        let msg = message(b"<134>test message");
        let pri = msg.priority().unwrap();
        assert_eq!(pri.facility, 16);
        assert_eq!(pri.severity, 6);
        assert_eq!(pri.value(), 134);
        assert_eq!(pri.facility_name(), "local0");
        assert_eq!(pri.severity_name(), "info");
        assert_eq!(msg.message(), b"test message");
    }

    #[test]
    fn boundary_priorities() {
        assert_eq!(message(b"<0>x").priority().unwrap().value(), 0);
        assert_eq!(message(b"<191>x").priority().unwrap().facility_name(), "local7");
        assert!(message(b"<192>x").priority().is_none());
    }

    #[test]
    fn malformed_prefix_has_no_priority() {
        for raw in [
            &b"no prefix"[..],
            b"<>empty",
            b"<1234>long",
            b"<1a>alpha",
            b"<13 unterminated",
        ] {
            let msg = LogMessage {
                raw: Bytes::copy_from_slice(raw),
                ..message(b"")
            };
            assert!(msg.priority().is_none(), "{raw:?}");
            assert_eq!(msg.message(), raw);
        }
    }

    #[test]
    fn closures_are_sinks() {
        let seen = std::sync::Mutex::new(Vec::new());
        let sink = |msg: LogMessage| seen.lock().unwrap().push(msg.seq);
        sink.queue(message(b"<13>a"));
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn source_kind_display() {
        assert_eq!(SourceKind::SunStreams.to_string(), "sun-streams");
        assert_eq!(
            serde_json::to_string(&SourceKind::SunStreams).unwrap(),
            "\"sun-streams\""
        );
    }
}
