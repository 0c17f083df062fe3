use std::io;
use std::sync::Arc;
use std::time::Duration;

use strlog_proto::{Fetch, LogProto};
use tracing::{debug, trace, warn};

use crate::config::{GlobalConfig, ReaderOptions};
use crate::error::{Result, SourceError};
use crate::message::{LogMessage, MessageSink, SourceKind};
use crate::pipe::LogPipe;

/// Pulls records out of a protocol and forwards them as [`LogMessage`]s.
///
/// The reader owns the protocol, and with it the transport and device
/// descriptor; dropping the reader closes the device.
pub struct LogReader {
    proto: Box<dyn LogProto>,
    options: ReaderOptions,
    instance: usize,
    source: SourceKind,
    owner_id: Arc<str>,
    label: Arc<str>,
    next: Option<Arc<dyn MessageSink>>,
    initialized: bool,
    seq: u64,
}

impl LogReader {
    pub fn new(proto: Box<dyn LogProto>) -> Self {
        Self {
            proto,
            options: ReaderOptions::defaults(),
            instance: 0,
            source: SourceKind::SunStreams,
            owner_id: Arc::from(""),
            label: Arc::from(""),
            next: None,
            initialized: false,
            seq: 0,
        }
    }

    /// Apply finalized options and the diagnostic context of the owner.
    pub fn set_options(
        &mut self,
        options: &ReaderOptions,
        instance: usize,
        source: SourceKind,
        owner_id: &str,
        label: &str,
    ) {
        self.options = options.clone();
        self.instance = instance;
        self.source = source;
        self.owner_id = Arc::from(owner_id);
        self.label = Arc::from(label);
    }

    /// Attach the destination records are queued to.
    pub fn append(&mut self, next: Arc<dyn MessageSink>) {
        self.next = Some(next);
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn instance(&self) -> usize {
        self.instance
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Records forwarded so far.
    pub fn received(&self) -> u64 {
        self.seq
    }

    /// Read up to `fetch_limit` records and forward them.
    ///
    /// Returns the number forwarded; zero means the device had nothing ready.
    pub fn fetch(&mut self) -> Result<usize> {
        if !self.initialized {
            return Err(SourceError::NotInitialized);
        }
        let Some(next) = self.next.clone() else {
            return Err(SourceError::NoDestination {
                id: self.owner_id.to_string(),
            });
        };

        let limit = self.options.fetch_limit.max(1);
        let mut forwarded = 0;
        while forwarded < limit {
            match self.proto.fetch()? {
                Fetch::Record(raw) => {
                    self.seq += 1;
                    trace!(label = %self.label, len = raw.len(), seq = self.seq, "record read");
                    next.queue(LogMessage {
                        raw,
                        source: self.source,
                        source_id: Arc::clone(&self.owner_id),
                        label: Arc::clone(&self.label),
                        flags: self.options.parse_flags,
                        seq: self.seq,
                    });
                    forwarded += 1;
                }
                Fetch::Again => break,
            }
        }
        Ok(forwarded)
    }

    /// Wait until the device is readable or `timeout` passes.
    ///
    /// Returns `true` when a fetch is worth attempting. Protocols without a
    /// descriptor are always considered ready after the timeout.
    pub fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let Some(fd) = self.proto.raw_fd() else {
            std::thread::sleep(timeout);
            return Ok(true);
        };
        poll_readable(fd, timeout)
    }
}

fn poll_readable(fd: std::os::fd::RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

    loop {
        // SAFETY: `pfd` is a single valid pollfd for a descriptor the reader owns.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(rc > 0);
    }
}

impl LogPipe for LogReader {
    fn init(&mut self, _cfg: &GlobalConfig) -> Result<()> {
        if self.next.is_none() {
            return Err(SourceError::NoDestination {
                id: self.owner_id.to_string(),
            });
        }
        self.proto.prepare()?;
        self.initialized = true;
        debug!(
            label = %self.label,
            proto = self.proto.name(),
            fetch_limit = self.options.fetch_limit,
            "log reader initialized"
        );
        Ok(())
    }

    fn deinit(&mut self) -> Result<()> {
        if self.initialized {
            self.initialized = false;
            debug!(label = %self.label, received = self.seq, "log reader deinitialized");
        }
        Ok(())
    }

    fn free(&mut self) {
        if self.initialized {
            warn!(label = %self.label, "freeing an initialized log reader");
            self.initialized = false;
        }
        self.next = None;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::os::fd::RawFd;
    use std::sync::Mutex;

    use bytes::Bytes;
    use strlog_proto::ProtoError;

    use super::*;
    use crate::config::ParseFlags;

    struct ScriptedProto {
        records: VecDeque<&'static [u8]>,
        fail_prepare: bool,
    }

    impl LogProto for ScriptedProto {
        fn prepare(&mut self) -> strlog_proto::Result<()> {
            if self.fail_prepare {
                return Err(ProtoError::InvalidOptions("scripted".into()));
            }
            Ok(())
        }

        fn fetch(&mut self) -> strlog_proto::Result<Fetch> {
            Ok(match self.records.pop_front() {
                Some(raw) => Fetch::Record(Bytes::from_static(raw)),
                None => Fetch::Again,
            })
        }

        fn raw_fd(&self) -> Option<RawFd> {
            None
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn reader(records: Vec<&'static [u8]>) -> LogReader {
        LogReader::new(Box::new(ScriptedProto {
            records: records.into(),
            fail_prepare: false,
        }))
    }

    fn collector() -> (Arc<Mutex<Vec<LogMessage>>>, Arc<dyn MessageSink>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: Arc<dyn MessageSink> = {
            let seen = Arc::clone(&seen);
            Arc::new(move |msg: LogMessage| seen.lock().unwrap().push(msg))
        };
        (seen, sink)
    }

    fn options(fetch_limit: usize) -> ReaderOptions {
        let mut options = ReaderOptions::default();
        options.fetch_limit = fetch_limit;
        options.parse_flags = ParseFlags::LOCAL;
        options.init(&GlobalConfig::new());
        options
    }

    #[test]
    fn forwards_records_with_context() {
        let mut reader = reader(vec![&b"<134>test message"[..], b"<13>second"]);
        let (seen, sink) = collector();
        reader.set_options(&options(10), 2, SourceKind::SunStreams, "s_sun", "/dev/log");
        reader.append(sink);
        reader.init(&GlobalConfig::new()).unwrap();

        assert_eq!(reader.fetch().unwrap(), 2);
        assert_eq!(reader.fetch().unwrap(), 0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(&seen[0].raw[..], b"<134>test message");
        assert_eq!(&*seen[0].source_id, "s_sun");
        assert_eq!(&*seen[0].label, "/dev/log");
        assert_eq!(seen[0].flags, ParseFlags::LOCAL);
        assert_eq!(seen[0].seq, 1);
        assert_eq!(seen[1].seq, 2);
        assert_eq!(reader.received(), 2);
        assert_eq!(reader.instance(), 2);
    }

    #[test]
    fn fetch_honors_limit() {
        let mut reader = reader(vec![&b"<1>a"[..], b"<1>b", b"<1>c"]);
        let (seen, sink) = collector();
        reader.set_options(&options(2), 0, SourceKind::SunStreams, "s", "dev");
        reader.append(sink);
        reader.init(&GlobalConfig::new()).unwrap();

        assert_eq!(reader.fetch().unwrap(), 2);
        assert_eq!(reader.fetch().unwrap(), 1);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn fetch_requires_init() {
        let mut reader = reader(vec![&b"<1>a"[..]]);
        let (_seen, sink) = collector();
        reader.append(sink);
        assert!(matches!(reader.fetch(), Err(SourceError::NotInitialized)));
    }

    #[test]
    fn init_requires_destination() {
        let mut reader = reader(vec![]);
        assert!(matches!(
            reader.init(&GlobalConfig::new()),
            Err(SourceError::NoDestination { .. })
        ));
        assert!(!reader.is_initialized());
    }

    #[test]
    fn init_propagates_prepare_failure() {
        let mut reader = LogReader::new(Box::new(ScriptedProto {
            records: VecDeque::new(),
            fail_prepare: true,
        }));
        let (_seen, sink) = collector();
        reader.append(sink);
        assert!(matches!(
            reader.init(&GlobalConfig::new()),
            Err(SourceError::Proto(ProtoError::InvalidOptions(_)))
        ));
        assert!(!reader.is_initialized());
    }

    #[test]
    fn deinit_and_free_are_repeatable() {
        let mut reader = reader(vec![]);
        let (_seen, sink) = collector();
        reader.append(sink);
        reader.init(&GlobalConfig::new()).unwrap();

        reader.deinit().unwrap();
        reader.deinit().unwrap();
        reader.free();
        reader.free();
        assert!(!reader.is_initialized());
    }

    #[test]
    fn wait_readable_without_descriptor_times_out_ready() {
        let reader = reader(vec![]);
        assert!(reader.wait_readable(Duration::from_millis(1)).unwrap());
    }

    #[test]
    fn poll_reports_readiness() {
        use std::io::Write;
        use std::os::fd::AsRawFd;
        use std::os::unix::net::UnixStream;

        let (mut tx, rx) = UnixStream::pair().unwrap();
        assert!(!poll_readable(rx.as_raw_fd(), Duration::from_millis(10)).unwrap());
        tx.write_all(b"x").unwrap();
        assert!(poll_readable(rx.as_raw_fd(), Duration::from_millis(1000)).unwrap());
    }
}
