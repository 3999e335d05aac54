//! In-memory transport.
//!
//! [`MockBackend`] is a cheap handle: clones share the same state, so a test can keep one
//! clone while the other is bound to a context, then queue samples, inspect written
//! bytes, seed attribute values or read call statistics.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use iio_core::{
    Backend, BackendKind, Channel, ChannelMask, Context, Device, IioError, Result, SampleLayout,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::common::{ErrorConfig, MockOp, MockRng};
use crate::config::MockConfig;
use crate::pattern::fill_records;

/// No such file or directory.
const ENOENT: i32 = 2;

/// Call statistics for a mock transport.
#[derive(Debug, Default)]
pub struct MockStats {
    opens: AtomicU64,
    closes: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    attr_reads: AtomicU64,
    attr_writes: AtomicU64,
    shutdowns: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

impl MockStats {
    /// Streaming sessions opened.
    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }

    /// Streaming sessions closed.
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::Relaxed)
    }

    /// Successful `read` calls.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Successful `write` calls.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Attribute reads, device and channel.
    pub fn attr_reads(&self) -> u64 {
        self.attr_reads.load(Ordering::Relaxed)
    }

    /// Attribute writes, device and channel.
    pub fn attr_writes(&self) -> u64 {
        self.attr_writes.load(Ordering::Relaxed)
    }

    /// Shutdown hook invocations.
    pub fn shutdowns(&self) -> u64 {
        self.shutdowns.load(Ordering::Relaxed)
    }

    /// Sample bytes handed out by `read`.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Sample bytes accepted by `write`.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum AttrKey {
    Device {
        device: String,
        attr: String,
    },
    Channel {
        device: String,
        channel: String,
        output: bool,
        attr: String,
    },
}

impl AttrKey {
    fn device(device: &str, attr: &str) -> Self {
        Self::Device {
            device: device.to_owned(),
            attr: attr.to_owned(),
        }
    }

    fn channel(device: &str, channel: &str, output: bool, attr: &str) -> Self {
        Self::Channel {
            device: device.to_owned(),
            channel: channel.to_owned(),
            output,
            attr: attr.to_owned(),
        }
    }
}

#[derive(Debug)]
struct Session {
    mask: ChannelMask,
    sample_size: usize,
    counter: u64,
}

#[derive(Debug, Default)]
struct MockState {
    attrs: HashMap<AttrKey, String>,
    sessions: HashMap<String, Session>,
    queued: HashMap<String, VecDeque<Vec<u8>>>,
    written: HashMap<String, Vec<u8>>,
    triggers: HashMap<String, String>,
}

#[derive(Debug)]
struct Inner {
    config: MockConfig,
    errors: ErrorConfig,
    rng: MockRng,
    state: Mutex<MockState>,
    stats: MockStats,
}

/// In-memory transport with scripted samples, attribute storage and error injection.
#[derive(Debug, Clone)]
pub struct MockBackend {
    inner: Arc<Inner>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl MockBackend {
    /// Create a transport with no injected failures.
    pub fn new(config: MockConfig) -> Self {
        Self::with_errors(config, ErrorConfig::none())
    }

    /// Create a transport whose operations fail according to `errors`.
    pub fn with_errors(config: MockConfig, errors: ErrorConfig) -> Self {
        let rng = MockRng::new(config.seed);
        Self {
            inner: Arc::new(Inner {
                config,
                errors,
                rng,
                state: Mutex::new(MockState::default()),
                stats: MockStats::default(),
            }),
        }
    }

    /// Settings this transport was built with.
    pub fn config(&self) -> &MockConfig {
        &self.inner.config
    }

    /// Call counters.
    pub fn stats(&self) -> &MockStats {
        &self.inner.stats
    }

    /// Error injection state, e.g. to [`reset`](ErrorConfig::reset) it.
    pub fn errors(&self) -> &ErrorConfig {
        &self.inner.errors
    }

    /// Seed or overwrite a device attribute value.
    pub fn set_device_attr(&self, device: &str, attr: &str, value: impl Into<String>) {
        self.inner
            .state
            .lock()
            .attrs
            .insert(AttrKey::device(device, attr), value.into());
    }

    /// Seed or overwrite a channel attribute value.
    pub fn set_channel_attr(
        &self,
        device: &str,
        channel: &str,
        output: bool,
        attr: &str,
        value: impl Into<String>,
    ) {
        self.inner
            .state
            .lock()
            .attrs
            .insert(AttrKey::channel(device, channel, output, attr), value.into());
    }

    /// Current value of a device attribute.
    pub fn device_attr(&self, device: &str, attr: &str) -> Option<String> {
        self.inner
            .state
            .lock()
            .attrs
            .get(&AttrKey::device(device, attr))
            .cloned()
    }

    /// Current value of a channel attribute.
    pub fn channel_attr(
        &self,
        device: &str,
        channel: &str,
        output: bool,
        attr: &str,
    ) -> Option<String> {
        self.inner
            .state
            .lock()
            .attrs
            .get(&AttrKey::channel(device, channel, output, attr))
            .cloned()
    }

    /// Queue raw bytes to be returned by the next reads on `device`, ahead of the pattern.
    pub fn queue_samples(&self, device: &str, bytes: impl Into<Vec<u8>>) {
        self.inner
            .state
            .lock()
            .queued
            .entry(device.to_owned())
            .or_default()
            .push_back(bytes.into());
    }

    /// Every byte pushed to `device` so far.
    pub fn written(&self, device: &str) -> Vec<u8> {
        self.inner
            .state
            .lock()
            .written
            .get(device)
            .cloned()
            .unwrap_or_default()
    }

    /// True while a streaming session is open on `device`.
    pub fn is_streaming(&self, device: &str) -> bool {
        self.inner.state.lock().sessions.contains_key(device)
    }

    fn check(&self, op: MockOp) -> Result<()> {
        self.inner.errors.check(op)
    }

    fn grant(&self, device: &Device, mask: &mut ChannelMask) -> Result<()> {
        mask.ensure_bits(device.mask_bits());
        for group in &self.inner.config.channel_groups {
            if group.iter().any(|&index| mask.test(index)) {
                for &index in group {
                    if device.channel_by_index(index).is_some() {
                        mask.set(index)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn copy_attr(&self, key: &AttrKey, dst: &mut [u8]) -> Result<usize> {
        self.check(MockOp::AttrRead)?;
        MockStats::bump(&self.inner.stats.attr_reads, 1);
        let state = self.inner.state.lock();
        let value = state
            .attrs
            .get(key)
            .ok_or_else(|| IioError::io_errno(ENOENT, format!("no value for {:?}", key)))?;
        let len = value.len().min(dst.len());
        dst[..len].copy_from_slice(&value.as_bytes()[..len]);
        if let Some(terminator) = dst.get_mut(len) {
            *terminator = 0;
        }
        Ok(len)
    }

    fn store_attr(&self, key: AttrKey, value: &str) -> Result<usize> {
        self.check(MockOp::AttrWrite)?;
        MockStats::bump(&self.inner.stats.attr_writes, 1);
        self.inner.state.lock().attrs.insert(key, value.to_owned());
        Ok(value.len())
    }

    fn check_triggers(&self) -> Result<()> {
        if self.inner.config.supports_triggers {
            self.check(MockOp::Trigger)
        } else {
            Err(IioError::not_supported("mock transport configured without triggers"))
        }
    }
}

impl Backend for MockBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mock
    }

    fn open(&self, device: &Device, mask: &mut ChannelMask) -> Result<usize> {
        self.check(MockOp::Open)?;
        let mut state = self.inner.state.lock();
        if state.sessions.contains_key(device.id()) {
            return Err(IioError::Busy {
                device: device.id().to_owned(),
            });
        }

        self.grant(device, mask)?;
        let sample_size = SampleLayout::new(device, mask).record_size();
        if sample_size == 0 {
            return Err(IioError::invalid_argument(format!(
                "mask selects no channel of {}",
                device.id()
            )));
        }

        debug!(
            device = %device.id(),
            mask = ?mask.words(),
            sample_size,
            "Mock session opened"
        );
        state.sessions.insert(
            device.id().to_owned(),
            Session {
                mask: mask.clone(),
                sample_size,
                counter: 0,
            },
        );
        MockStats::bump(&self.inner.stats.opens, 1);
        Ok(sample_size)
    }

    fn close(&self, device: &Device) -> Result<()> {
        let removed = self.inner.state.lock().sessions.remove(device.id());
        if removed.is_none() {
            return Err(IioError::not_open(format!(
                "no mock session on {}",
                device.id()
            )));
        }
        MockStats::bump(&self.inner.stats.closes, 1);
        self.check(MockOp::Close)
    }

    fn read(&self, device: &Device, dst: &mut [u8], mask: &mut ChannelMask) -> Result<usize> {
        self.check(MockOp::Read)?;
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let session = state
            .sessions
            .get_mut(device.id())
            .ok_or_else(|| IioError::not_open(format!("no mock session on {}", device.id())))?;
        mask.clone_from(&session.mask);

        let queued = state
            .queued
            .get_mut(device.id())
            .and_then(VecDeque::pop_front);
        let bytes = match queued {
            Some(mut chunk) => {
                let len = chunk.len().min(dst.len());
                dst[..len].copy_from_slice(&chunk[..len]);
                if len < chunk.len() {
                    let rest = chunk.split_off(len);
                    state
                        .queued
                        .entry(device.id().to_owned())
                        .or_default()
                        .push_front(rest);
                }
                len
            }
            None => {
                let layout = SampleLayout::new(device, &session.mask);
                debug_assert_eq!(layout.record_size(), session.sample_size);
                fill_records(
                    &layout,
                    dst,
                    self.inner.config.pattern,
                    self.inner.config.constant_value,
                    &mut session.counter,
                    &self.inner.rng,
                )
            }
        };

        MockStats::bump(&self.inner.stats.reads, 1);
        MockStats::bump(&self.inner.stats.bytes_read, bytes as u64);
        Ok(bytes)
    }

    fn write(&self, device: &Device, src: &[u8]) -> Result<usize> {
        self.check(MockOp::Write)?;
        let mut state = self.inner.state.lock();
        if !state.sessions.contains_key(device.id()) {
            return Err(IioError::not_open(format!(
                "no mock session on {}",
                device.id()
            )));
        }
        state
            .written
            .entry(device.id().to_owned())
            .or_default()
            .extend_from_slice(src);

        MockStats::bump(&self.inner.stats.writes, 1);
        MockStats::bump(&self.inner.stats.bytes_written, src.len() as u64);
        Ok(src.len())
    }

    fn read_device_attr(&self, device: &Device, attr: &str, dst: &mut [u8]) -> Result<usize> {
        self.copy_attr(&AttrKey::device(device.id(), attr), dst)
    }

    fn write_device_attr(&self, device: &Device, attr: &str, value: &str) -> Result<usize> {
        self.store_attr(AttrKey::device(device.id(), attr), value)
    }

    fn read_channel_attr(
        &self,
        device: &Device,
        channel: &Channel,
        attr: &str,
        dst: &mut [u8],
    ) -> Result<usize> {
        let key = AttrKey::channel(device.id(), channel.id(), channel.is_output(), attr);
        self.copy_attr(&key, dst)
    }

    fn write_channel_attr(
        &self,
        device: &Device,
        channel: &Channel,
        attr: &str,
        value: &str,
    ) -> Result<usize> {
        let key = AttrKey::channel(device.id(), channel.id(), channel.is_output(), attr);
        self.store_attr(key, value)
    }

    fn get_trigger(&self, device: &Device) -> Result<Option<String>> {
        self.check_triggers()?;
        Ok(self.inner.state.lock().triggers.get(device.id()).cloned())
    }

    fn set_trigger(&self, device: &Device, trigger: Option<&Device>) -> Result<()> {
        self.check_triggers()?;
        let mut state = self.inner.state.lock();
        match trigger {
            Some(t) => {
                state
                    .triggers
                    .insert(device.id().to_owned(), t.id().to_owned());
            }
            None => {
                state.triggers.remove(device.id());
            }
        }
        Ok(())
    }

    fn shutdown(&self, context: &Context) {
        let mut state = self.inner.state.lock();
        let open = state.sessions.len();
        state.sessions.clear();
        MockStats::bump(&self.inner.stats.shutdowns, 1);
        info!(
            context = %context.name(),
            open_sessions = open,
            "Mock transport shut down"
        );
    }
}
