//! Fault injection for the mock transport.
//!
//! Injected failures surface as [`IioError`] values carrying the errno a real transport
//! would report, so callers exercise the same paths as against hardware.

use std::fmt;
use std::sync::Arc;

use iio_core::error::errno;
use iio_core::{IioError, Result};
use parking_lot::Mutex;

use super::rng::MockRng;

const ETIMEDOUT: i32 = 110;
const ENODEV: i32 = 19;

/// Backend entry points that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `Backend::open`.
    Open,
    /// `Backend::close`.
    Close,
    /// `Backend::read`.
    Read,
    /// `Backend::write`.
    Write,
    /// Device or channel attribute read.
    AttrRead,
    /// Device or channel attribute write.
    AttrWrite,
    /// Trigger get or set.
    Trigger,
}

impl MockOp {
    const COUNT: usize = 7;

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MockOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Read => "read",
            Self::Write => "write",
            Self::AttrRead => "attr_read",
            Self::AttrWrite => "attr_write",
            Self::Trigger => "trigger",
        };
        f.write_str(name)
    }
}

/// A scripted failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorScenario {
    /// `op` succeeds `successes` times, then fails with `EIO` until reset.
    FailAfterN {
        /// Operation to fail.
        op: MockOp,
        /// Calls allowed to succeed first.
        successes: u32,
    },
    /// Every `op` fails with `ETIMEDOUT`.
    Timeout(MockOp),
    /// Every `op` fails with the given errno.
    Errno {
        /// Operation to fail.
        op: MockOp,
        /// Positive errno to report.
        errno: i32,
    },
    /// The device disappears at the first operation; everything fails with `ENODEV`.
    Disconnect,
    /// The hardware latches a fault code at the first operation; everything fails with `EIO`.
    HardwareFault {
        /// Vendor fault code, included in the message.
        code: u32,
    },
}

#[derive(Debug, Default)]
struct FaultState {
    calls: [u32; MockOp::COUNT],
    latched: Option<(i32, String)>,
}

/// Fault plan shared by every clone of a mock transport.
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    scenarios: Arc<[ErrorScenario]>,
    rates: [f64; MockOp::COUNT],
    rng: Arc<MockRng>,
    state: Arc<Mutex<FaultState>>,
}

impl ErrorConfig {
    /// No injected failures.
    pub fn none() -> Self {
        Self::scripted(Vec::new())
    }

    /// Apply `scenarios` in order; the first that matches decides the outcome.
    pub fn scripted(scenarios: Vec<ErrorScenario>) -> Self {
        Self {
            scenarios: scenarios.into(),
            rates: [0.0; MockOp::COUNT],
            rng: Arc::new(MockRng::default()),
            state: Arc::new(Mutex::new(FaultState::default())),
        }
    }

    /// Apply a single scenario.
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scripted(vec![scenario])
    }

    /// Every operation fails with probability `rate`, drawn from a seeded generator.
    pub fn random(rate: f64, seed: Option<u64>) -> Self {
        let mut config = Self::none();
        config.rates = [rate; MockOp::COUNT];
        config.rng = Arc::new(MockRng::new(seed));
        config
    }

    /// Override the random failure probability of one operation.
    pub fn with_rate(mut self, op: MockOp, rate: f64) -> Self {
        self.rates[op.slot()] = rate;
        self
    }

    /// Decide the outcome of one call to `op`.
    pub fn check(&self, op: MockOp) -> Result<()> {
        let mut state = self.state.lock();

        if let Some((code, message)) = &state.latched {
            return Err(IioError::io_errno(*code, message.clone()));
        }

        state.calls[op.slot()] += 1;
        let calls = state.calls[op.slot()];

        for scenario in self.scenarios.iter() {
            match *scenario {
                ErrorScenario::FailAfterN { op: target, successes }
                    if target == op && calls > successes =>
                {
                    return Err(IioError::io(format!(
                        "injected {} failure after {} successes",
                        op, successes
                    )));
                }
                ErrorScenario::Timeout(target) if target == op => {
                    return Err(IioError::io_errno(ETIMEDOUT, format!("{} timed out", op)));
                }
                ErrorScenario::Errno { op: target, errno } if target == op => {
                    return Err(IioError::io_errno(errno, format!("injected {} error", op)));
                }
                ErrorScenario::Disconnect => {
                    let message = "device disconnected".to_string();
                    state.latched = Some((ENODEV, message.clone()));
                    return Err(IioError::io_errno(ENODEV, message));
                }
                ErrorScenario::HardwareFault { code } => {
                    let message = format!("hardware fault 0x{:x}", code);
                    state.latched = Some((errno::EIO, message.clone()));
                    return Err(IioError::io_errno(errno::EIO, message));
                }
                _ => {}
            }
        }

        if self.rng.should_fail(self.rates[op.slot()]) {
            return Err(IioError::io(format!("random {} failure", op)));
        }
        Ok(())
    }

    /// Clear call counts and any latched fault.
    pub fn reset(&self) {
        *self.state.lock() = FaultState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_fails() {
        let config = ErrorConfig::none();
        assert!((0..50).all(|_| config.check(MockOp::Read).is_ok()));
    }

    #[test]
    fn test_seeded_random_rate() {
        let config = ErrorConfig::random(0.25, Some(9));
        let failed = (0..2000)
            .filter(|_| config.check(MockOp::Write).is_err())
            .count();
        assert!((350..650).contains(&failed), "{} failures", failed);
    }

    #[test]
    fn test_fail_after_n_only_hits_its_op() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAfterN {
            op: MockOp::Read,
            successes: 3,
        });
        assert!((0..3).all(|_| config.check(MockOp::Read).is_ok()));
        assert_eq!(config.check(MockOp::Read).unwrap_err().code(), -errno::EIO);
        assert!(config.check(MockOp::Open).is_ok());

        config.reset();
        assert!(config.check(MockOp::Read).is_ok());
    }

    #[test]
    fn test_timeout_and_errno() {
        let config = ErrorConfig::scripted(vec![
            ErrorScenario::Timeout(MockOp::Open),
            ErrorScenario::Errno {
                op: MockOp::AttrWrite,
                errno: 13,
            },
        ]);
        assert_eq!(config.check(MockOp::Open).unwrap_err().code(), -ETIMEDOUT);
        assert_eq!(config.check(MockOp::AttrWrite).unwrap_err().code(), -13);
        assert!(config.check(MockOp::AttrRead).is_ok());
    }

    #[test]
    fn test_disconnect_latches_until_reset() {
        let config = ErrorConfig::scenario(ErrorScenario::Disconnect);
        assert_eq!(config.check(MockOp::Read).unwrap_err().code(), -ENODEV);
        assert_eq!(config.check(MockOp::Close).unwrap_err().code(), -ENODEV);

        config.reset();
        // the scenario fires again on the next call
        assert_eq!(config.check(MockOp::Close).unwrap_err().code(), -ENODEV);
    }

    #[test]
    fn test_hardware_fault_reports_code() {
        let config = ErrorConfig::scenario(ErrorScenario::HardwareFault { code: 0x42 });
        let err = config.check(MockOp::Trigger).unwrap_err();
        assert_eq!(err.code(), -errno::EIO);
        assert!(err.to_string().contains("0x42"));
    }

    #[test]
    fn test_per_op_rate_override() {
        let config = ErrorConfig::none().with_rate(MockOp::Read, 1.0);
        for _ in 0..10 {
            assert!(config.check(MockOp::Read).is_err());
            assert!(config.check(MockOp::Write).is_ok());
        }
    }
}
