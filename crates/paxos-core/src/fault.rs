//! # fault
//!
//! why: simulate crash-stop failures in the middle of the protocol
//! relations: checked by node.rs before every prepare, accept and learn handler
//! what: FaultPolicy trait, NoFaults, RandomFaults, CrashAfter, FailureInjector

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::error;

use crate::error::PaxosError;
use crate::message::Procedure;

/// Decides, per inbound consensus call, whether the node crashes.
pub trait FaultPolicy: Send + Sync {
    fn should_crash(&self) -> bool;
}

/// Never crashes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaults;

impl FaultPolicy for NoFaults {
    fn should_crash(&self) -> bool {
        false
    }
}

/// Crashes when a uniform draw in `0..100` falls below `rate`.
#[derive(Debug)]
pub struct RandomFaults {
    rate: u8,
    rng: Mutex<StdRng>,
}

impl RandomFaults {
    pub fn new(rate: u8) -> Self {
        Self {
            rate,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible sequence of draws.
    pub fn seeded(rate: u8, seed: u64) -> Self {
        Self {
            rate,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl FaultPolicy for RandomFaults {
    fn should_crash(&self) -> bool {
        let draw: u8 = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .gen_range(0..100);
        draw < self.rate
    }
}

/// Crashes on the n-th call (1-based).
#[derive(Debug)]
pub struct CrashAfter {
    remaining: AtomicUsize,
}

impl CrashAfter {
    pub fn new(calls: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(calls),
        }
    }
}

impl FaultPolicy for CrashAfter {
    fn should_crash(&self) -> bool {
        let previous = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous == 1
    }
}

/// What a triggered fault does to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashMode {
    /// Log and terminate the process with a nonzero status.
    ExitProcess,
    /// Stop answering every later call. The process keeps running.
    StopResponding,
}

/// Wraps a policy and remembers whether the node has crashed.
pub struct FailureInjector {
    policy: Box<dyn FaultPolicy>,
    mode: CrashMode,
    crashed: AtomicBool,
}

impl std::fmt::Debug for FailureInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureInjector")
            .field("mode", &self.mode)
            .field("crashed", &self.is_crashed())
            .finish()
    }
}

impl FailureInjector {
    pub fn new(policy: impl FaultPolicy + 'static, mode: CrashMode) -> Self {
        Self {
            policy: Box::new(policy),
            mode,
            crashed: AtomicBool::new(false),
        }
    }

    /// Injector that never fires.
    pub fn disabled() -> Self {
        Self::new(NoFaults, CrashMode::StopResponding)
    }

    /// Random failures at `rate` percent that kill the process.
    pub fn process_exit(rate: u8) -> Self {
        Self::new(RandomFaults::new(rate), CrashMode::ExitProcess)
    }

    pub fn is_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Run before handling an inbound call on `node`.
    pub fn check(&self, node: &str, procedure: Procedure) -> Result<(), PaxosError> {
        if self.is_crashed() {
            return Err(PaxosError::NodeCrashed(node.to_owned()));
        }
        if !procedure.is_consensus_rpc() || !self.policy.should_crash() {
            return Ok(());
        }

        error!(source = node, procedure = %procedure, "!!!!!!!SYSTEM_FAILURE!!!!!");
        match self.mode {
            CrashMode::ExitProcess => std::process::exit(1),
            CrashMode::StopResponding => {
                self.crashed.store(true, Ordering::SeqCst);
                Err(PaxosError::NodeCrashed(node.to_owned()))
            }
        }
    }
}
