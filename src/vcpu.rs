// Copyright 2025 The Axvisor Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use core::sync::atomic::{AtomicBool, Ordering};

/// The lifecycle state of a virtual CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VCpuState {
    /// The per-vcpu resources have not been constructed yet.
    Uncreated = 0,
    /// The vcpu is constructed and parked, no execution thread is attached.
    Created = 1,
    /// The execution thread is inside the run loop.
    Running = 2,
    /// The execution thread is parked on a debug trap or a stop request.
    Stopped = 3,
    /// The last run finished (stop request, fault or halt) and was not paused yet.
    Terminated = 4,
}

/// Whether a vcpu may enter its next quantum.
///
/// False as soon as a stop is pending or the vcpu is already stopped.
pub const fn cpu_can_run(stop: bool, stopped: bool) -> bool {
    !stop && !stopped
}

/// Run-state flags of the single vcpu of an emulator.
///
/// The flags are written by one side and read by the other: the controller sets
/// `stop`, the execution thread sets `running`/`finished`, both sides move
/// `stopped`. Reads never need the execution lock.
///
/// `running` and `stopped` are never true at the same time.
#[derive(Debug, Default)]
pub struct VCpu {
    created: AtomicBool,
    running: AtomicBool,
    stopped: AtomicBool,
    stop: AtomicBool,
    finished: AtomicBool,
    thread_alive: AtomicBool,
}

impl VCpu {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether the one-time construction has happened.
    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::Acquire)
    }

    /// Whether the execution thread is inside the run loop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the vcpu is stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Whether a stop request is pending on this vcpu.
    pub fn stop_pending(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Whether an execution thread is attached, running or parked.
    pub fn has_thread(&self) -> bool {
        self.thread_alive.load(Ordering::Acquire)
    }

    /// Whether an execution thread is attached and about to run or running.
    ///
    /// True from the moment a resume hands the vcpu to its thread, before the
    /// thread enters the run loop.
    pub fn is_busy(&self) -> bool {
        self.is_running()
            || (self.has_thread() && !self.is_stopped() && !self.finished.load(Ordering::Acquire))
    }

    /// Whether the vcpu may enter its next quantum.
    pub fn can_run(&self) -> bool {
        cpu_can_run(self.stop_pending(), self.is_stopped())
    }

    /// Returns the lifecycle state derived from the flags.
    pub fn state(&self) -> VCpuState {
        if !self.is_created() {
            VCpuState::Uncreated
        } else if self.is_running() {
            VCpuState::Running
        } else if self.finished.load(Ordering::Acquire) {
            VCpuState::Terminated
        } else if self.is_stopped() && self.has_thread() {
            VCpuState::Stopped
        } else {
            VCpuState::Created
        }
    }

    /// Marks the one-time construction as done. The vcpu starts out stopped.
    pub(crate) fn set_created(&self) {
        self.stopped.store(true, Ordering::Release);
        self.created.store(true, Ordering::Release);
    }

    pub(crate) fn set_thread_alive(&self, alive: bool) {
        self.thread_alive.store(alive, Ordering::Release);
    }

    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub(crate) fn clear_stop(&self) {
        self.stop.store(false, Ordering::Release);
    }

    /// Consumes a pending stop request.
    pub(crate) fn take_stop(&self) -> bool {
        self.stop.swap(false, Ordering::AcqRel)
    }

    /// Clears `stop` and `stopped` so the vcpu can run again.
    pub(crate) fn resume(&self) {
        self.stop.store(false, Ordering::Release);
        self.stopped.store(false, Ordering::Release);
        self.finished.store(false, Ordering::Release);
    }

    /// The execution thread enters the run loop.
    pub(crate) fn set_running(&self) {
        if self.is_stopped() {
            crate::hw_error!("vcpu entered the run loop while stopped");
        }
        self.finished.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
    }

    /// The vcpu stops but stays attached to its execution thread.
    pub(crate) fn set_stopped(&self) {
        self.running.store(false, Ordering::Release);
        self.stopped.store(true, Ordering::Release);
    }

    /// The run finished; the execution thread is about to leave.
    pub(crate) fn set_finished(&self) {
        self.running.store(false, Ordering::Release);
        self.finished.store(true, Ordering::Release);
    }

    /// The execution thread is gone: back to created and stopped.
    pub(crate) fn set_parked(&self) {
        self.running.store(false, Ordering::Release);
        self.finished.store(false, Ordering::Release);
        self.thread_alive.store(false, Ordering::Release);
        self.stopped.store(true, Ordering::Release);
    }

    /// The vcpu leaves the run loop without finishing (cancellation).
    pub(crate) fn set_idle(&self) {
        self.running.store(false, Ordering::Release);
    }
}
