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

use axerrno::AxResult;

use crate::{ArchCpu, CpuExitReason, CpuState};

/// The interfaces which the translation/execution backend must implement.
///
/// The backend decodes and runs guest code. The scheduler only consumes its
/// contract: it hands over the CPU state, gets an exit reason back, and reads the
/// out-of-band fields (`invalid_error`, `invalid_addr`) the backend left on the
/// state plus the flags it raised on [`ExecSignals`].
///
/// `cpu_exec` is called with the execution lock held. A backend that needs to
/// block must not do so while holding on to the CPU state.
pub trait ExecBackend<A: ArchCpu>: Send + 'static {
    /// Backend-wide setup. Runs exactly once per emulator, when it is created.
    fn init(&mut self) -> AxResult {
        Ok(())
    }

    /// Binds the address space and allocates per-vcpu resources.
    ///
    /// Runs once, the first time the vcpu is resumed. An error leaves the vcpu
    /// uncreated and fails that resume.
    fn init_vcpu(&mut self, cpu: &mut CpuState<A>) -> AxResult;

    /// Runs guest code for one quantum.
    ///
    /// The backend should poll [`ExecSignals::exit_pending`] at block boundaries
    /// and return [`CpuExitReason::Interrupt`] once it is set.
    fn cpu_exec(&mut self, cpu: &mut CpuState<A>, signals: &ExecSignals) -> CpuExitReason;
}

/// Cooperative cancellation flags shared by the controller, the run loop and the
/// backend.
///
/// Every flag is a single-writer/single-reader boolean. None of them preempts an
/// in-flight quantum: they are observed at the next block or loop boundary.
#[derive(Debug, Default)]
pub struct ExecSignals {
    exit_requested: AtomicBool,
    reset_requested: AtomicBool,
    stop_requested: AtomicBool,
    cpu_exit: AtomicBool,
}

impl ExecSignals {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether the run loop should leave before its next quantum.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::Acquire)
    }

    /// Whether a reset aborted the current quantum.
    pub fn reset_requested(&self) -> bool {
        self.reset_requested.load(Ordering::Acquire)
    }

    /// Whether emulation should stop after the current quantum.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Whether the backend should end the current quantum as soon as possible.
    pub fn exit_pending(&self) -> bool {
        self.cpu_exit.load(Ordering::Acquire)
    }

    /// Aborts the current quantum without stopping the vcpu.
    pub fn request_reset(&self) {
        self.reset_requested.store(true, Ordering::Release);
        self.kick();
    }

    /// Ends the current run once the quantum returns.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.kick();
    }

    /// Makes the run loop leave before its next quantum.
    pub fn request_exit(&self) {
        self.exit_requested.store(true, Ordering::Release);
        self.kick();
    }

    /// Asks the backend to end the current quantum.
    pub fn kick(&self) {
        self.cpu_exit.store(true, Ordering::Release);
    }

    pub(crate) fn clear_exit(&self) {
        self.exit_requested.store(false, Ordering::Release);
    }

    pub(crate) fn clear_reset(&self) {
        self.reset_requested.store(false, Ordering::Release);
    }

    pub(crate) fn clear_stop(&self) {
        self.stop_requested.store(false, Ordering::Release);
    }

    pub(crate) fn clear_kick(&self) {
        self.cpu_exit.store(false, Ordering::Release);
    }
}
