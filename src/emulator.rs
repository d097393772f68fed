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

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use axerrno::{ax_err, ax_err_type, AxResult, LinuxError};
use memory_addr::VirtAddr;

use crate::exec::qemu_tcg_cpu_loop;
use crate::{
    instantiate, ArchCpu, CpuState, DisasInfo, ExecBackend, ExecSignals, MemFault, RunExit, VCpu,
    VCpuState,
};

/// Configuration of an [`Emulator`].
#[derive(Debug, Clone)]
pub struct EmulatorConfig<M> {
    /// The CPU model the vcpu is built from, usually resolved through
    /// [`ModelRegistry::class_by_name`](crate::ModelRegistry::class_by_name).
    pub model: M,
    /// Name of the execution thread.
    pub thread_name: String,
    /// Stack size of the execution thread. `None` keeps the host default.
    pub stack_size: Option<usize>,
}

impl<M> EmulatorConfig<M> {
    /// Default configuration for `model`.
    pub fn new(model: M) -> Self {
        Self {
            model,
            thread_name: "vcpu0".into(),
            stack_size: None,
        }
    }
}

/// State guarded by the execution lock.
pub(crate) struct Guarded<A: ArchCpu, B: ExecBackend<A>> {
    /// The vcpu's CPU state, `None` until constructed.
    pub cpu: Option<CpuState<A>>,
    pub backend: B,
    /// The fault that terminated the last run, if any.
    pub fault: Option<MemFault>,
    pub last_exit: Option<RunExit>,
    /// Set by `pause` to make a parked execution thread leave.
    pub teardown: bool,
}

/// State shared with the execution thread.
pub(crate) struct Shared<A: ArchCpu, B: ExecBackend<A>> {
    pub execution_lock: Mutex<Guarded<A, B>>,
    /// Wakes a parked execution thread.
    pub halt_cond: Condvar,
    pub signals: ExecSignals,
    pub vcpu: VCpu,
}

impl<A: ArchCpu, B: ExecBackend<A>> Shared<A, B> {
    /// Acquires the execution lock.
    ///
    /// A poisoned lock is recovered: a panicking backend must not make the state
    /// impossible to inspect.
    pub fn lock(&self) -> MutexGuard<'_, Guarded<A, B>> {
        self.execution_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// An emulator instance: one vcpu, one execution lock, one backend.
///
/// The controller drives it with [`Emulator::vm_start`] / [`Emulator::pause`] and
/// inspects it between runs. The execution thread holds the execution lock for the
/// whole run loop, except while parked, so methods that need the lock block while
/// the vcpu is running.
///
/// Calling [`Emulator::resume`] concurrently from two controller threads is not
/// supported; callers must serialize resume and pause.
pub struct Emulator<A: ArchCpu, B: ExecBackend<A>> {
    shared: Arc<Shared<A, B>>,
    model: A::Model,
    thread_name: String,
    stack_size: Option<usize>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<A: ArchCpu, B: ExecBackend<A>> Emulator<A, B> {
    /// Creates an emulator and runs the backend-wide setup once.
    pub fn new(config: EmulatorConfig<A::Model>, mut backend: B) -> AxResult<Self> {
        backend.init()?;
        debug!(
            "emulator created for cpu model {:?} (thread {})",
            config.model, config.thread_name
        );
        Ok(Self {
            shared: Arc::new(Shared {
                execution_lock: Mutex::new(Guarded {
                    cpu: None,
                    backend,
                    fault: None,
                    last_exit: None,
                    teardown: false,
                }),
                halt_cond: Condvar::new(),
                signals: ExecSignals::new(),
                vcpu: VCpu::new(),
            }),
            model: config.model,
            thread_name: config.thread_name,
            stack_size: config.stack_size,
            thread: Mutex::new(None),
        })
    }

    /// The CPU model of the vcpu.
    pub fn model(&self) -> A::Model {
        self.model
    }

    /// Starts the virtual machine.
    ///
    /// Returns `0` on success and a negative errno if the vcpu could not enter the
    /// running state.
    pub fn vm_start(&self) -> i32 {
        match self.resume_all_vcpus() {
            Ok(()) => 0,
            Err(err) => -LinuxError::from(err).code(),
        }
    }

    /// Alias of [`Emulator::resume_all_vcpus`].
    pub fn resume(&self) -> AxResult {
        self.resume_all_vcpus()
    }

    /// Constructs the vcpu if needed and (re)starts it.
    ///
    /// The one-time construction runs on the first call only. A parked execution
    /// thread is woken up; otherwise a new execution thread is spawned. Returns as
    /// soon as the thread is running, without waiting for the run to end.
    pub fn resume_all_vcpus(&self) -> AxResult {
        let vcpu = &self.shared.vcpu;
        if vcpu.is_busy() {
            return ax_err!(ResourceBusy, "vcpu is already running");
        }

        let mut slot = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = self.shared.lock();
        if !vcpu.is_created() {
            self.qemu_tcg_init_vcpu(&mut guard)?;
            vcpu.set_created();
        }
        if let Some(cpu) = guard.cpu.as_mut() {
            cpu.halted = false;
        }

        if vcpu.has_thread() && slot.is_some() {
            debug!("waking parked vcpu thread");
            self.cpu_resume_locked();
            return Ok(());
        }
        if let Some(stale) = slot.take() {
            // The thread already left its loop and released the lock.
            if stale.join().is_err() {
                warn!("previous vcpu thread panicked");
            }
        }

        guard.teardown = false;
        self.cpu_resume_locked();
        vcpu.set_thread_alive(true);

        let shared = Arc::clone(&self.shared);
        let mut builder = thread::Builder::new().name(self.thread_name.clone());
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        match builder.spawn(move || qemu_tcg_cpu_loop(&shared)) {
            Ok(handle) => {
                debug!("spawned vcpu thread {}", self.thread_name);
                *slot = Some(handle);
                Ok(())
            }
            Err(err) => {
                vcpu.set_parked();
                ax_err!(NoMemory, format!("failed to spawn vcpu thread: {err}"))
            }
        }
    }

    /// One-time construction of the vcpu: build the CPU state from the model,
    /// reset it and let the backend bind its address space.
    fn qemu_tcg_init_vcpu(&self, guard: &mut Guarded<A, B>) -> AxResult {
        let mut cpu = CpuState::new(instantiate(self.model));
        cpu.reset();
        guard.backend.init_vcpu(&mut cpu)?;
        guard.cpu = Some(cpu);
        debug!("vcpu constructed from model {:?}", self.model);
        Ok(())
    }

    /// Clears `stop` and `stopped` and wakes the execution thread if it is parked.
    pub fn cpu_resume(&self) {
        let _guard = self.shared.lock();
        self.cpu_resume_locked();
    }

    fn cpu_resume_locked(&self) {
        self.shared.vcpu.resume();
        self.shared.signals.clear_stop();
        self.shared.signals.clear_kick();
        self.shared.halt_cond.notify_all();
    }

    /// Alias of [`Emulator::pause_all_vcpus`].
    pub fn pause(&self) -> AxResult<Option<RunExit>> {
        self.pause_all_vcpus()
    }

    /// Waits for the execution thread to leave its loop and joins it.
    ///
    /// A parked thread is told to leave; a running one is waited for, so callers
    /// wanting a bounded wait should [`request_stop`](Emulator::request_stop)
    /// first. Afterwards the vcpu is created and stopped, with no thread attached.
    /// Returns how the last run loop pass ended.
    pub fn pause_all_vcpus(&self) -> AxResult<Option<RunExit>> {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ax_err_type!(BadState, "no vcpu thread to pause"))?;

        {
            let mut guard = self.shared.lock();
            guard.teardown = true;
            self.shared.halt_cond.notify_all();
        }
        let joined = handle.join();

        let mut guard = self.shared.lock();
        guard.teardown = false;
        self.shared.vcpu.set_parked();
        debug!("vcpu thread joined");
        if joined.is_err() {
            return ax_err!(BadState, "vcpu thread panicked");
        }
        Ok(guard.last_exit)
    }

    /// Stops the current run and waits for it: [`request_stop`] then [`pause`].
    ///
    /// [`request_stop`]: Emulator::request_stop
    /// [`pause`]: Emulator::pause
    pub fn stop(&self) -> AxResult<Option<RunExit>> {
        self.request_stop();
        self.pause_all_vcpus()
    }

    /// Makes the run loop leave before its next quantum.
    ///
    /// Edge-triggered: the loop clears the flag when it leaves.
    pub fn request_exit(&self) {
        self.shared.signals.request_exit();
    }

    /// Ends the current run once the in-flight quantum returns.
    ///
    /// The context flag is raised before the per-vcpu mirror, so the run loop
    /// never sees the mirror alone.
    pub fn request_stop(&self) {
        self.shared.signals.request_stop();
        self.shared.vcpu.request_stop();
    }

    /// Aborts the in-flight quantum without stopping the vcpu.
    pub fn request_reset(&self) {
        self.shared.signals.request_reset();
    }

    /// The cross-thread signal block seen by the backend.
    pub fn signals(&self) -> &ExecSignals {
        &self.shared.signals
    }

    /// The vcpu run-state flags.
    pub fn vcpu(&self) -> &VCpu {
        &self.shared.vcpu
    }

    /// Returns the lifecycle state of the vcpu.
    pub fn state(&self) -> VCpuState {
        self.shared.vcpu.state()
    }

    /// Whether the vcpu is stopped.
    pub fn is_stopped(&self) -> bool {
        self.shared.vcpu.is_stopped()
    }

    /// Whether the vcpu has been constructed.
    pub fn is_created(&self) -> bool {
        self.shared.vcpu.is_created()
    }

    /// Whether the execution thread is inside the run loop.
    pub fn is_running(&self) -> bool {
        self.shared.vcpu.is_running()
    }

    /// Whether the vcpu is halted. Blocks while the vcpu is running.
    pub fn is_halted(&self) -> bool {
        self.shared.lock().cpu.as_ref().is_some_and(|cpu| cpu.halted)
    }

    /// Runs `f` on the CPU state under the execution lock.
    ///
    /// Blocks while the vcpu is running. Fails if the vcpu is not constructed.
    pub fn with_cpu<F, T>(&self, f: F) -> AxResult<T>
    where
        F: FnOnce(&mut CpuState<A>) -> T,
    {
        let mut guard = self.shared.lock();
        match guard.cpu.as_mut() {
            Some(cpu) => Ok(f(cpu)),
            None => ax_err!(BadState, "vcpu is not created"),
        }
    }

    /// Returns the program counter.
    pub fn pc(&self) -> AxResult<VirtAddr> {
        self.with_cpu(|cpu| cpu.pc())
    }

    /// Sets the program counter.
    pub fn set_pc(&self, pc: VirtAddr) -> AxResult {
        self.with_cpu(|cpu| cpu.set_pc(pc))
    }

    /// Whether a pending interrupt would wake the vcpu from halt.
    pub fn cpu_has_work(&self) -> AxResult<bool> {
        self.with_cpu(|cpu| cpu.has_work())
    }

    /// Resets the vcpu (base reset, then family reset).
    ///
    /// Only allowed while no run is in progress.
    pub fn reset_cpu(&self) -> AxResult {
        if self.shared.vcpu.is_busy() {
            return ax_err!(ResourceBusy, "cannot reset a running vcpu");
        }
        self.with_cpu(|cpu| cpu.reset())
    }

    /// Disassembler selection of the vcpu's family.
    pub fn disas_info(&self) -> AxResult<DisasInfo> {
        self.with_cpu(|cpu| cpu.disas_info())
    }

    /// The fatal memory fault that terminated the last run, if any.
    pub fn fault(&self) -> Option<MemFault> {
        self.shared.lock().fault
    }

    /// Forgets the last fault, on the context and on the CPU state.
    pub fn clear_fault(&self) {
        let mut guard = self.shared.lock();
        guard.fault = None;
        if let Some(cpu) = guard.cpu.as_mut() {
            cpu.clear_fault();
        }
    }

    /// How the last run loop pass ended.
    pub fn last_exit(&self) -> Option<RunExit> {
        self.shared.lock().last_exit
    }
}

impl<A: ArchCpu, B: ExecBackend<A>> Drop for Emulator<A, B> {
    fn drop(&mut self) {
        if self
            .thread
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
        {
            self.request_stop();
            if let Err(err) = self.pause_all_vcpus() {
                warn!("failed to join vcpu thread on drop: {:?}", err);
            }
        }
    }
}
