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

use std::sync::PoisonError;

use crate::emulator::{Guarded, Shared};
use crate::{ArchCpu, CpuExitReason, ExecBackend, FinishCause, RunExit};

/// Body of the execution thread.
///
/// Holds the execution lock for the whole loop and only releases it while parked
/// on `halt_cond`. Leaves when a run finishes or when `pause` tears it down.
pub(crate) fn qemu_tcg_cpu_loop<A, B>(shared: &Shared<A, B>)
where
    A: ArchCpu,
    B: ExecBackend<A>,
{
    let vcpu = &shared.vcpu;
    let mut guard = shared.lock();
    debug!("vcpu thread entered its loop");

    loop {
        while vcpu.is_stopped() && !guard.teardown {
            guard = shared
                .halt_cond
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
        // Teardown only applies to a parked thread; a resumed one runs its pass.
        if vcpu.is_stopped() {
            debug!("vcpu thread torn down while parked");
            break;
        }

        vcpu.set_running();
        let exit = tcg_exec_all(shared, &mut guard);
        guard.last_exit = Some(exit);

        if exit.is_finished() {
            vcpu.set_finished();
            info!("vcpu run finished: {:?}", exit);
            break;
        }
        if vcpu.take_stop() {
            debug!("vcpu acknowledged stop request");
            vcpu.set_stopped();
        } else if exit == RunExit::DebugTrap {
            debug!("vcpu parked on debug trap");
        } else {
            vcpu.set_idle();
        }
    }

    vcpu.set_thread_alive(false);
    debug!("vcpu thread leaving");
}

/// Runs the vcpu until something ends the pass.
///
/// Called with the execution lock held. Each iteration runs one backend quantum
/// and interprets its outcome. The context's exit request is checked before every
/// quantum and cleared when the pass ends.
pub(crate) fn tcg_exec_all<A, B>(shared: &Shared<A, B>, guarded: &mut Guarded<A, B>) -> RunExit
where
    A: ArchCpu,
    B: ExecBackend<A>,
{
    let signals = &shared.signals;
    let vcpu = &shared.vcpu;
    let Guarded {
        cpu,
        backend,
        fault,
        ..
    } = guarded;
    let Some(cpu) = cpu.as_mut() else {
        crate::hw_error!("run loop entered before the vcpu was created");
    };

    let mut exit = RunExit::Cancelled;
    loop {
        // Every request is stored before its kick, so the kick is cleared before the
        // requests are looked at.
        signals.clear_reset();
        signals.clear_kick();
        if signals.exit_requested() {
            break;
        }
        // A stop that landed between two quanta ends the run like one raised
        // inside a quantum.
        if signals.stop_requested() {
            exit = RunExit::Finished(FinishCause::StopRequest);
            break;
        }
        if !vcpu.can_run() {
            warn!("vcpu got stopped inside the run loop");
            exit = RunExit::Anomalous;
            break;
        }

        let reason = backend.cpu_exec(cpu, signals);
        trace!("quantum ended at pc {:#x}: {:?}", cpu.pc().as_usize(), reason);

        // A reset aborts the quantum but keeps the vcpu running.
        if signals.reset_requested() {
            signals.clear_stop();
            vcpu.clear_stop();
        } else if signals.stop_requested() {
            exit = RunExit::Finished(FinishCause::StopRequest);
            break;
        }

        if let Some(mem_fault) = cpu.fault() {
            warn!(
                "invalid memory access at {:#x}: {:?}",
                mem_fault.addr.as_usize(),
                mem_fault.kind
            );
            *fault = Some(mem_fault);
            exit = RunExit::Finished(FinishCause::Fault(mem_fault));
            break;
        }

        match reason {
            CpuExitReason::Debug => {
                vcpu.set_stopped();
                exit = RunExit::DebugTrap;
                break;
            }
            CpuExitReason::Halt => {
                exit = RunExit::Finished(FinishCause::Halt);
                break;
            }
            _ => {}
        }
    }

    signals.clear_exit();
    exit
}

