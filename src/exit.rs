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

use memory_addr::VirtAddr;

#[allow(unused_imports)] // used in doc
use super::ExecBackend;

/// Raw exit code: the quantum was interrupted (exit request or pending interrupt).
pub const EXCP_INTERRUPT: i32 = 0x10000;
/// Raw exit code: the vcpu executed a halt and has nothing left to run.
pub const EXCP_HLT: i32 = 0x10001;
/// Raw exit code: a debug trap (breakpoint, watchpoint or single-step) was hit.
pub const EXCP_DEBUG: i32 = 0x10002;
/// Raw exit code: the vcpu is halted waiting for an interrupt.
pub const EXCP_HALTED: i32 = 0x10003;

/// The result of one quantum of [`ExecBackend::cpu_exec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuExitReason {
    /// The quantum ended normally or was interrupted; execution may continue.
    Interrupt,
    /// The vcpu halted with no pending interrupt.
    Halt,
    /// A debug trap was hit. The vcpu is suspended but can be resumed.
    Debug,
    /// The vcpu is sitting in the halted state.
    Halted,
    /// Any other architecture-defined exception number.
    Other(i32),
}

impl CpuExitReason {
    /// Decodes a raw backend exit code.
    pub const fn from_raw(code: i32) -> Self {
        match code {
            EXCP_INTERRUPT => Self::Interrupt,
            EXCP_HLT => Self::Halt,
            EXCP_DEBUG => Self::Debug,
            EXCP_HALTED => Self::Halted,
            other => Self::Other(other),
        }
    }

    /// Returns the raw backend exit code.
    pub const fn raw(self) -> i32 {
        match self {
            Self::Interrupt => EXCP_INTERRUPT,
            Self::Halt => EXCP_HLT,
            Self::Debug => EXCP_DEBUG,
            Self::Halted => EXCP_HALTED,
            Self::Other(code) => code,
        }
    }
}

impl From<i32> for CpuExitReason {
    fn from(code: i32) -> Self {
        Self::from_raw(code)
    }
}

/// The kind of an invalid guest memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemFaultKind {
    /// Read from unmapped memory.
    ReadUnmapped,
    /// Write to unmapped memory.
    WriteUnmapped,
    /// Instruction fetch from unmapped memory.
    FetchUnmapped,
    /// Read from memory without read permission.
    ReadProt,
    /// Write to memory without write permission.
    WriteProt,
    /// Instruction fetch from non-executable memory.
    FetchProt,
    /// Unaligned read.
    ReadUnaligned,
    /// Unaligned write.
    WriteUnaligned,
    /// Unaligned instruction fetch.
    FetchUnaligned,
}

/// Snapshot of the fatal memory fault that terminated the last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemFault {
    /// The guest address of the faulting access.
    pub addr: VirtAddr,
    /// What kind of access failed.
    pub kind: MemFaultKind,
}

/// Why a run was finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishCause {
    /// The controller or the backend asked emulation to stop.
    StopRequest,
    /// An invalid memory access; details are in the context's fault fields.
    Fault(MemFault),
    /// The vcpu halted with nothing left to execute.
    Halt,
}

/// How one pass of the run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The run is over. The execution thread leaves its loop.
    Finished(FinishCause),
    /// A debug trap suspended the vcpu; it is `stopped` and resumable.
    DebugTrap,
    /// The context's exit request cancelled the pass before or between quanta.
    Cancelled,
    /// The vcpu was found unable to run inside the loop.
    Anomalous,
}

impl RunExit {
    /// Whether this pass terminated the run.
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}
