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

use crate::{ArchCpu, DisasInfo, MemFault, MemFaultKind};

/// The hardware interrupt line.
pub const CPU_INTERRUPT_HARD: u32 = 0x0002;

/// CPU state shared between the scheduler, the architecture hooks and the backend.
///
/// `arch` is the opaque family-specific register/feature block. The other fields
/// are common to every family. The scheduler never reads the program counter
/// directly, it always goes through [`ArchCpu::get_pc`] / [`ArchCpu::set_pc`].
pub struct CpuState<A: ArchCpu> {
    /// The architecture-specific state.
    pub arch: A,
    /// Asserted interrupt lines (`CPU_INTERRUPT_*`).
    pub interrupt_request: u32,
    /// The pending exception number, `-1` if none.
    pub exception_index: i32,
    /// The vcpu executes nothing until an interrupt arrives.
    pub halted: bool,
    /// Kind of the invalid memory access hit in the last quantum, if any.
    pub invalid_error: Option<MemFaultKind>,
    /// Address of that access. Only meaningful when `invalid_error` is set.
    pub invalid_addr: VirtAddr,
}

impl<A: ArchCpu> CpuState<A> {
    /// Wraps freshly initialized architecture state.
    pub fn new(arch: A) -> Self {
        Self {
            arch,
            interrupt_request: 0,
            exception_index: -1,
            halted: false,
            invalid_error: None,
            invalid_addr: VirtAddr::from(0),
        }
    }

    /// Resets the vcpu: base reset first, then the family reset.
    pub fn reset(&mut self) {
        self.interrupt_request = 0;
        self.exception_index = -1;
        self.halted = false;
        self.clear_fault();
        A::reset(self);
    }

    /// Returns the program counter.
    pub fn pc(&self) -> VirtAddr {
        self.arch.get_pc()
    }

    /// Sets the program counter.
    pub fn set_pc(&mut self, pc: VirtAddr) {
        self.arch.set_pc(pc);
    }

    /// Whether the vcpu should leave the halted state.
    pub fn has_work(&self) -> bool {
        A::has_work(self)
    }

    /// Asserts the given interrupt lines.
    pub fn raise_interrupt(&mut self, mask: u32) {
        self.interrupt_request |= mask;
    }

    /// Deasserts the given interrupt lines.
    pub fn lower_interrupt(&mut self, mask: u32) {
        self.interrupt_request &= !mask;
    }

    /// Lets the family take a pending interrupt. Called by the backend between blocks.
    pub fn exec_interrupt(&mut self) -> bool {
        let request = self.interrupt_request;
        A::exec_interrupt(self, request)
    }

    /// Delivers the exception in `exception_index`. Called by the backend.
    pub fn do_interrupt(&mut self) {
        A::do_interrupt(self);
    }

    /// Records an invalid memory access. The run loop turns it into a fatal exit.
    pub fn record_fault(&mut self, addr: VirtAddr, kind: MemFaultKind) {
        self.invalid_addr = addr;
        self.invalid_error = Some(kind);
    }

    /// Returns the recorded invalid memory access, if any.
    pub fn fault(&self) -> Option<MemFault> {
        self.invalid_error.map(|kind| MemFault {
            addr: self.invalid_addr,
            kind,
        })
    }

    /// Forgets the recorded invalid memory access.
    pub fn clear_fault(&mut self) {
        self.invalid_error = None;
        self.invalid_addr = VirtAddr::from(0);
    }

    /// Asks the family which disassembler decodes its code.
    pub fn disas_info(&self) -> DisasInfo {
        let mut info = DisasInfo::default();
        self.arch.disas_set_info(&mut info);
        info
    }
}
