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

#[cfg(not(feature = "user-only"))]
use memory_addr::PhysAddr;
use memory_addr::VirtAddr;

use crate::{CpuModel, CpuState};

/// Architecture hook table.
///
/// This trait is the capability interface a CPU family must implement so that the
/// shared scheduler can run it. It is implemented once per family, not per model:
/// models only differ in the feature bits their initializer sets on the state.
///
/// # Design Philosophy
///
/// - **Base first, family second**: reset is split into a base step owned by
///   [`CpuState::reset`] and the family step [`ArchCpu::reset`]. The base step
///   always runs first, there is no saved parent hook to call.
/// - **Backend-facing hooks**: interrupt delivery and address translation are
///   invoked by the execution backend, never by the scheduler itself.
/// - **One translation hook per build**: `handle_mmu_fault` exists with the
///   `user-only` feature, `get_phys_page_debug` without it. Never both.
pub trait ArchCpu: Sized + Send + 'static {
    /// The named models of this family.
    type Model: CpuModel<Arch = Self>;

    /// Creates the architecture state shared by every model of the family.
    ///
    /// This is the base initializer. Model-specific features are applied on top of
    /// it by [`CpuModel::instance_init`].
    fn new() -> Self;

    /// Brings the architecture state back to power-on values.
    ///
    /// Called by [`CpuState::reset`] after the base reset has run.
    fn reset(cpu: &mut CpuState<Self>);

    /// Whether a pending interrupt line should wake the vcpu from halt.
    fn has_work(cpu: &CpuState<Self>) -> bool;

    /// Delivers the exception recorded in `cpu.exception_index`.
    fn do_interrupt(cpu: &mut CpuState<Self>);

    /// Checks pending interrupt lines before executing a block and delivers one if
    /// the architecture accepts it. Returns `true` if an interrupt was taken.
    fn exec_interrupt(cpu: &mut CpuState<Self>, interrupt_request: u32) -> bool;

    /// Returns the program counter.
    fn get_pc(&self) -> VirtAddr;

    /// Sets the program counter.
    fn set_pc(&mut self, pc: VirtAddr);

    /// Handles a user-mode translation fault at `addr`.
    ///
    /// Returns `true` if a guest exception was raised.
    #[cfg(feature = "user-only")]
    fn handle_mmu_fault(
        cpu: &mut CpuState<Self>,
        addr: VirtAddr,
        access: MmuAccess,
        mmu_idx: usize,
    ) -> bool;

    /// Translates a guest virtual address for introspection, without side effects.
    ///
    /// Returns `None` if the address has no mapping.
    #[cfg(not(feature = "user-only"))]
    fn get_phys_page_debug(cpu: &CpuState<Self>, addr: VirtAddr) -> Option<PhysAddr>;

    /// Wires a disassembler by architecture name. Purely informational.
    fn disas_set_info(&self, _info: &mut DisasInfo) {}
}

/// The access that caused a translation fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuAccess {
    /// Data load.
    Read,
    /// Data store.
    Write,
    /// Instruction fetch.
    Fetch,
}

/// Disassembler selection filled in by [`ArchCpu::disas_set_info`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisasInfo {
    /// Name of the disassembler backend, `None` if the family has none.
    pub arch: Option<&'static str>,
    /// Machine variant understood by that backend.
    pub mach: u32,
    /// Whether instructions are stored big-endian.
    pub big_endian: bool,
}
