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

#[cfg(feature = "user-only")]
use crate::MmuAccess;
use crate::{ArchCpu, CpuState, DisasInfo, CPU_INTERRUPT_HARD};

use super::{M68kFeatures, M68kModel};

/// Supervisor mode.
pub const SR_S: u16 = 0x2000;
/// Master/interrupt state.
pub const SR_M: u16 = 0x1000;
/// Interrupt priority mask.
pub const SR_I: u16 = 0x0700;
/// Shift of the interrupt priority mask.
pub const SR_I_SHIFT: u16 = 8;

/// CACR: enable the separate user stack pointer.
pub const M68K_CACR_EUSP: u32 = 0x10;

/// Index of the supervisor stack pointer in [`M68kCpu::sp`].
pub const M68K_SSP: usize = 0;
/// Index of the user stack pointer in [`M68kCpu::sp`].
pub const M68K_USP: usize = 1;

/// Access fault.
pub const EXCP_ACCESS: i32 = 2;
/// Address error.
pub const EXCP_ADDRESS: i32 = 3;
/// Illegal instruction.
pub const EXCP_ILLEGAL: i32 = 4;
/// First `trap #n` vector.
pub const EXCP_TRAP0: i32 = 32;
/// Last `trap #n` vector.
pub const EXCP_TRAP15: i32 = 47;
/// Return from exception, handled by the backend.
pub const EXCP_RTE: i32 = 0x100;
/// `halt` instruction.
pub const EXCP_HALT_INSN: i32 = 0x101;

/// How the condition codes are currently represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CcOp {
    /// Unknown, must be computed at runtime.
    #[default]
    Dynamic,
    /// Flags are stored directly.
    Flags,
    /// Result of a logic operation.
    Logic,
    /// Result of an addition.
    Add,
    /// Result of a subtraction.
    Sub,
}

/// Exception stack frame prepared by [`ArchCpu::do_interrupt`].
///
/// The hooks have no access to guest memory: the backend pushes `format` and
/// `return_pc` at `sp` (format word at `sp`, return address at `sp + 4`) and loads
/// the new PC from `vector_addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionFrame {
    /// Stack pointer after the frame is pushed.
    pub sp: u32,
    /// ColdFire format/vector/status word.
    pub format: u32,
    /// Address execution resumes at on `rte`.
    pub return_pc: u32,
    /// Address of the vector table slot holding the handler.
    pub vector_addr: u32,
}

/// Motorola 68k / ColdFire architecture state.
#[derive(Debug, Clone, PartialEq)]
pub struct M68kCpu {
    /// Data registers D0-D7.
    pub dregs: [u32; 8],
    /// Address registers A0-A7. A7 is the active stack pointer.
    pub aregs: [u32; 8],
    /// Program counter.
    pub pc: u32,
    /// Status register.
    pub sr: u16,
    /// Which stack pointer A7 currently holds.
    pub current_sp: usize,
    /// Banked stack pointers, indexed by [`M68K_SSP`] / [`M68K_USP`].
    pub sp: [u32; 2],
    /// Condition code representation.
    pub cc_op: CcOp,
    pub cc_dest: u32,
    pub cc_src: u32,
    pub cc_x: u32,
    /// Floating-point registers.
    pub fregs: [f64; 8],
    pub fpcr: u32,
    pub fpsr: u32,
    /// MAC accumulators.
    pub macc: [u64; 4],
    pub macsr: u32,
    pub mac_mask: u32,
    /// Fault address of the last access error.
    pub mmu_ar: u32,
    /// Vector base register.
    pub vbr: u32,
    pub mbar: u32,
    pub rambar0: u32,
    /// Cache control register.
    pub cacr: u32,
    /// Vector of the pending hardware interrupt.
    pub pending_vector: u32,
    /// Level of the pending hardware interrupt, `0` if none.
    pub pending_level: u32,
    /// Frame the backend must push before running the handler.
    pub pending_frame: Option<ExceptionFrame>,
    /// Enabled ISA features. Survives reset.
    pub features: M68kFeatures,
}

impl M68kCpu {
    /// Enables a feature.
    ///
    /// `CF_MAC` and `CF_EMAC` exclude each other; EMAC wins.
    pub fn set_feature(&mut self, feature: M68kFeatures) {
        if feature.contains(M68kFeatures::CF_MAC) && self.has_feature(M68kFeatures::CF_EMAC) {
            warn!("m68k: ignoring CF_MAC, CF_EMAC is already enabled");
            return;
        }
        if feature.contains(M68kFeatures::CF_EMAC) {
            self.features.remove(M68kFeatures::CF_MAC);
        }
        self.features.insert(feature);
    }

    /// Whether every bit of `feature` is enabled.
    pub fn has_feature(&self, feature: M68kFeatures) -> bool {
        self.features.contains(feature)
    }

    /// Current interrupt priority mask.
    pub fn interrupt_mask(&self) -> u32 {
        u32::from((self.sr & SR_I) >> SR_I_SHIFT)
    }

    /// Whether the core runs in supervisor mode.
    pub fn is_supervisor(&self) -> bool {
        self.sr & SR_S != 0
    }

    /// Banks A7 and loads the stack pointer matching the current mode.
    pub fn switch_sp(&mut self) {
        self.sp[self.current_sp] = self.aregs[7];
        let new_sp = if self.is_supervisor() && self.cacr & M68K_CACR_EUSP != 0 {
            M68K_SSP
        } else {
            M68K_USP
        };
        self.aregs[7] = self.sp[new_sp];
        self.current_sp = new_sp;
    }

    fn zeroed(features: M68kFeatures) -> Self {
        Self {
            dregs: [0; 8],
            aregs: [0; 8],
            pc: 0,
            sr: 0,
            current_sp: M68K_SSP,
            sp: [0; 2],
            cc_op: CcOp::Dynamic,
            cc_dest: 0,
            cc_src: 0,
            cc_x: 0,
            fregs: [0.0; 8],
            fpcr: 0,
            fpsr: 0,
            macc: [0; 4],
            macsr: 0,
            mac_mask: 0,
            mmu_ar: 0,
            vbr: 0,
            mbar: 0,
            rambar0: 0,
            cacr: 0,
            pending_vector: 0,
            pending_level: 0,
            pending_frame: None,
            features,
        }
    }
}

/// Sets the pending hardware interrupt level and vector, asserting or releasing
/// the hard interrupt line.
///
/// Only the low three bits of `level` are used: the priority mask holds 0-7.
pub fn m68k_set_irq_level(cpu: &mut CpuState<M68kCpu>, level: u32, vector: u32) {
    let level = level & 7;
    cpu.arch.pending_level = level;
    cpu.arch.pending_vector = vector;
    if level != 0 {
        cpu.raise_interrupt(CPU_INTERRUPT_HARD);
    } else {
        cpu.lower_interrupt(CPU_INTERRUPT_HARD);
    }
}

#[cfg(not(feature = "user-only"))]
fn do_interrupt_all(cpu: &mut CpuState<M68kCpu>, is_hw: bool) {
    let mut retaddr = cpu.arch.pc;
    if !is_hw {
        match cpu.exception_index {
            EXCP_RTE => {
                // The frame lives in guest memory; the backend unwinds it.
                return;
            }
            EXCP_HALT_INSN => {
                cpu.halted = true;
                cpu.exception_index = crate::EXCP_HLT;
                return;
            }
            EXCP_TRAP0..=EXCP_TRAP15 => {
                // Resume after the trap instruction.
                retaddr = retaddr.wrapping_add(2);
            }
            _ => {}
        }
    }

    let vector = (cpu.exception_index as u32) << 2;
    let env = &mut cpu.arch;
    let format = 0x4000_0000
        | ((env.aregs[7] & 3) << 28)
        | (vector << 16)
        | u32::from(env.sr);

    env.sr |= SR_S;
    if is_hw {
        env.sr = (env.sr & !SR_I) | (((env.pending_level & 7) as u16) << SR_I_SHIFT);
        env.sr &= !SR_M;
    }
    env.switch_sp();

    let sp = (env.aregs[7] & !3).wrapping_sub(8);
    env.aregs[7] = sp;
    env.pending_frame = Some(ExceptionFrame {
        sp,
        format,
        return_pc: retaddr,
        vector_addr: env.vbr.wrapping_add(vector),
    });
    cpu.exception_index = -1;
}

#[cfg(feature = "user-only")]
fn do_interrupt_all(cpu: &mut CpuState<M68kCpu>, _is_hw: bool) {
    // Signals are delivered by the user-mode loop.
    cpu.exception_index = -1;
}

impl ArchCpu for M68kCpu {
    type Model = M68kModel;

    fn new() -> Self {
        Self::zeroed(M68kFeatures::empty())
    }

    fn reset(cpu: &mut CpuState<Self>) {
        let env = &mut cpu.arch;
        *env = Self::zeroed(env.features);
        #[cfg(not(feature = "user-only"))]
        {
            env.sr = 0x2700;
        }
        env.switch_sp();
        env.cc_op = CcOp::Flags;
        // TODO: load the initial PC from the reset vector once the backend exposes
        // guest memory to the hooks.
        env.pc = 0;
    }

    fn has_work(cpu: &CpuState<Self>) -> bool {
        cpu.interrupt_request & CPU_INTERRUPT_HARD != 0
    }

    fn do_interrupt(cpu: &mut CpuState<Self>) {
        do_interrupt_all(cpu, false);
    }

    fn exec_interrupt(cpu: &mut CpuState<Self>, interrupt_request: u32) -> bool {
        if interrupt_request & CPU_INTERRUPT_HARD != 0
            && cpu.arch.interrupt_mask() < cpu.arch.pending_level
        {
            cpu.exception_index = cpu.arch.pending_vector as i32;
            do_interrupt_all(cpu, true);
            return true;
        }
        false
    }

    fn get_pc(&self) -> VirtAddr {
        VirtAddr::from(self.pc as usize)
    }

    fn set_pc(&mut self, pc: VirtAddr) {
        self.pc = pc.as_usize() as u32;
    }

    #[cfg(feature = "user-only")]
    fn handle_mmu_fault(
        cpu: &mut CpuState<Self>,
        addr: VirtAddr,
        _access: MmuAccess,
        _mmu_idx: usize,
    ) -> bool {
        cpu.exception_index = EXCP_ACCESS;
        cpu.arch.mmu_ar = addr.as_usize() as u32;
        true
    }

    #[cfg(not(feature = "user-only"))]
    fn get_phys_page_debug(_cpu: &CpuState<Self>, addr: VirtAddr) -> Option<PhysAddr> {
        // No MMU: guest virtual addresses are physical.
        Some(PhysAddr::from(addr.as_usize()))
    }

    fn disas_set_info(&self, info: &mut DisasInfo) {
        info.arch = Some("m68k");
        info.big_endian = true;
    }
}
