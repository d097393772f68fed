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

//! Motorola 68k / ColdFire family.
//!
//! Hook implementations for [`ArchCpu`](crate::ArchCpu) plus the `m5206`, `m5208`,
//! `cfv4e` and `any` models, registered under the `m68k-cpu` base type.

mod cpu;
mod models;

pub use cpu::*;
pub use models::{M68kFeatures, M68kModel};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{instantiate, ArchCpu, CpuModel, CpuState, ModelRegistry, CPU_INTERRUPT_HARD};
    use axerrno::AxError;
    use memory_addr::VirtAddr;
    use test_case::test_case;

    fn new_cpu(model: M68kModel) -> CpuState<M68kCpu> {
        let mut cpu = CpuState::new(instantiate(model));
        cpu.reset();
        cpu
    }

    #[test_case(M68kModel::M5206, M68kFeatures::CF_ISA_A; "m5206")]
    #[test_case(
        M68kModel::M5208,
        M68kFeatures::CF_ISA_A
            | M68kFeatures::CF_ISA_APLUSC
            | M68kFeatures::BRAL
            | M68kFeatures::CF_EMAC
            | M68kFeatures::USP;
        "m5208"
    )]
    #[test_case(
        M68kModel::Cfv4e,
        M68kFeatures::CF_ISA_A
            | M68kFeatures::CF_ISA_B
            | M68kFeatures::BRAL
            | M68kFeatures::CF_FPU
            | M68kFeatures::CF_EMAC
            | M68kFeatures::USP;
        "cfv4e"
    )]
    fn test_model_features(model: M68kModel, declared: M68kFeatures) {
        let cpu = instantiate(model);
        assert_eq!(cpu.features & declared, declared);
        assert_eq!(cpu.features, declared, "no undeclared feature bit may be set");
    }

    #[test]
    fn test_any_prefers_emac_over_mac() {
        let cpu = instantiate(M68kModel::Any);
        assert!(cpu.has_feature(M68kFeatures::CF_EMAC | M68kFeatures::CF_EMAC_B));
        assert!(!cpu.has_feature(M68kFeatures::CF_MAC));
        assert!(cpu.has_feature(M68kFeatures::EXT_FULL | M68kFeatures::WORD_INDEX));
    }

    #[test]
    fn test_set_feature_mac_emac_exclusive() {
        let mut cpu = M68kCpu::new();
        cpu.set_feature(M68kFeatures::CF_MAC);
        assert!(cpu.has_feature(M68kFeatures::CF_MAC));
        cpu.set_feature(M68kFeatures::CF_EMAC);
        assert!(cpu.has_feature(M68kFeatures::CF_EMAC));
        assert!(!cpu.has_feature(M68kFeatures::CF_MAC));
        cpu.set_feature(M68kFeatures::CF_MAC);
        assert!(!cpu.has_feature(M68kFeatures::CF_MAC));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ModelRegistry::new();
        registry.register_family::<M68kModel>().unwrap();

        for model in M68kModel::models() {
            assert_eq!(
                registry.class_by_name::<M68kModel>(model.name()),
                Ok(*model)
            );
            assert_eq!(
                registry.class_by_name::<M68kModel>(&model.type_name()),
                Ok(*model)
            );
        }
        assert!(registry.contains("cfv4e-m68k-cpu"));
        assert_eq!(
            registry.class_by_name::<M68kModel>("m68000"),
            Err(AxError::NotFound)
        );
        assert_eq!(
            registry.class_by_name::<M68kModel>("m68k-cpu"),
            Err(AxError::NotFound)
        );
        assert_eq!(
            registry.class_by_name::<M68kModel>(""),
            Err(AxError::NotFound)
        );
        assert_eq!(
            registry.register_family::<M68kModel>(),
            Err(AxError::AlreadyExists)
        );
    }

    #[test]
    fn test_reset_keeps_features() {
        let mut cpu = new_cpu(M68kModel::Cfv4e);
        cpu.arch.dregs[3] = 0xdead_beef;
        cpu.arch.pc = 0x4000;
        cpu.arch.cc_op = CcOp::Add;
        cpu.reset();

        assert_eq!(cpu.arch.dregs, [0; 8]);
        assert_eq!(cpu.arch.pc, 0);
        assert_eq!(cpu.arch.cc_op, CcOp::Flags);
        assert_eq!(cpu.arch.features, M68kModel::Cfv4e.features());
        #[cfg(not(feature = "user-only"))]
        assert_eq!(cpu.arch.sr, 0x2700);
    }

    #[test]
    fn test_pc_accessors() {
        let mut cpu = new_cpu(M68kModel::M5206);
        cpu.set_pc(VirtAddr::from(0x1234));
        assert_eq!(cpu.arch.pc, 0x1234);
        assert_eq!(cpu.pc(), VirtAddr::from(0x1234));
    }

    #[test]
    fn test_switch_sp() {
        let mut cpu = M68kCpu::new();
        cpu.sp = [0x1000, 0x2000];
        cpu.current_sp = M68K_USP;
        cpu.aregs[7] = 0x2100;
        cpu.sr = SR_S;
        cpu.cacr = M68K_CACR_EUSP;
        cpu.switch_sp();
        assert_eq!(cpu.current_sp, M68K_SSP);
        assert_eq!(cpu.aregs[7], 0x1000);
        assert_eq!(cpu.sp[M68K_USP], 0x2100);

        // Without EUSP there is a single stack.
        cpu.cacr = 0;
        cpu.switch_sp();
        assert_eq!(cpu.current_sp, M68K_USP);
        assert_eq!(cpu.aregs[7], 0x2100);
    }

    #[test]
    fn test_has_work_follows_irq_level() {
        let mut cpu = new_cpu(M68kModel::M5208);
        assert!(!cpu.has_work());
        m68k_set_irq_level(&mut cpu, 3, 64);
        assert!(cpu.has_work());
        assert_eq!(cpu.interrupt_request & CPU_INTERRUPT_HARD, CPU_INTERRUPT_HARD);
        m68k_set_irq_level(&mut cpu, 0, 0);
        assert!(!cpu.has_work());
    }

    #[cfg(not(feature = "user-only"))]
    #[test]
    fn test_exec_interrupt_respects_mask() {
        let mut cpu = new_cpu(M68kModel::M5208);
        // Reset leaves the mask at 7: nothing gets through.
        m68k_set_irq_level(&mut cpu, 3, 64);
        assert!(!cpu.exec_interrupt());
        assert!(cpu.arch.pending_frame.is_none());

        cpu.arch.sr = SR_S; // mask 0
        cpu.arch.vbr = 0x8000;
        cpu.arch.pc = 0x1000;
        cpu.arch.aregs[7] = 0x3003;
        assert!(cpu.exec_interrupt());

        let frame = cpu.arch.pending_frame.unwrap();
        assert_eq!(frame.return_pc, 0x1000);
        assert_eq!(frame.vector_addr, 0x8000 + 64 * 4);
        assert_eq!(frame.sp, 0x3000 - 8);
        assert_eq!(frame.format >> 16 & 0x3ff, 64 * 4);
        assert_eq!(cpu.arch.aregs[7], frame.sp);
        assert_eq!(cpu.arch.interrupt_mask(), 3);
        assert!(cpu.arch.is_supervisor());
        assert_eq!(cpu.exception_index, -1);
    }

    #[cfg(not(feature = "user-only"))]
    #[test]
    fn test_irq_level_is_masked_to_priority_range() {
        let mut cpu = new_cpu(M68kModel::M5208);
        m68k_set_irq_level(&mut cpu, 9, 64);
        assert_eq!(cpu.arch.pending_level, 1);
        assert!(cpu.has_work());

        cpu.arch.sr = SR_S;
        assert!(cpu.exec_interrupt());
        assert_eq!(cpu.arch.interrupt_mask(), 1);
        assert_eq!(cpu.arch.sr & !SR_I, SR_S);

        m68k_set_irq_level(&mut cpu, 8, 64);
        assert_eq!(cpu.arch.pending_level, 0);
        assert!(!cpu.has_work());
    }

    #[cfg(not(feature = "user-only"))]
    #[test]
    fn test_do_interrupt_trap_and_halt() {
        let mut cpu = new_cpu(M68kModel::Any);
        cpu.arch.pc = 0x2000;
        cpu.exception_index = EXCP_TRAP0 + 1;
        cpu.do_interrupt();
        let frame = cpu.arch.pending_frame.unwrap();
        assert_eq!(frame.return_pc, 0x2002);
        assert_eq!(frame.vector_addr, ((EXCP_TRAP0 + 1) as u32) << 2);

        cpu.exception_index = EXCP_HALT_INSN;
        cpu.do_interrupt();
        assert!(cpu.halted);
        assert_eq!(cpu.exception_index, crate::EXCP_HLT);
    }

    #[cfg(not(feature = "user-only"))]
    #[test]
    fn test_get_phys_page_debug_is_identity() {
        let cpu = new_cpu(M68kModel::M5206);
        assert_eq!(
            M68kCpu::get_phys_page_debug(&cpu, VirtAddr::from(0x12_3456)),
            Some(memory_addr::PhysAddr::from(0x12_3456))
        );
    }

    #[cfg(feature = "user-only")]
    #[test]
    fn test_handle_mmu_fault_raises_access() {
        let mut cpu = new_cpu(M68kModel::M5206);
        assert!(M68kCpu::handle_mmu_fault(
            &mut cpu,
            VirtAddr::from(0xbad0),
            crate::MmuAccess::Write,
            0
        ));
        assert_eq!(cpu.exception_index, EXCP_ACCESS);
        assert_eq!(cpu.arch.mmu_ar, 0xbad0);
    }

    #[test]
    fn test_disas_info() {
        let info = new_cpu(M68kModel::Any).disas_info();
        assert_eq!(info.arch, Some("m68k"));
        assert!(info.big_endian);
    }
}
