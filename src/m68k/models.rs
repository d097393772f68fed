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

use bitflags::bitflags;

use super::M68kCpu;
use crate::CpuModel;

bitflags! {
    /// Instruction set features of an m68k / ColdFire core.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct M68kFeatures: u32 {
        /// Base ColdFire ISA_A.
        const CF_ISA_A = 1 << 0;
        /// ColdFire ISA_B extensions.
        const CF_ISA_B = 1 << 1;
        /// ColdFire ISA_A+ (ISA_A plus ISA_C bits).
        const CF_ISA_APLUSC = 1 << 2;
        /// Long branch offsets (`bra.l`).
        const BRAL = 1 << 3;
        /// ColdFire FPU.
        const CF_FPU = 1 << 4;
        /// Multiply-accumulate unit. Excludes `CF_EMAC`.
        const CF_MAC = 1 << 5;
        /// Enhanced multiply-accumulate unit.
        const CF_EMAC = 1 << 6;
        /// EMAC_B extensions (dual accumulate).
        const CF_EMAC_B = 1 << 7;
        /// Separate user stack pointer.
        const USP = 1 << 8;
        /// Full 68k extension word addressing.
        const EXT_FULL = 1 << 9;
        /// Word-sized index registers.
        const WORD_INDEX = 1 << 10;
        /// Scaled index registers.
        const SCALED_INDEX = 1 << 11;
        /// 32x32 -> 64 multiply and 64/32 divide.
        const LONG_MULDIV = 1 << 12;
        /// `bkpt` instruction.
        const BKPT = 1 << 13;
        /// `rtd` instruction.
        const RTD = 1 << 14;
    }
}

/// The named m68k CPU models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum M68kModel {
    /// MCF5206: plain ISA_A.
    M5206,
    /// MCF5208: ISA_A+ with EMAC.
    M5208,
    /// ColdFire V4e: ISA_B with FPU and EMAC.
    Cfv4e,
    /// Everything the emulator can do.
    Any,
}

impl M68kModel {
    /// The features this model enables.
    pub const fn features(self) -> M68kFeatures {
        match self {
            Self::M5206 => M68kFeatures::CF_ISA_A,
            Self::M5208 => M68kFeatures::CF_ISA_A
                .union(M68kFeatures::CF_ISA_APLUSC)
                .union(M68kFeatures::BRAL)
                .union(M68kFeatures::CF_EMAC)
                .union(M68kFeatures::USP),
            Self::Cfv4e => M68kFeatures::CF_ISA_A
                .union(M68kFeatures::CF_ISA_B)
                .union(M68kFeatures::BRAL)
                .union(M68kFeatures::CF_FPU)
                .union(M68kFeatures::CF_EMAC)
                .union(M68kFeatures::USP),
            // MAC and EMAC are mutually exclusive: EMAC is picked, it is mostly
            // backwards compatible.
            Self::Any => M68kFeatures::CF_ISA_A
                .union(M68kFeatures::CF_ISA_B)
                .union(M68kFeatures::CF_ISA_APLUSC)
                .union(M68kFeatures::BRAL)
                .union(M68kFeatures::CF_FPU)
                .union(M68kFeatures::CF_EMAC)
                .union(M68kFeatures::CF_EMAC_B)
                .union(M68kFeatures::USP)
                .union(M68kFeatures::EXT_FULL)
                .union(M68kFeatures::WORD_INDEX),
        }
    }
}

const MODELS: [M68kModel; 4] = [
    M68kModel::M5206,
    M68kModel::M5208,
    M68kModel::Cfv4e,
    M68kModel::Any,
];

impl CpuModel for M68kModel {
    type Arch = M68kCpu;

    const TYPE_NAME: &'static str = "m68k-cpu";

    fn models() -> &'static [Self] {
        &MODELS
    }

    fn name(self) -> &'static str {
        match self {
            Self::M5206 => "m5206",
            Self::M5208 => "m5208",
            Self::Cfv4e => "cfv4e",
            Self::Any => "any",
        }
    }

    fn instance_init(self, cpu: &mut M68kCpu) {
        for feature in self.features().iter() {
            cpu.set_feature(feature);
        }
    }
}
