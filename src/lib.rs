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

//! AxTcg - vCPU execution core for TCG-style emulators.
//!
//! This crate runs a single virtual CPU against an external translation/execution
//! backend. It owns the run loop that interprets the backend's exit reasons, the
//! vCPU lifecycle (construct, run, park, pause) and the cross-thread signaling
//! between the controller and the execution thread. Architecture-specific work is
//! delegated to implementations of the [`ArchCpu`] trait, and named CPU variants of
//! a family are selected through the [`ModelRegistry`].
//!
//! # Features
//!
//! - Architecture-agnostic execution scheduler with one global execution lock
//! - State machine for the vCPU lifecycle (Uncreated → Created → Running ⇄ Stopped)
//! - Guest faults, halts and debug traps reported as data, never as errors
//! - Model registry with feature-bitmask CPU variants
//! - A reference Motorola 68k / ColdFire family in [`m68k`]
//!
//! # Cargo features
//!
//! - `user-only`: the family hook table carries `handle_mmu_fault` (user-mode
//!   translation) instead of `get_phys_page_debug` (system-mode introspection).

#[macro_use]
extern crate log;

// Core modules
mod arch_cpu; // Architecture hook table
mod backend; // Translation/execution backend contract
mod cpu; // CPU state common to every family
mod emulator; // Emulator context and controller entry points
mod error; // Host invariant violations
mod exec; // The run loop and the execution thread body
mod exit; // Backend exit codes, guest faults and run outcomes
mod model; // CPU model registry
mod vcpu; // vCPU run-state flags

pub mod m68k; // Reference architecture family

// Public API exports
pub use arch_cpu::{ArchCpu, DisasInfo, MmuAccess};
pub use backend::{ExecBackend, ExecSignals};
pub use cpu::{CpuState, CPU_INTERRUPT_HARD};
pub use emulator::{Emulator, EmulatorConfig};
pub use error::hw_error;
pub use exit::*;
pub use model::{instantiate, CpuModel, ModelRegistry};
pub use vcpu::{cpu_can_run, VCpu, VCpuState};

pub use memory_addr::{PhysAddr, VirtAddr};
