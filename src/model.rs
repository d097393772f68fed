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

use core::any::TypeId;
use core::fmt::Debug;
use std::collections::BTreeMap;

use axerrno::{ax_err, ax_err_type, AxResult};

use crate::ArchCpu;

/// A named CPU variant of one architecture family.
///
/// Implemented by a closed enum per family. Every variant carries its feature
/// configuration as plain data, applied by [`CpuModel::instance_init`].
pub trait CpuModel: Copy + Debug + Send + Sync + 'static {
    /// The family this model belongs to.
    type Arch: ArchCpu<Model = Self>;

    /// Type name of the family's abstract base, e.g. `"m68k-cpu"`.
    ///
    /// Concrete models are registered as `"<model>-<TYPE_NAME>"`.
    const TYPE_NAME: &'static str;

    /// Every concrete model of the family.
    fn models() -> &'static [Self];

    /// The model name, unique within the family.
    fn name(self) -> &'static str;

    /// Applies the model's features on top of the base-initialized state.
    fn instance_init(self, cpu: &mut Self::Arch);

    /// The registered type name of this model.
    fn type_name(self) -> String {
        format!("{}-{}", self.name(), Self::TYPE_NAME)
    }
}

/// Builds the architecture state of `model`: base initializer first, then the
/// model initializer.
pub fn instantiate<M: CpuModel>(model: M) -> M::Arch {
    let mut arch = M::Arch::new();
    model.instance_init(&mut arch);
    arch
}

/// One registered type.
#[derive(Debug, Clone, Copy)]
struct TypeEntry {
    /// Capability tag: the family the type belongs to.
    family: TypeId,
    /// Index into the family's model list, `None` for the abstract base.
    model: Option<usize>,
}

impl TypeEntry {
    const fn is_abstract(&self) -> bool {
        self.model.is_none()
    }
}

/// Maps type names to CPU models across families.
///
/// Each family registers its abstract base under [`CpuModel::TYPE_NAME`] and every
/// concrete model under [`CpuModel::type_name`]. Lookups are typed by family, so a
/// name resolving to another family's type is rejected.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    types: BTreeMap<String, TypeEntry>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a family: its abstract base plus all of its concrete models.
    pub fn register_family<M: CpuModel>(&mut self) -> AxResult {
        if self.types.contains_key(M::TYPE_NAME) {
            return ax_err!(
                AlreadyExists,
                format!("cpu family {} is already registered", M::TYPE_NAME)
            );
        }
        let family = TypeId::of::<M::Arch>();
        self.types.insert(
            M::TYPE_NAME.into(),
            TypeEntry {
                family,
                model: None,
            },
        );
        for (idx, model) in M::models().iter().enumerate() {
            self.types.insert(
                model.type_name(),
                TypeEntry {
                    family,
                    model: Some(idx),
                },
            );
        }
        debug!(
            "registered cpu family {} with {} models",
            M::TYPE_NAME,
            M::models().len()
        );
        Ok(())
    }

    /// Whether a type of that exact name is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Iterates over all registered type names.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Resolves `cpu_model` to a concrete model of family `M`.
    ///
    /// The short model name (`"m5208"`) and the full type name (`"m5208-m68k-cpu"`)
    /// are both accepted. Fails with [`NotFound`](axerrno::AxError::NotFound) for an
    /// unknown name, for the abstract base, and for a type of another family.
    pub fn class_by_name<M: CpuModel>(&self, cpu_model: &str) -> AxResult<M> {
        if cpu_model.is_empty() {
            return ax_err!(NotFound, "empty cpu model name");
        }
        let type_name = format!("{}-{}", cpu_model, M::TYPE_NAME);
        let entry = self
            .types
            .get(&type_name)
            .or_else(|| self.types.get(cpu_model))
            .ok_or_else(|| ax_err_type!(NotFound, format!("unknown cpu model {cpu_model}")))?;
        if entry.family != TypeId::of::<M::Arch>() {
            return ax_err!(
                NotFound,
                format!("cpu model {cpu_model} is not a {}", M::TYPE_NAME)
            );
        }
        if entry.is_abstract() {
            return ax_err!(NotFound, format!("cpu model {cpu_model} is abstract"));
        }
        entry
            .model
            .and_then(|idx| M::models().get(idx).copied())
            .ok_or_else(|| ax_err_type!(NotFound, format!("stale cpu model {cpu_model}")))
    }
}
