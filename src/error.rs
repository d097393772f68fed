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

use core::fmt;

/// Reports a host-level invariant violation and aborts the process.
///
/// This is not a guest fault: it means the scheduler or the backend broke an
/// invariant and the CPU state can no longer be trusted. There is no recovery
/// path.
#[cold]
pub fn hw_error(args: fmt::Arguments<'_>) -> ! {
    error!("hw error: {}", args);
    eprintln!("hw error: {}", args);
    std::process::abort()
}

/// Formats a diagnostic and aborts through [`hw_error`].
#[macro_export]
macro_rules! hw_error {
    ($($arg:tt)+) => {
        $crate::hw_error(::core::format_args!($($arg)+))
    };
}
