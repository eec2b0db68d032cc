// Copyright 2025 eraflo
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

//! A macro to declare typed sets of bit flags.

/// Declares a `Copy` flag-set struct with named constants, set operators and a
/// `Debug` output listing the flags by name.
#[macro_export]
#[doc(hidden)]
macro_rules! supermodel_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// No flag set.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// The raw bits.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Whether every flag of `other` is set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Whether at least one flag of `other` is set in `self`.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }
        }

        impl ::core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl ::core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl ::core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl ::core::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                let mut remaining = self.bits;
                let mut separator = "";
                write!(f, "{} {{ ", stringify!($name))?;
                $(
                    if $flag_value != 0 && (remaining & $flag_value) == $flag_value {
                        write!(f, "{}{}", separator, stringify!($flag_name))?;
                        remaining &= !$flag_value;
                        separator = " | ";
                    }
                )*
                if remaining != 0 {
                    write!(f, "{}UNKNOWN({:#x})", separator, remaining)?;
                } else if separator.is_empty() {
                    write!(f, "EMPTY")?;
                }
                write!(f, " }}")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::supermodel_bitflags;

    supermodel_bitflags! {
        /// Flags used only by these tests.
        pub struct Access: u8 {
            const READ = 1 << 0;
            const WRITE = 1 << 1;
            const EXECUTE = 1 << 2;
        }
    }

    #[test]
    fn default_is_empty() {
        assert_eq!(Access::default(), Access::EMPTY);
        assert_eq!(Access::EMPTY.bits(), 0);
        assert!(!Access::EMPTY.intersects(Access::READ));
        assert_eq!(format!("{:?}", Access::EMPTY), "Access { EMPTY }");
    }

    #[test]
    fn union_and_intersection() {
        let mut access = Access::READ | Access::EXECUTE;
        assert!(access.contains(Access::READ));
        assert!(!access.contains(Access::READ | Access::WRITE));
        assert!(access.intersects(Access::READ | Access::WRITE));
        assert_eq!(access & Access::EXECUTE, Access::EXECUTE);

        access |= Access::WRITE;
        assert_eq!(access.bits(), 0b111);
    }

    #[test]
    fn debug_lists_flags_in_declaration_order() {
        assert_eq!(
            format!("{:?}", Access::EXECUTE | Access::READ),
            "Access { READ | EXECUTE }"
        );
        let unknown = Access { bits: 0b1001 };
        assert_eq!(format!("{:?}", unknown), "Access { READ | UNKNOWN(0x8) }");
    }
}
