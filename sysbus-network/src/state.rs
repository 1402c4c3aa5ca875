//! NetworkManager numeric state codes.
//!
//! NetworkManager reports states as bare `u32` values. Each enum keeps the
//! wire value through [`code`](NmState::code) and falls back to
//! `Unrecognized` for values newer releases may add.

use std::fmt;

/// Generates a closed code enum with an `Unrecognized(u32)` fallback
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            /// A code this version does not know about
            Unrecognized(u32),
        }

        impl $name {
            pub fn from_code(code: u32) -> Self {
                match code {
                    $($code => $name::$variant,)+
                    other => $name::Unrecognized(other),
                }
            }

            /// The value NetworkManager uses on the wire.
            pub fn code(&self) -> u32 {
                match self {
                    $($name::$variant => $code,)+
                    $name::Unrecognized(code) => *code,
                }
            }

            /// Human readable label.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Unrecognized(_) => "Unrecognized",
                }
            }
        }

        impl From<u32> for $name {
            fn from(code: u32) -> Self {
                $name::from_code(code)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $name::Unrecognized(code) => write!(f, "Unrecognized ({})", code),
                    known => f.write_str(known.label()),
                }
            }
        }
    };
}

code_enum! {
    /// Overall networking state (`NMState`).
    NmState {
        Unknown = 0 => "Unknown",
        /// Networking is disabled
        Asleep = 10 => "Asleep",
        Disconnected = 20 => "Disconnected",
        Disconnecting = 30 => "Disconnecting",
        Connecting = 40 => "Connecting",
        /// Only local IPv4 and/or IPv6 connectivity
        ConnectedLocal = 50 => "Connected - Local",
        /// Only site-wide IPv4 and/or IPv6 connectivity
        ConnectedSite = 60 => "Connected - Site",
        /// Global Internet connectivity
        ConnectedGlobal = 70 => "Connected - Global",
    }
}

code_enum! {
    /// Result of a connectivity check (`NMConnectivityState`).
    Connectivity {
        Unknown = 0 => "Unknown",
        /// Not connected to any network
        None = 1 => "None",
        /// Behind a captive portal
        Portal = 2 => "Portal",
        /// Connected, but the full Internet is not reachable
        Limited = 3 => "Limited",
        Full = 4 => "Full",
    }
}

code_enum! {
    /// State of a single network device (`NMDeviceState`).
    DeviceState {
        Unknown = 0 => "Unknown",
        /// Recognised but not managed by NetworkManager
        Unmanaged = 10 => "Unmanaged",
        /// Managed but not usable, e.g. no carrier or radio switched off
        Unavailable = 20 => "Unavailable",
        Disconnected = 30 => "Disconnected",
        Prepare = 40 => "Prepare",
        Config = 50 => "Config",
        /// Waiting for secrets such as a Wi-Fi passphrase
        NeedAuth = 60 => "Need Auth",
        IpConfig = 70 => "IP Config",
        IpCheck = 80 => "IP Check",
        /// Waiting for a secondary connection such as a VPN
        Secondaries = 90 => "Secondaries",
        Activated = 100 => "Activated",
        Deactivating = 110 => "Deactivating",
        Failed = 120 => "Failed",
    }
}

impl NmState {
    /// Any of the connected states.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            NmState::ConnectedLocal | NmState::ConnectedSite | NmState::ConnectedGlobal
        )
    }
}

impl DeviceState {
    pub fn is_activated(&self) -> bool {
        matches!(self, DeviceState::Activated)
    }
}
