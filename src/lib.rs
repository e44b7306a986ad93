//! # winops
//!
//! Windows performance diagnostics and computer management over WMI.
//!
//! | crate | re-exported as |
//! |---|---|
//! | `winops-core` | [`shared`] – error records, Win32 text, configuration |
//! | `winops-wmi` | [`wmi`] – WS-Management transport |
//! | `winops-diagnostics` | [`diagnostics`] – counter samples, sampling, logs |
//! | `winops-management` | [`management`] – names, shutdown, rename, privileges |

pub mod logging;

pub use winops_core as shared;
pub use winops_diagnostics as diagnostics;
pub use winops_management as management;
pub use winops_wmi as wmi;
