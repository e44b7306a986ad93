//! # winops – WMI transport
//!
//! Remote WMI access over WinRM (WS-Management SOAP/HTTP):
//!
//! - **Method invocation** – typed, ordered method arguments
//! - **WQL enumeration** – Enumerate/Pull paging into property maps
//! - **Cancellation** – every request observes an optional token

pub mod transport;
pub mod types;
pub mod wql;
pub mod xml;

pub use transport::WmiTransport;
pub use types::*;
