//! Configuration section definitions.
//!
//! Each module corresponds to a section in `windsync.toml`:
//!
//! | Module         | TOML Section     | Purpose                                |
//! |----------------|------------------|----------------------------------------|
//! | `compiler`     | `[compiler]`     | Entrypoint, cache, minify, coalescing  |
//! | `storage`      | `[storage]`      | Volume and content source directories  |
//! | `integrations` | `[integrations]` | Enabled builders                       |
//! | `sync`         | `[sync]`         | Variable stylesheet refresh            |
//! | `bridge`       | `[bridge]`       | Websocket bridge for remote editors    |

mod bridge;
mod compiler;
mod integrations;
mod storage;
mod sync;

pub use bridge::BridgeConfig;
pub use compiler::CompilerConfig;
pub use integrations::IntegrationsConfig;
pub use storage::StorageConfig;
pub use sync::SyncConfig;
