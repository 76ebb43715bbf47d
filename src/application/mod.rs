// Application layer: composes the balance store and the ledger into atomic units of work.
// Transports (HTTP, gRPC, the CLI) call the coordinator and map `ErrorKind` to their own responses.

mod coordinator;
pub mod error;

pub use coordinator::*;
pub use error::*;
