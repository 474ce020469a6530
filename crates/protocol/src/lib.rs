//! Wire-shaped types shared by the coordinator, builder agent, database
//! component and web endpoint: job descriptors, build classes, build
//! statuses and RPC parameter/return DTOs. Pure data — no transport, no I/O.

pub mod job;
pub mod rpc;
pub mod status;

pub use job::{
    BuildClass, InvalidPkgBase, JobKey, PkgBase, SavableJob, SavedQueue, CLASS_HEAVY,
    CLASS_MEDIUM, CLASS_SMALL,
};
pub use status::{BuildStatus, BuildStatusReturn};
