//! End-to-end suite exercising the public `TermStore` API: branch
//! lifecycle, MVCC reads, the staging commit protocol, merge/rebase and
//! model-based property checks.

mod util;

mod branching;
mod merge;
mod mvcc;
