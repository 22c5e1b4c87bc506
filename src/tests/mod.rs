//! Host-runnable scenario tests driving the scheduler core's public surface
//! directly, as opposed to the per-module unit tests living alongside their
//! implementations. Needs the `std-shim` feature, since `NoOpArch` is only
//! wired in as `DefaultArch` on non-`aarch64` hosts under that feature —
//! run with `cargo test --features std-shim`.

mod scenarios;
