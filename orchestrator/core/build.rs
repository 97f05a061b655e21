// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Build Script for mirror-core
//!
//! Compiles the Radar control-channel protocol (`proto/radar.proto`) into Rust
//! gRPC stubs with `tonic-prost-build`. The generated module is placed in
//! `OUT_DIR` and included via `tonic::include_proto!` in
//! `src/infrastructure/radar_proto.rs`.
//!
//! Both the client and the server halves are generated: the client is used by
//! the orchestrator, the server is used by integration tests to stand up an
//! in-process Radar.
//!
//! # Dependencies
//!
//! - **protoc**: Protocol buffer compiler (vendored via `protoc-bin-vendored`)
//! - **tonic-prost-build**: Code generator for Rust gRPC stubs

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Point PROTOC at the vendored binary so builds don't need a system protoc
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/radar.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/radar.proto");

    Ok(())
}
