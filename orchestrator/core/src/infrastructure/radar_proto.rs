// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0

// This file includes the generated protobuf code from tonic/prost

tonic::include_proto!("radar");
