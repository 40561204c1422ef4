// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the selection, execution and analysis pipeline.

mod fixtures;
mod pipeline;
