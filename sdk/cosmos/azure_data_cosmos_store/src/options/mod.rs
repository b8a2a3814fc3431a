// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

mod client_options;
mod request_options;

pub use client_options::*;
pub use request_options::*;
