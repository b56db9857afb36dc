// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fdleak snapshot` command - Report this process's descriptors and sockets.

use fdleak_core::ResourceAccountant;

pub async fn execute(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let report = ResourceAccountant::procfs().snapshot()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }

    Ok(())
}
