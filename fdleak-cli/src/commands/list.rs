// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fdleak list` command - List functions from configuration.

use fdleak_core::ConfigLoader;

pub async fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;

    println!("╔══════════════════════╦══════════╦═══════════════════════════════════════════╗");
    println!("║ ID                   ║ Policy   ║ Targets                                   ║");
    println!("╠══════════════════════╬══════════╬═══════════════════════════════════════════╣");

    for func in &config.functions {
        for (i, target) in func.targets.iter().enumerate() {
            let (id, policy) = if i == 0 {
                (func.id.as_str(), func.policy.name())
            } else {
                ("", "")
            };
            println!("║ {:<20} ║ {:<8} ║ {:<41} ║", id, policy, target.as_str());
        }
    }

    println!("╚══════════════════════╩══════════╩═══════════════════════════════════════════╝");
    println!();
    println!("Total: {} function(s)", config.functions.len());

    Ok(())
}
