// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fdleak validate` command - Validate configuration file.

use fdleak_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Runtime Settings:");
            match config.runtime.open_files_limit {
                Some(limit) => println!("  Open Files Limit:   {}", limit),
                None => println!("  Open Files Limit:   (inherited)"),
            }
            println!(
                "  Request Timeout:    {}ms",
                config.runtime.request_timeout.as_millis()
            );
            println!();
            println!("Functions ({}):", config.functions.len());
            print!("{}", serde_yaml::to_string(&config.functions)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
