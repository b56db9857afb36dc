// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `fdleak invoke` command - Invoke a function repeatedly on this process.
//!
//! Every invocation runs on the same process, the way a hosting platform
//! reuses a warm instance, so descriptor growth accumulates across them.

use std::sync::Arc;
use std::time::Duration;

use fdleak_core::{
    ConfigLoader, FunctionId, FunctionRegistry, InvocationMeta, OpenFilesLimit,
    ProcfsIntrospector, ReqwestClientFactory,
};

use crate::metrics::{self, InvocationMetrics};

pub async fn execute(
    config_path: &str,
    function: &str,
    count: u64,
    interval_ms: u64,
    with_metrics: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;

    if let Some(limit) = config.runtime.open_files_limit {
        let previous = OpenFilesLimit::apply(limit)?;
        tracing::info!(
            previous = previous.soft,
            limit,
            "Lowered open files limit"
        );
    }

    let registry = FunctionRegistry::from_config(
        &config,
        Arc::new(ProcfsIntrospector::new()),
        Arc::new(ReqwestClientFactory::new(config.runtime.request_timeout)),
    )?;

    let id = FunctionId::new(function)?;
    let handler = registry.handler(&id)?;
    let recorder = if with_metrics {
        Some(InvocationMetrics::register(metrics::registry())?)
    } else {
        None
    };

    tracing::info!(
        function_id = %id,
        invocation_id = %handler.context().id(),
        policy = %handler.policy().kind(),
        count,
        "Invoking function"
    );

    let mut invoked = 0u64;
    let failed = loop {
        invoked += 1;

        match handler.handle("", &InvocationMeta::generate()).await {
            Ok(response) => {
                print!("{}", response);
                if let Some(recorder) = &recorder {
                    recorder.observe_success(&id, &response);
                }
            }
            Err(e) => {
                eprintln!("{}", e);
                if let Some(recorder) = &recorder {
                    recorder.observe_failure(&id);
                }
                break true;
            }
        }

        if count != 0 && invoked >= count {
            break false;
        }

        if interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    };

    if recorder.is_some() {
        print!("{}", metrics::encode(metrics::registry()));
    }

    if failed {
        std::process::exit(1);
    }

    Ok(())
}
