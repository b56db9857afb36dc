// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Handler behavior on top of configuration and the registry.

mod common;

use std::sync::Arc;

use common::{FileClientFactory, UnavailableIntrospector};
use fdleak_core::{
    ConfigLoader, FdLeakError, FunctionId, FunctionRegistry, InvocationMeta, InvocationState,
    PolicyKind, ProcfsIntrospector,
};

const CONFIG: &str = r#"
runtime:
  request_timeout_ms: 5000

functions:
  - id: broken-handler
    policy: leaking
    targets:
      - https://www.google.com.au/
      - https://www.google.com/
  - id: good-handler
    policy: scoped
    targets:
      - https://www.google.com.au/
"#;

#[tokio::test]
async fn registry_serves_every_configured_function() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigLoader::load_string(CONFIG).unwrap();
    let registry = FunctionRegistry::from_config(
        &config,
        Arc::new(ProcfsIntrospector::new()),
        Arc::new(FileClientFactory::new(dir.path())),
    )
    .unwrap();

    assert_eq!(registry.len(), 2);

    for id in registry.function_ids() {
        let handler = registry.handler(&id).unwrap();
        let response = handler
            .handle("{}", &InvocationMeta::new("req-1"))
            .await
            .unwrap();
        assert!(response
            .message()
            .starts_with(&format!("{}: [{}]\tInvocation: [1]", id, handler.context().id())));
    }

    let broken = registry
        .handler(&FunctionId::new("broken-handler").unwrap())
        .unwrap();
    assert_eq!(broken.policy().kind(), PolicyKind::Leaking);
}

#[tokio::test]
async fn snapshot_without_sockets_reports_zero_connections() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigLoader::load_string(CONFIG).unwrap();
    let registry = FunctionRegistry::from_config(
        &config,
        Arc::new(ProcfsIntrospector::new()),
        Arc::new(FileClientFactory::new(dir.path())),
    )
    .unwrap();

    let handler = registry
        .handler(&FunctionId::new("good-handler").unwrap())
        .unwrap();
    let response = handler
        .handle("", &InvocationMeta::generate())
        .await
        .unwrap();

    let report = response.report();
    assert!(report.connections().is_empty());
    assert!(response
        .message()
        .contains("\tInbound: [0]\tOutbound: [0]\tEstablished: [0]"));
    assert!(response.message().contains("\tConnected sockets:\n\tOpen file count: "));
    assert!(report.descriptors().total() > 0);
}

#[tokio::test]
async fn unavailable_statistics_fail_the_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigLoader::load_string(CONFIG).unwrap();
    let registry = FunctionRegistry::from_config(
        &config,
        Arc::new(UnavailableIntrospector),
        Arc::new(FileClientFactory::new(dir.path())),
    )
    .unwrap();

    let handler = registry
        .handler(&FunctionId::new("good-handler").unwrap())
        .unwrap();
    let err = handler
        .handle("", &InvocationMeta::generate())
        .await
        .unwrap_err();

    assert!(err.cause().is_stats_unavailable());
    assert!(err.message().contains("invocation: [1] cause: [Resource statistics unavailable"));
    assert_eq!(handler.state().await, InvocationState::Idle);
}

#[tokio::test]
async fn transport_failure_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    // Connections open files under a directory that does not exist.
    let missing = dir.path().join("missing");
    let config = ConfigLoader::load_string(CONFIG).unwrap();
    let registry = FunctionRegistry::from_config(
        &config,
        Arc::new(ProcfsIntrospector::new()),
        Arc::new(FileClientFactory::new(&missing)),
    )
    .unwrap();

    let handler = registry
        .handler(&FunctionId::new("broken-handler").unwrap())
        .unwrap();

    for n in 1..=2 {
        let err = handler
            .handle("", &InvocationMeta::generate())
            .await
            .unwrap_err();
        assert!(matches!(err.cause(), FdLeakError::Transport(_)));
        assert!(err.message().starts_with(&format!(
            "Failed to execute broken-handler: [{}] invocation: [{}] cause: [Transport failure",
            handler.context().id(),
            n
        )));
        assert!(std::error::Error::source(&err).is_some());
    }
    assert_eq!(handler.context().count(), 2);
}
