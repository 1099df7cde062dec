//! Integration tests for the mixing facade over in-memory backends.
//!
//! Local side: `MemoryKernelManager` behind `BlockingBackend`.
//! Remote side: `MemoryGateway`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use kernelmix_core::{
    BackendKind, BlockingBackend, ExecutionState, KernelBackend, KernelError, KernelId,
    KernelSpec, KernelState, MappingKernelManager, MemoryGateway, MemoryKernelManager, MixConfig,
    StartOptions,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Mix {
    manager: MappingKernelManager,
    local: Arc<MemoryKernelManager>,
    gateway: Arc<MemoryGateway>,
}

/// Local offers `python3` and `ir`; the gateway offers `python3` (shadowed)
/// and `remote-python3`.
async fn mix() -> Mix {
    init_tracing();
    let local = Arc::new(MemoryKernelManager::with_specs(vec![
        KernelSpec::new("python3", "Python 3", "python"),
        KernelSpec::new("ir", "R", "R"),
    ]));
    let gateway = Arc::new(MemoryGateway::with_specs(vec![
        KernelSpec::new("python3", "Python 3 (gateway build)", "python"),
        KernelSpec::new("remote-python3", "Python 3 on GPU", "python"),
    ]));
    let local_backend: Arc<dyn KernelBackend> =
        Arc::new(BlockingBackend::from_arc(Arc::clone(&local)));
    let remote_backend: Arc<dyn KernelBackend> = gateway.clone();
    let manager =
        MappingKernelManager::new(local_backend, Some(remote_backend), MixConfig::default());
    manager.list_kernel_types().await.unwrap();
    Mix {
        manager,
        local,
        gateway,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_catalog_shadowing() {
    let mix = mix().await;
    let specs = mix.manager.list_kernel_types().await.unwrap();

    assert_eq!(
        specs.keys().map(String::as_str).collect::<Vec<_>>(),
        ["ir", "python3", "remote-python3"]
    );
    assert_eq!(specs["python3"].display_name, "Python 3 (Local)");
    assert_eq!(specs["remote-python3"].display_name, "Python 3 on GPU (Remote)");
    assert!(!mix.manager.catalog().is_remote("python3"));
    assert!(mix.manager.catalog().is_remote("remote-python3"));

    let spec = mix.manager.get_kernel_type("python3").await.unwrap();
    assert_eq!(spec.display_name, "Python 3 (Local)");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_local_start() {
    let mix = mix().await;
    let k1 = mix
        .manager
        .start_kernel(Some("python3"), StartOptions::default())
        .await
        .unwrap();

    assert_eq!(mix.manager.kernel_backend(&k1), Some(BackendKind::Local));
    assert_eq!(mix.local.kernel_count(), 1);
    assert_eq!(mix.gateway.kernel_count(), 0);

    let model = mix.manager.get_kernel_model(k1).await.unwrap();
    assert_eq!(model.id, k1.to_string());
    assert_eq!(model.name, "python3");
    assert_eq!(model.execution_state, Some(ExecutionState::Idle));
    assert!(model.additional.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remote_start_model() {
    let mix = mix().await;
    let k2 = mix
        .manager
        .start_kernel(Some("remote-python3"), StartOptions::default())
        .await
        .unwrap();

    assert_eq!(mix.manager.kernel_backend(&k2), Some(BackendKind::Remote));
    let model = mix.manager.get_kernel_model(k2).await.unwrap();
    assert_eq!(model.id, k2.to_string());
    assert_eq!(model.name, "remote-python3");
    assert!(model.execution_state.is_none());
    let additional = model.additional.unwrap();
    assert_eq!(additional["name"], "remote-python3");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_interrupt_and_restart() {
    let mix = mix().await;
    let k1 = mix
        .manager
        .start_kernel(Some("python3"), StartOptions::default())
        .await
        .unwrap();

    mix.manager.interrupt_kernel(k1).await.unwrap();
    assert_eq!(mix.manager.kernel_state(&k1), Some(KernelState::Running));
    mix.manager.restart_kernel(k1, false).await.unwrap();
    assert_eq!(mix.manager.kernel_state(&k1), Some(KernelState::Running));

    let model = mix.manager.get_kernel_model(k1).await.unwrap();
    assert_eq!(model.id, k1.to_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_external_ids_unique() {
    let mix = mix().await;
    let mut ids = HashSet::new();
    for name in ["python3", "ir", "remote-python3", "python3", "remote-python3"] {
        let id = mix
            .manager
            .start_kernel(Some(name), StartOptions::default())
            .await
            .unwrap();
        assert!(ids.insert(id));
        assert_eq!(mix.manager.get_kernel_model(id).await.unwrap().name, name);
    }
    assert_eq!(mix.manager.kernel_ids().len(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_default_kernel_type() {
    let mix = mix().await;
    if std::env::var(kernelmix_core::constants::DEFAULT_KERNEL_NAME_ENV).is_ok() {
        return;
    }
    let id = mix
        .manager
        .start_kernel(None, StartOptions::default())
        .await
        .unwrap();
    // First local name in order.
    assert_eq!(mix.manager.get_kernel_model(id).await.unwrap().name, "ir");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_caller_supplied_id() {
    let mix = mix().await;
    let wanted = KernelId::new();
    let options = StartOptions::default().with_kernel_id(wanted);

    let id = mix
        .manager
        .start_kernel(Some("python3"), options.clone())
        .await
        .unwrap();
    assert_eq!(id, wanted);
    // Forwarded to the backend as a hint.
    assert_eq!(mix.local.kernel_ids(), vec![wanted.to_string()]);

    let err = mix
        .manager
        .start_kernel(Some("ir"), options.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, KernelError::AlreadyExists(dup) if dup == wanted));

    // Retired ids are never reissued either.
    mix.manager.shutdown_kernel(id, false).await.unwrap();
    let err = mix
        .manager
        .start_kernel(Some("python3"), options)
        .await
        .unwrap_err();
    assert!(matches!(err, KernelError::AlreadyExists(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_double_shutdown() {
    let mix = mix().await;
    let k1 = mix
        .manager
        .start_kernel(Some("python3"), StartOptions::default())
        .await
        .unwrap();

    mix.manager.shutdown_kernel(k1, false).await.unwrap();
    assert!(!mix.manager.has_kernel(&k1));
    assert!(!mix.manager.id_map().contains(&k1));
    assert_eq!(mix.local.kernel_count(), 0);

    mix.manager.shutdown_kernel(k1, false).await.unwrap();
    assert!(!mix.manager.id_map().contains(&k1));
    assert!(matches!(
        mix.manager.get_kernel_model(k1).await,
        Err(KernelError::KernelNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_double_shutdown() {
    let mix = mix().await;
    let k2 = mix
        .manager
        .start_kernel(Some("remote-python3"), StartOptions::default())
        .await
        .unwrap();
    mix.gateway.set_delay(Duration::from_millis(30));

    let (a, b) = tokio::join!(
        mix.manager.shutdown_kernel(k2, false),
        mix.manager.shutdown_kernel(k2, false)
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(mix.gateway.kernel_count(), 0);
    assert!(mix.manager.id_map().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_kernel_operations() {
    let mix = mix().await;
    let ghost = KernelId::new();
    assert!(matches!(
        mix.manager.shutdown_kernel(ghost, false).await,
        Err(KernelError::KernelNotFound(id)) if id == ghost
    ));
    assert!(mix.manager.interrupt_kernel(ghost).await.unwrap_err().is_not_found());
    assert!(mix.manager.restart_kernel(ghost, true).await.unwrap_err().is_not_found());

    let err = mix
        .manager
        .start_kernel(Some("julia"), StartOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, KernelError::SpecNotFound(_)));
    assert!(mix.manager.kernel_ids().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remote_outage_keeps_local_working() {
    let mix = mix().await;
    let k2 = mix
        .manager
        .start_kernel(Some("remote-python3"), StartOptions::default())
        .await
        .unwrap();
    mix.gateway.set_available(false);

    let specs = mix.manager.list_kernel_types().await.unwrap();
    assert!(specs.contains_key("python3"));
    assert!(specs.contains_key("ir"));
    assert!(!specs.contains_key("remote-python3"));

    let k1 = mix
        .manager
        .start_kernel(Some("python3"), StartOptions::default())
        .await
        .unwrap();
    let listed = mix.manager.list_kernels().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, k1.to_string());

    mix.manager.shutdown_kernel(k1, false).await.unwrap();

    // The remote kernel is still ours once the gateway comes back.
    mix.gateway.set_available(true);
    let listed = mix.manager.list_kernels().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, k2.to_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_kernels_rewrites_ids() {
    let mix = mix().await;
    let k1 = mix
        .manager
        .start_kernel(Some("python3"), StartOptions::default())
        .await
        .unwrap();
    let k2 = mix
        .manager
        .start_kernel(Some("remote-python3"), StartOptions::default())
        .await
        .unwrap();

    let listed = mix.manager.list_kernels().await.unwrap();
    // Remote first.
    assert_eq!(listed[0].id, k2.to_string());
    assert!(listed[0].execution_state.is_none());
    assert_eq!(listed[1].id, k1.to_string());
    assert!(listed[1].additional.is_none());

    // A remote kernel the gateway no longer reports is left out.
    let delegate = mix.manager.id_map().get(&k2).unwrap().delegate_id;
    mix.gateway.kill(&delegate);
    let listed = mix.manager.list_kernels().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, k1.to_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_start_not_registered() {
    let mix = mix().await;
    mix.gateway.set_failing(true);
    let err = mix
        .manager
        .start_kernel(Some("remote-python3"), StartOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("start failed for kernel"));
    assert!(mix.manager.kernel_ids().is_empty());
    assert!(mix.manager.id_map().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_abandoned_failed_start_is_unregistered() {
    let mix = mix().await;
    mix.gateway.set_delay(Duration::from_millis(100));
    mix.gateway.set_failing(true);
    let wanted = KernelId::new();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        mix.manager.start_kernel(
            Some("remote-python3"),
            StartOptions::default().with_kernel_id(wanted),
        ),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!mix.manager.has_kernel(&wanted));
    assert!(mix.manager.kernel_ids().is_empty());

    // The id was never issued, so it is free again.
    mix.gateway.set_delay(Duration::ZERO);
    mix.gateway.set_failing(false);
    let id = mix
        .manager
        .start_kernel(
            Some("remote-python3"),
            StartOptions::default().with_kernel_id(wanted),
        )
        .await
        .unwrap();
    assert_eq!(id, wanted);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_abandoned_shutdown_still_retires() {
    let mix = mix().await;
    let id = mix
        .manager
        .start_kernel(Some("remote-python3"), StartOptions::default())
        .await
        .unwrap();
    mix.gateway.set_delay(Duration::from_millis(100));

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), mix.manager.shutdown_kernel(id, false))
            .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!mix.manager.has_kernel(&id));
    assert_eq!(mix.gateway.kernel_count(), 0);
    mix.manager.shutdown_kernel(id, false).await.unwrap();
    assert!(matches!(
        mix.manager
            .start_kernel(Some("python3"), StartOptions::default().with_kernel_id(id))
            .await,
        Err(KernelError::AlreadyExists(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_starts_do_not_interfere() {
    let mix = Arc::new(mix().await);
    mix.local.set_delay(Duration::from_millis(20));
    mix.gateway.set_delay(Duration::from_millis(20));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let mix = Arc::clone(&mix);
        let name = if i % 2 == 0 { "python3" } else { "remote-python3" };
        tasks.push(tokio::spawn(async move {
            let id = mix
                .manager
                .start_kernel(Some(name), StartOptions::default())
                .await
                .unwrap();
            (id, name)
        }));
    }

    for task in tasks {
        let (id, name) = task.await.unwrap();
        let model = mix.manager.get_kernel_model(id).await.unwrap();
        assert_eq!(model.name, name);
        assert_eq!(model.id, id.to_string());
    }
    assert_eq!(mix.local.kernel_count(), 4);
    assert_eq!(mix.gateway.kernel_count(), 4);
    assert_eq!(mix.manager.id_map().len(), 8);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_same_id_operations_serialized() {
    let mix = Arc::new(mix().await);
    let k1 = mix
        .manager
        .start_kernel(Some("python3"), StartOptions::default())
        .await
        .unwrap();
    mix.local.set_delay(Duration::from_millis(15));

    let mut tasks = Vec::new();
    for i in 0..6 {
        let mix = Arc::clone(&mix);
        tasks.push(tokio::spawn(async move {
            match i % 3 {
                0 => mix.manager.interrupt_kernel(k1).await,
                1 => mix.manager.restart_kernel(k1, false).await,
                _ => mix.manager.get_kernel_model(k1).await.map(|_| ()),
            }
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(mix.local.overlaps(), 0);
    assert_eq!(mix.manager.kernel_state(&k1), Some(KernelState::Running));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_refreshes_unmerged_catalog() {
    init_tracing();
    let gateway = Arc::new(MemoryGateway::with_specs(vec![KernelSpec::new(
        "remote-python3",
        "Python 3",
        "python",
    )]));
    let local: Arc<dyn KernelBackend> =
        Arc::new(BlockingBackend::new(MemoryKernelManager::new()));
    let remote: Arc<dyn KernelBackend> = gateway.clone();
    let manager = MappingKernelManager::new(local, Some(remote), MixConfig::default());

    // No catalog listing yet.
    let id = manager
        .start_kernel(Some("remote-python3"), StartOptions::default())
        .await
        .unwrap();
    assert_eq!(manager.kernel_backend(&id), Some(BackendKind::Remote));
    assert_eq!(gateway.kernel_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_all() {
    let mix = mix().await;
    for name in ["python3", "remote-python3", "ir"] {
        mix.manager
            .start_kernel(Some(name), StartOptions::default())
            .await
            .unwrap();
    }
    mix.manager.shutdown_all(true).await;
    assert!(mix.manager.kernel_ids().is_empty());
    assert!(mix.manager.id_map().is_empty());
    assert_eq!(mix.local.kernel_count(), 0);
    assert_eq!(mix.gateway.kernel_count(), 0);
}
