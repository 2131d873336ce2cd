//! E2E тесты жизненного цикла контейнера: декларации -> bootstrap ->
//! валидация -> разрешение -> proxy -> child scope'ы.

use std::sync::Arc;

use common::structured_logging::{init_structured_logging, LoggingConfig};
use container::{
    CallValue, ComponentKey, ComponentProvider, ContainerConfig, ContainerError,
    InstantiationStrategy, InterceptorChain, MethodTable, ProviderSelection, ProxyBlueprint,
    ProxyInstance, ReturnKind,
};
use parking_lot::Mutex;

struct AppConfig {
    conn: String,
}

struct Database {
    conn: String,
}

struct UserService {
    db: Arc<Database>,
}

struct Greeter {
    greeting: String,
}

fn init_logging() {
    // повторная инициализация в других тестах того же процесса не фатальна
    let _ = init_structured_logging(LoggingConfig::default());
}

fn bind_service_stack(provider: &ComponentProvider) {
    let config_key = ComponentKey::of::<AppConfig>();
    let db_key = ComponentKey::of::<Database>();
    let svc_key = ComponentKey::of::<UserService>();

    provider
        .bind(
            &config_key,
            0,
            InstantiationStrategy::singleton(AppConfig {
                conn: "sqlite://app".to_string(),
            }),
        )
        .expect("bind config");

    let config_for_db = config_key.clone();
    provider
        .bind(
            &db_key,
            0,
            InstantiationStrategy::lazy(move |inner| {
                let config: Arc<AppConfig> = inner.get(&config_for_db)?;
                Ok(Database {
                    conn: config.conn.clone(),
                })
            }),
        )
        .expect("bind database");

    let db_for_svc = db_key.clone();
    provider
        .bind(
            &svc_key,
            0,
            InstantiationStrategy::lazy(move |inner| {
                let db: Arc<Database> = inner.get(&db_for_svc)?;
                Ok(UserService { db })
            }),
        )
        .expect("bind user service");

    provider.declare_dependencies(&svc_key, vec![db_key.clone()]);
    provider.declare_dependencies(&db_key, vec![config_key.clone()]);
    provider.mark_root(&svc_key);
}

#[test]
fn test_full_lifecycle_bootstrap_and_resolution() {
    init_logging();
    let provider = ComponentProvider::new(ContainerConfig::default().with_name("app"));
    bind_service_stack(&provider);

    provider.bootstrap().expect("bootstrap");

    let svc: Arc<UserService> = provider
        .get(&ComponentKey::of::<UserService>())
        .expect("user service");
    assert_eq!(svc.db.conn, "sqlite://app");

    // все три узла разрешены и закэшированы
    assert_eq!(provider.cache_stats().cached, 3);

    let report = provider.dependency_report().expect("graph built");
    assert!(report.contains("Total nodes: 3"));
    assert!(report.contains("Total edges: 2"));

    let stats = provider.stats();
    assert!(stats.resolutions >= 3);
    assert_eq!(stats.registrations, 3);
}

#[test]
fn test_bootstrap_fails_on_static_cycle() {
    init_logging();
    let provider = ComponentProvider::default();

    struct A;
    struct B;
    struct C;
    let a = ComponentKey::of::<A>();
    let b = ComponentKey::of::<B>();
    let c = ComponentKey::of::<C>();

    provider.declare_dependencies(&a, vec![b.clone()]);
    provider.declare_dependencies(&b, vec![c.clone()]);
    provider.declare_dependencies(&c, vec![a.clone()]);

    let err = provider.bootstrap().unwrap_err();
    match err {
        ContainerError::CyclicDependency { chain } => {
            assert!(chain.len() >= 3);
            assert_eq!(chain.first(), chain.last());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(provider.stats().validation_failures, 1);
}

#[test]
fn test_bootstrap_fails_on_never_resolved_node() {
    init_logging();
    let provider = ComponentProvider::default();

    struct Dangling;
    let dangling = ComponentKey::of::<Dangling>();

    // узел объявлен, но не имеет биндинга и недостижим из какого-либо
    // разрешения — after-configuration проход называет его по имени
    provider.declare_dependencies(&dangling, Vec::new());

    let err = provider.bootstrap().unwrap_err();
    match err {
        ContainerError::MissingDependencies { keys } => {
            assert_eq!(keys.len(), 1);
            assert!(keys[0].contains("Dangling"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_proxy_backed_component_with_audit_interceptor() {
    init_logging();
    let provider = ComponentProvider::default();
    let key = ComponentKey::named::<Greeter>("audited");

    let audit: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let table = MethodTable::builder::<Greeter>()
        .method("greet", ReturnKind::Str, |greeter, args| {
            let name = args
                .first()
                .and_then(CallValue::as_str)
                .unwrap_or("stranger");
            Ok(CallValue::Str(format!("{} {}", greeter.greeting, name)))
        })
        .build();

    let audit_log = audit.clone();
    let chain = InterceptorChain::new().before(move |call| {
        audit_log.lock().push(format!("call:{}", call.method));
        Ok(())
    });

    let blueprint = ProxyBlueprint::new(table).intercept("greet", chain);
    provider
        .bind(
            &key,
            0,
            InstantiationStrategy::proxy(
                blueprint,
                Some(Arc::new(Greeter {
                    greeting: "hello".to_string(),
                })),
            ),
        )
        .expect("bind proxy");

    let proxy: Arc<ProxyInstance> = provider.get(&key).expect("proxy component");
    let result = proxy
        .invoke("greet", &[CallValue::Str("world".to_string())])
        .expect("greet");
    assert_eq!(result, CallValue::Str("hello world".to_string()));
    assert_eq!(audit.lock().clone(), vec!["call:greet".to_string()]);

    // диагностика: proxy опознаётся и разворачивается до целевого типа
    let erased = provider
        .resolve_erased(&key, ProviderSelection::HighestPriority)
        .expect("erased");
    assert!(provider.is_proxy(&erased));
    let descriptor = provider.unwrap_proxy(&erased).expect("descriptor");
    assert!(descriptor.type_name.contains("Greeter"));

    // посторонний экземпляр — не proxy
    let plain: container::AnyInstance = Arc::new(Greeter {
        greeting: "hi".to_string(),
    });
    assert!(!provider.is_proxy(&plain));
}

#[test]
fn test_proxy_registry_is_scope_owned() {
    init_logging();
    let provider = ComponentProvider::default();
    let child = provider.child("test");

    let key = ComponentKey::of::<Greeter>();
    let table = MethodTable::builder::<Greeter>()
        .abstract_method("greet", ReturnKind::Str)
        .build();
    child
        .bind(
            &key,
            0,
            InstantiationStrategy::proxy(ProxyBlueprint::new(table), None),
        )
        .expect("bind proxy in child");

    let erased = child
        .resolve_erased(&key, ProviderSelection::HighestPriority)
        .expect("child proxy");

    // реестр принадлежит scope'у: родитель о child-proxy не знает
    assert!(child.is_proxy(&erased));
    assert!(!provider.is_proxy(&erased));
}

#[test]
fn test_selection_policy_override_per_call_site() {
    init_logging();
    let provider = ComponentProvider::default();
    let key = ComponentKey::of::<Database>();

    provider
        .bind(
            &key,
            0,
            InstantiationStrategy::factory(|_| {
                Ok(Database {
                    conn: "postgres://prod".to_string(),
                })
            }),
        )
        .expect("bind prod");
    provider
        .bind(
            &key,
            100,
            InstantiationStrategy::factory(|_| {
                Ok(Database {
                    conn: "sqlite://:memory:".to_string(),
                })
            }),
        )
        .expect("bind test double");

    let default: Arc<Database> = provider.get(&key).expect("default selection");
    assert_eq!(default.conn, "sqlite://:memory:");

    // точечный выбор форсирует конкретный биндинг
    let forced: Arc<Database> = provider
        .get_with_policy(&key, ProviderSelection::ExactPriority(0))
        .expect("exact selection");
    assert_eq!(forced.conn, "postgres://prod");

    let none = provider.get_with_policy::<Database>(&key, ProviderSelection::ExactPriority(7));
    assert!(matches!(none, Err(ContainerError::UnboundKey { .. })));
}

#[test]
fn test_named_keys_bind_independently() {
    init_logging();
    let provider = ComponentProvider::default();
    let primary = ComponentKey::named::<Database>("primary");
    let replica = ComponentKey::named::<Database>("replica");

    provider
        .bind(
            &primary,
            0,
            InstantiationStrategy::lazy(|_| {
                Ok(Database {
                    conn: "primary".to_string(),
                })
            }),
        )
        .expect("bind primary");
    provider
        .bind(
            &replica,
            0,
            InstantiationStrategy::lazy(|_| {
                Ok(Database {
                    conn: "replica".to_string(),
                })
            }),
        )
        .expect("bind replica");

    let p: Arc<Database> = provider.get(&primary).expect("primary");
    let r: Arc<Database> = provider.get(&replica).expect("replica");
    assert_eq!(p.conn, "primary");
    assert_eq!(r.conn, "replica");
    assert!(!provider.is_bound(&ComponentKey::named::<Database>("missing")));
}
