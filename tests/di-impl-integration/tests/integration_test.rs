//! 依赖注入容器的跨 crate 集成测试
//!
//! 覆盖容器的核心性质：单例同一性、原型独立性、构造器循环拒绝、setter 循环
//! 的早期引用、名称与类型查找一致、多实现聚合、通知顺序、分层封装、幂等注册和事件分发。

use di_abstractions::{
    value, AdviceSlot, CallArgs, Component, ComponentCatalog, ComponentDescriptor,
    ContainerConfig, DependencyContext, DependencyContextExt, DependencyRef, Events,
    InvocationError, Invocable, MethodMatcher, MethodSignature, Value,
};
use di_common::DependencyResult;
use di_common::TypeKey;
use di_composition::LayerContext;
use di_impl::DependencyEnvironment;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once, OnceLock};
use std::thread;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn environment() -> Arc<DependencyEnvironment> {
    DependencyEnvironment::builder().build().unwrap()
}

fn same<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

// ========== 作用域 ==========

static PRINTERS: AtomicUsize = AtomicUsize::new(0);

struct Printer {
    serial: usize,
}

impl Component for Printer {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![], |_| {
                Ok(Self {
                    serial: PRINTERS.fetch_add(1, Ordering::SeqCst),
                })
            })
            .build()
    }
}

struct Ticket {
    printer: Arc<Printer>,
}

impl Component for Ticket {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .prototype()
            .constructor(vec![DependencyRef::of::<Printer>()], |args| {
                Ok(Self {
                    printer: args.get::<Printer>(0)?,
                })
            })
            .build()
    }
}

#[test]
fn test_singleton_identity() {
    init_tracing();
    let environment = environment();
    let first = environment.get::<Printer>().unwrap();
    let second = environment.get::<Printer>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let by_type = environment.get_by_type(&TypeKey::of::<Printer>()).unwrap();
    assert!(same(&by_type, &first));
}

#[test]
fn test_prototype_distinctness() {
    init_tracing();
    let environment = environment();
    let first = environment.get::<Ticket>().unwrap();
    let second = environment.get::<Ticket>().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    // 原型依赖的单例仍然共享
    assert!(Arc::ptr_eq(&first.printer, &second.printer));
    assert_eq!(first.printer.serial, second.printer.serial);
}

#[test]
fn test_concurrent_gets_converge_on_one_singleton() {
    init_tracing();
    let environment = environment();
    environment.register::<Printer>().unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let environment = environment.clone();
            thread::spawn(move || environment.get::<Printer>().unwrap())
        })
        .collect();
    let printers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let stored = environment.get::<Printer>().unwrap();
    assert!(printers.iter().all(|printer| Arc::ptr_eq(printer, &stored)));
}

// ========== 循环依赖 ==========

struct Chicken;

impl Component for Chicken {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![DependencyRef::of::<Egg>()], |_| Ok(Self))
            .build()
    }
}

struct Egg;

impl Component for Egg {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![DependencyRef::of::<Chicken>()], |_| Ok(Self))
            .build()
    }
}

struct Engine {
    gearbox: OnceLock<Arc<Gearbox>>,
}

impl Component for Engine {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![], |_| {
                Ok(Self {
                    gearbox: OnceLock::new(),
                })
            })
            .setter("set_gearbox", vec![DependencyRef::of::<Gearbox>()], |engine, args| {
                engine
                    .gearbox
                    .set(args.get::<Gearbox>(0)?)
                    .map_err(|_| anyhow::anyhow!("变速箱已注入"))
            })
            .build()
    }
}

struct Gearbox {
    engine: Arc<Engine>,
}

impl Component for Gearbox {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![DependencyRef::of::<Engine>()], |args| {
                Ok(Self {
                    engine: args.get::<Engine>(0)?,
                })
            })
            .build()
    }
}

#[test]
fn test_constructor_cycle_is_rejected() {
    init_tracing();
    let environment = environment();
    let err = environment.get::<Chicken>().err().unwrap();
    assert!(err.is_circular());
    assert!(err.to_string().contains("Chicken"));

    // 失败后在途记录已回滚，同一线程再次请求仍得到循环错误
    assert!(environment.get::<Egg>().err().unwrap().is_circular());
}

#[test]
fn test_setter_cycle_resolves_through_early_reference() {
    init_tracing();
    let environment = environment();
    let engine = environment.get::<Engine>().unwrap();
    let gearbox = engine.gearbox.get().unwrap();
    assert!(Arc::ptr_eq(&gearbox.engine, &engine));
    assert!(Arc::ptr_eq(gearbox, &environment.get::<Gearbox>().unwrap()));
}

#[test]
fn test_setter_cycle_without_early_references_is_circular() {
    init_tracing();
    let config = ContainerConfig::from_toml_str("allow_early_references = false").unwrap();
    let environment = DependencyEnvironment::builder()
        .with_config(config)
        .build()
        .unwrap();
    assert!(environment.get::<Engine>().err().unwrap().is_circular());
}

static SOCKET_DOWN: AtomicBool = AtomicBool::new(false);

struct Host {
    peer: OnceLock<Arc<Peer>>,
    socket: OnceLock<Arc<Socket>>,
}

impl Component for Host {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![], |_| {
                Ok(Self {
                    peer: OnceLock::new(),
                    socket: OnceLock::new(),
                })
            })
            .setter("set_peer", vec![DependencyRef::of::<Peer>()], |host, args| {
                host.peer
                    .set(args.get::<Peer>(0)?)
                    .map_err(|_| anyhow::anyhow!("对端已注入"))
            })
            .setter("set_socket", vec![DependencyRef::of::<Socket>()], |host, args| {
                host.socket
                    .set(args.get::<Socket>(0)?)
                    .map_err(|_| anyhow::anyhow!("套接字已注入"))
            })
            .build()
    }
}

struct Peer {
    host: Arc<Host>,
}

impl Component for Peer {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![DependencyRef::of::<Host>()], |args| {
                Ok(Self {
                    host: args.get::<Host>(0)?,
                })
            })
            .build()
    }
}

struct Socket;

impl Component for Socket {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![], |_| {
                if SOCKET_DOWN.load(Ordering::SeqCst) {
                    Err(anyhow::anyhow!("端口被占用"))
                } else {
                    Ok(Self)
                }
            })
            .build()
    }
}

#[test]
fn test_failed_creation_withdraws_holders_of_early_reference() {
    init_tracing();
    let environment = environment();

    SOCKET_DOWN.store(true, Ordering::SeqCst);
    let err = environment.get::<Host>().err().unwrap();
    assert!(err.is_instantiation_error());
    // Peer 拿到过未完成的 Host，随 Host 的失败一起撤回
    assert_eq!(environment.stats().live_instances, 0);
    assert!(environment.get::<Peer>().is_err());
    assert_eq!(environment.stats().live_instances, 0);

    SOCKET_DOWN.store(false, Ordering::SeqCst);
    let host = environment.get::<Host>().unwrap();
    let peer = environment.get::<Peer>().unwrap();
    assert!(Arc::ptr_eq(&peer.host, &host));
    assert!(Arc::ptr_eq(host.peer.get().unwrap(), &peer));
    assert!(peer.host.socket.get().is_some());
}

// ========== 名称与多实现 ==========

trait Plugin: Send + Sync {
    fn id(&self) -> &'static str;
}

#[derive(Default)]
struct Alpha;

impl Plugin for Alpha {
    fn id(&self) -> &'static str {
        "alpha"
    }
}

impl Component for Alpha {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .named("alpha")
            .implements::<dyn Plugin>(|alpha| alpha)
            .default_constructor()
            .build()
    }
}

#[derive(Default)]
struct Beta;

impl Plugin for Beta {
    fn id(&self) -> &'static str {
        "beta"
    }
}

impl Component for Beta {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .named("beta")
            .implements::<dyn Plugin>(|beta| beta)
            .default_constructor()
            .build()
    }
}

struct PluginHost {
    plugins: Arc<Vec<Arc<dyn Plugin>>>,
}

impl Component for PluginHost {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![DependencyRef::all_of::<dyn Plugin>()], |args| {
                Ok(Self {
                    plugins: args.get::<Vec<Arc<dyn Plugin>>>(0)?,
                })
            })
            .build()
    }
}

trait Relay: Send + Sync {}

struct Repeater;

impl Relay for Repeater {}

impl Component for Repeater {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .implements::<dyn Relay>(|repeater| repeater)
            .constructor(vec![DependencyRef::all_of::<dyn Relay>()], |_| Ok(Self))
            .build()
    }
}

#[derive(Default)]
struct Vault;

impl Component for Vault {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .named("vault")
            .default_constructor()
            .build()
    }
}

#[test]
fn test_named_and_typed_lookups_share_instance() {
    init_tracing();
    let environment = environment();
    let by_type = environment.get::<Vault>().unwrap();
    let by_name = environment.get_named::<Vault>("vault").unwrap().unwrap();
    assert!(Arc::ptr_eq(&by_type, &by_name));

    // 规范名称同样可以查找
    let canonical = environment
        .get_by_name(TypeKey::of::<Vault>().name)
        .unwrap()
        .unwrap();
    assert!(same(&canonical, &by_type));
    assert!(environment.get_by_name("missing").unwrap().is_none());
}

#[test]
fn test_multi_implementations_match_named_lookups() {
    init_tracing();
    let environment = DependencyEnvironment::builder()
        .with_component::<Alpha>()
        .with_component::<Beta>()
        .build()
        .unwrap();

    let plugins = environment.get_all::<dyn Plugin>().unwrap();
    assert_eq!(plugins.len(), 2);

    let alpha = environment.get_named::<Alpha>("alpha").unwrap().unwrap();
    let beta = environment.get_named::<Beta>("beta").unwrap().unwrap();
    assert!(plugins.iter().any(|plugin| same(plugin, &alpha)));
    assert!(plugins.iter().any(|plugin| same(plugin, &beta)));

    let raw = environment
        .get_by_supertype(&TypeKey::of_abstract::<dyn Plugin>())
        .unwrap();
    assert_eq!(raw.len(), 2);
}

#[test]
fn test_collection_injection() {
    init_tracing();
    let environment = DependencyEnvironment::builder()
        .with_component::<Alpha>()
        .with_component::<Beta>()
        .build()
        .unwrap();

    let host = environment.get::<PluginHost>().unwrap();
    let mut ids: Vec<_> = host.plugins.iter().map(|plugin| plugin.id()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["alpha", "beta"]);

    let empty = environment.get_all::<dyn Relay>().unwrap();
    assert!(empty.is_empty());
}

#[test]
fn test_batch_reentry_is_circular() {
    init_tracing();
    let environment = DependencyEnvironment::builder()
        .with_component::<Repeater>()
        .build()
        .unwrap();
    let err = environment.get_all::<dyn Relay>().err().unwrap();
    assert!(err.is_circular());
}

trait Codec: Send + Sync {}

static GZIP_BUILT: AtomicUsize = AtomicUsize::new(0);

struct Gzip;

impl Codec for Gzip {}

impl Component for Gzip {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .implements::<dyn Codec>(|gzip| gzip)
            .constructor(vec![], |_| {
                GZIP_BUILT.fetch_add(1, Ordering::SeqCst);
                Ok(Self)
            })
            .build()
    }
}

struct Brotli;

impl Codec for Brotli {}

impl Component for Brotli {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .implements::<dyn Codec>(|brotli| brotli)
            .constructor(vec![], |_| Err(anyhow::anyhow!("字典缺失")))
            .build()
    }
}

struct Archiver;

impl Component for Archiver {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![DependencyRef::all_of::<dyn Codec>()], |_| Ok(Self))
            .build()
    }
}

#[test]
fn test_failing_member_aborts_whole_batch() {
    init_tracing();
    let environment = DependencyEnvironment::builder()
        .with_component::<Gzip>()
        .with_component::<Brotli>()
        .build()
        .unwrap();
    let built = GZIP_BUILT.load(Ordering::SeqCst);

    assert!(environment.get_all::<dyn Codec>().err().unwrap().is_instantiation_error());
    assert!(environment
        .get_by_supertype(&TypeKey::of_abstract::<dyn Codec>())
        .err()
        .unwrap()
        .is_instantiation_error());
    assert!(environment.get::<Archiver>().err().unwrap().is_instantiation_error());

    // 失败前已完成的成员保留在作用域中
    assert_eq!(GZIP_BUILT.load(Ordering::SeqCst), built + 1);
    environment.get::<Gzip>().unwrap();
    assert_eq!(GZIP_BUILT.load(Ordering::SeqCst), built + 1);
    assert!(environment.get::<Brotli>().err().unwrap().is_instantiation_error());
}

// ========== 方法拦截 ==========

#[derive(Default)]
struct Journal {
    entries: Mutex<Vec<String>>,
}

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }
}

impl Component for Journal {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .default_constructor()
            .build()
    }
}

static WALLETS_CLOSED: AtomicUsize = AtomicUsize::new(0);

struct Wallet {
    journal: Arc<Journal>,
}

impl Invocable for Wallet {
    fn signatures(&self) -> Vec<MethodSignature> {
        vec![
            MethodSignature::new("pay").returns::<u64>().marked("audited"),
            MethodSignature::new("peek").returns::<u64>(),
        ]
    }

    fn invoke(&self, method: &str, args: &CallArgs) -> Result<Value, InvocationError> {
        self.journal.push(format!("call {method}"));
        match method {
            "pay" => Ok(value(*args.get::<u64>(0)? * 2)),
            "peek" => Ok(value(0u64)),
            _ => Err(InvocationError::MethodNotFound {
                component: "Wallet".into(),
                method: method.into(),
            }),
        }
    }
}

impl Component for Wallet {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![DependencyRef::of::<Journal>()], |args| {
                Ok(Self {
                    journal: args.get::<Journal>(0)?,
                })
            })
            .advised_by::<Auditor>()
            .on_destroy(|_| {
                WALLETS_CLOSED.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
    }
}

struct Auditor {
    journal: Arc<Journal>,
}

impl Component for Auditor {
    fn descriptor() -> ComponentDescriptor {
        let audited = || MethodMatcher::marker("audited");
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![DependencyRef::of::<Journal>()], |args| {
                Ok(Self {
                    journal: args.get::<Journal>(0)?,
                })
            })
            .interceptor(vec![
                AdviceSlot::before::<Self, _>(audited(), 2, |auditor, _| {
                    auditor.journal.push("before 2");
                    Ok(())
                }),
                AdviceSlot::around::<Self, _>(audited(), 0, |auditor, next| {
                    auditor.journal.push("around in");
                    let result = next.proceed();
                    auditor.journal.push("around out");
                    result
                }),
                AdviceSlot::before::<Self, _>(audited(), 1, |auditor, point| {
                    auditor.journal.push(format!("before 1 {}", point.method().name));
                    Ok(())
                }),
            ])
            .build()
    }
}

#[test]
fn test_advice_runs_in_declared_order() {
    init_tracing();
    let environment = environment();
    let wallet = environment.get_proxy::<Wallet>().unwrap();
    let journal = environment.get::<Journal>().unwrap();

    let paid = wallet.invoke("pay", &CallArgs::new().with(21u64)).unwrap();
    assert_eq!(paid.downcast_ref::<u64>(), Some(&42));
    assert_eq!(
        journal.take(),
        vec!["before 1 pay", "before 2", "around in", "call pay", "around out"]
    );

    wallet.invoke("peek", &CallArgs::new()).unwrap();
    assert_eq!(journal.take(), vec!["call peek"]);

    // 被拦截的组件只能通过代理获取
    assert!(environment.get::<Wallet>().err().unwrap().is_resolution_error());
    // 拦截器组件不能当作普通组件获取
    assert!(environment.get::<Auditor>().err().unwrap().is_resolution_error());
}

#[test]
fn test_destroy_hook_runs_on_proxy_target() {
    init_tracing();
    let environment = environment();
    environment.get_proxy::<Wallet>().unwrap();
    let before = WALLETS_CLOSED.load(Ordering::SeqCst);

    environment.close().unwrap();
    assert_eq!(WALLETS_CLOSED.load(Ordering::SeqCst), before + 1);
    assert!(environment.get_proxy::<Wallet>().err().unwrap().is_closed());
}

// ========== 事件 ==========

struct OrderPlaced(u32);

#[derive(Default)]
struct Inventory {
    reserved: Mutex<Vec<u32>>,
}

impl Component for Inventory {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .default_constructor()
            .on_event::<OrderPlaced, _>(|inventory, order| {
                if order.0 == 0 {
                    anyhow::bail!("订单数量为零");
                }
                inventory.reserved.lock().unwrap().push(order.0);
                Ok(())
            })
            .build()
    }
}

#[derive(Default)]
struct Storefront {
    events: OnceLock<Arc<Events>>,
}

impl Storefront {
    fn place(&self, quantity: u32) -> DependencyResult<usize> {
        match self.events.get() {
            Some(events) => events.dispatch(&OrderPlaced(quantity)),
            None => Ok(0),
        }
    }
}

impl Component for Storefront {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .default_constructor()
            .event_emitter(|storefront, events| {
                storefront
                    .events
                    .set(events)
                    .map_err(|_| anyhow::anyhow!("事件总线已注入"))
            })
            .build()
    }
}

#[test]
fn test_events_reach_handlers_of_created_components() {
    init_tracing();
    let environment = environment();
    let inventory = environment.get::<Inventory>().unwrap();
    let storefront = environment.get::<Storefront>().unwrap();
    assert!(Arc::ptr_eq(storefront.events.get().unwrap(), environment.events()));

    assert_eq!(storefront.place(3).unwrap(), 1);
    assert_eq!(environment.dispatch(&OrderPlaced(4)).unwrap(), 1);
    assert_eq!(*inventory.reserved.lock().unwrap(), vec![3, 4]);

    assert!(storefront.place(0).unwrap_err().is_event_error());

    environment.close().unwrap();
    assert_eq!(environment.events().handler_count::<OrderPlaced>(), 0);
    assert!(environment.dispatch(&OrderPlaced(5)).unwrap_err().is_closed());
}

// ========== 分层封装 ==========

struct Cipher;

impl Component for Cipher {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![], |_| Ok(Self))
            .build()
    }
}

struct KeyStore {
    cipher: Arc<Cipher>,
}

impl Component for KeyStore {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor(vec![DependencyRef::of::<Cipher>()], |args| {
                Ok(Self {
                    cipher: args.get::<Cipher>(0)?,
                })
            })
            .build()
    }
}

#[test]
fn test_layer_encapsulation() {
    init_tracing();
    let security = DependencyEnvironment::builder()
        .with_name("security")
        .export_by_type::<KeyStore>()
        .build()
        .unwrap();
    let app = DependencyEnvironment::builder()
        .with_name("app")
        .build()
        .unwrap();
    let context = LayerContext::builder(app.clone())
        .with_layer(security.clone())
        .build()
        .unwrap();
    assert!(context.is_open());

    let key_store = context.resolve::<KeyStore>().unwrap();
    assert!(Arc::ptr_eq(&key_store, &security.get::<KeyStore>().unwrap()));

    // Cipher 属于封闭层的私有组件
    assert!(context.find_by_type(&TypeKey::of::<Cipher>()).unwrap().is_none());
    let private = security.get::<Cipher>().unwrap();
    assert!(Arc::ptr_eq(&private, &key_store.cipher));
}

// ========== 注册 ==========

#[test]
fn test_registration_is_idempotent() {
    init_tracing();
    let environment = environment();
    let first = environment.register::<Vault>().unwrap();
    let second = environment.register::<Vault>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let parsed = DependencyEnvironment::builder()
        .with_parser(Box::new(ComponentCatalog::new().with::<Vault>()))
        .build()
        .unwrap();
    parsed.get_by_type(&TypeKey::of::<Vault>()).unwrap();
    let found = parsed.find_descriptor(&TypeKey::of::<Vault>()).unwrap();
    let again = parsed.register::<Vault>().unwrap();
    assert!(Arc::ptr_eq(&found, &again));
    assert_eq!(parsed.stats().registered_components, 1);
}
