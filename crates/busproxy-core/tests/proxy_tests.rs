//! Integration tests for ProxyHandle against the in-memory transport.
//!
//! Retry schedules run on a recording sleeper, so backoff is asserted
//! without actually sleeping.

use busproxy_core::{
    BusConfig, ConnectionSource, MemoryTransport, Ownership, ProxyError, ProxyHandle,
    RecordingSleeper, RetryConfig, ServiceEndpoint, SetupMode, Transport, TransportError, Value,
};
use std::sync::Arc;
use std::time::Duration;

const BUS_NAME: &str = "net.example.Service";
const IFACE: &str = "net.example.Service.Manager";
const PATH: &str = "/net/example/Service";

const UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";
const ACCESS_DENIED: &str = "org.freedesktop.DBus.Error.AccessDenied";

fn endpoint() -> ServiceEndpoint {
    ServiceEndpoint::new(BUS_NAME, IFACE, PATH)
}

/// Owned proxy sharing its transport with the test for inspection.
fn create_proxy(
    transport: &Arc<MemoryTransport>,
    sleeper: &Arc<RecordingSleeper>,
    mode: SetupMode,
) -> ProxyHandle<MemoryTransport> {
    ProxyHandle::new(ConnectionSource::Owned(Arc::clone(transport)), endpoint(), mode)
        .unwrap()
        .with_sleeper(sleeper.clone())
}

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|s| Duration::from_secs(*s)).collect()
}

fn unknown_method() -> TransportError {
    TransportError::method_error(UNKNOWN_METHOD, "No such interface 'org.freedesktop.DBus.Properties'")
}

// ========== Construction ==========

#[test]
fn test_immediate_and_deferred_setup() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());

    let eager = create_proxy(&transport, &sleeper, SetupMode::Immediate);
    assert!(eager.is_proxy_initialized());
    assert!(eager.is_property_proxy_initialized());

    let mut lazy = create_proxy(&transport, &sleeper, SetupMode::Deferred);
    assert!(!lazy.is_proxy_initialized());
    assert!(!lazy.is_property_proxy_initialized());

    lazy.setup().unwrap();
    assert!(lazy.is_proxy_initialized());
    assert!(lazy.is_property_proxy_initialized());

    // Setup is idempotent once both are bound
    lazy.setup().unwrap();
    assert_eq!(transport.binds().len(), 4);
}

#[test]
fn test_empty_endpoint_fields_are_rejected() {
    let cases = [
        ServiceEndpoint::new("", IFACE, PATH),
        ServiceEndpoint::new(BUS_NAME, "", PATH),
        ServiceEndpoint::new(BUS_NAME, IFACE, ""),
    ];
    for endpoint in cases {
        let transport = Arc::new(MemoryTransport::new());
        let result = ProxyHandle::new(
            ConnectionSource::Owned(Arc::clone(&transport)),
            endpoint,
            SetupMode::Immediate,
        );
        assert!(matches!(result, Err(ProxyError::Validation { .. })));
        assert!(transport.binds().is_empty());
        assert!(!transport.is_connected());
    }
}

#[test]
fn test_accessors() {
    let transport = Arc::new(MemoryTransport::new());
    let proxy = ProxyHandle::new(
        ConnectionSource::borrowed(&transport),
        endpoint(),
        SetupMode::Deferred,
    )
    .unwrap();

    assert_eq!(proxy.bus_name(), BUS_NAME);
    assert_eq!(proxy.interface(), IFACE);
    assert_eq!(proxy.object_path(), PATH);
    assert_eq!(proxy.endpoint(), &endpoint());
    assert_eq!(proxy.ownership(), Ownership::Borrowed);
    assert_eq!(proxy.retry_config(), &RetryConfig::default());
}

// ========== Teardown ==========

#[test]
fn test_owned_teardown_releases_each_bound_handle_once() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());

    let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);
    assert!(transport.released().is_empty());
    drop(proxy);

    let bound: Vec<u64> = transport.binds().iter().map(|b| b.handle_id).collect();
    assert_eq!(transport.released(), bound);
}

#[test]
fn test_owned_teardown_skips_unbound_handles() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());

    drop(create_proxy(&transport, &sleeper, SetupMode::Deferred));
    assert!(transport.released().is_empty());
}

#[test]
fn test_borrowed_teardown_never_releases() {
    let transport = Arc::new(MemoryTransport::new());

    let first = ProxyHandle::new(
        ConnectionSource::borrowed(&transport),
        endpoint(),
        SetupMode::Immediate,
    )
    .unwrap();
    let second = ProxyHandle::new(
        ConnectionSource::borrowed(&transport),
        ServiceEndpoint::new(BUS_NAME, IFACE, "/net/example/Service/other"),
        SetupMode::Immediate,
    )
    .unwrap();

    first.ping().unwrap();
    drop(first);
    drop(second);

    assert_eq!(transport.binds().len(), 5);
    assert!(transport.released().is_empty());
    // Both handles shared one connection
    assert_eq!(transport.connection_count(), 1);
}

// ========== Properties ==========

#[test]
fn test_property_round_trips() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);

    proxy.set_bool("enabled", true).unwrap();
    assert!(proxy.get_bool("enabled").unwrap());

    proxy.set_string("name", "primary").unwrap();
    assert_eq!(proxy.get_string("name").unwrap(), "primary");

    proxy.set_u32("limit", u32::MAX).unwrap();
    assert_eq!(proxy.get_u32("limit").unwrap(), u32::MAX);

    proxy.set_u64("bytes", 1 << 40).unwrap();
    assert_eq!(proxy.get_u64("bytes").unwrap(), 1 << 40);

    let nested = Value::Array(vec![Value::from(1u32), Value::from(2u32)]);
    proxy.set_property("list", nested.clone()).unwrap();
    assert_eq!(proxy.get_property("list").unwrap(), nested);
}

#[test]
fn test_empty_names_never_reach_transport() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);

    assert!(matches!(
        proxy.call("", &[]),
        Err(ProxyError::Validation { field: "Method" })
    ));
    assert!(matches!(
        proxy.get_property(""),
        Err(ProxyError::Validation { field: "Property" })
    ));
    assert!(matches!(
        proxy.set_property("", Value::Bool(true)),
        Err(ProxyError::Validation { field: "Property" })
    ));
    assert!(transport.calls().is_empty());
}

#[test]
fn test_property_access_before_setup() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let proxy = create_proxy(&transport, &sleeper, SetupMode::Deferred);

    let err = proxy.get_string("name").unwrap_err();
    assert_eq!(err.to_string(), "Property proxy has not been initialized");
}

// ========== Service version probe ==========

#[test]
fn test_version_probe_waits_for_property_interface() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    transport.set_property(IFACE, "version", "1.2.3");
    transport.push_failures(BusConfig::PROPERTIES_INTERFACE, "Get", &unknown_method(), 3);

    let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);
    assert_eq!(proxy.get_service_version().unwrap(), "1.2.3");

    assert_eq!(transport.call_count(BusConfig::PROPERTIES_INTERFACE, "Get"), 4);
    assert_eq!(sleeper.delays(), secs(&[1, 2, 3]));
    assert_eq!(sleeper.total(), Duration::from_secs(6));
}

#[test]
fn test_version_probe_without_version_property() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());

    let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);
    assert_eq!(proxy.get_service_version().unwrap(), "");

    assert_eq!(transport.call_count(BusConfig::PROPERTIES_INTERFACE, "Get"), 1);
    assert!(sleeper.delays().is_empty());
}

#[test]
fn test_version_probe_gives_up() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    transport.respond(BusConfig::PROPERTIES_INTERFACE, "Get", |_| {
        Err(unknown_method())
    });

    let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);
    match proxy.get_service_version() {
        Err(ProxyError::ServiceUnavailable { bus_name, attempts }) => {
            assert_eq!(bus_name, BUS_NAME);
            assert_eq!(attempts, 10);
        }
        other => panic!("Expected ServiceUnavailable, got: {:?}", other),
    }

    assert_eq!(transport.call_count(BusConfig::PROPERTIES_INTERFACE, "Get"), 10);
    assert_eq!(sleeper.delays(), secs(&[1, 2, 3, 4, 5, 6, 7, 8, 9]));
}

#[test]
fn test_version_probe_propagates_other_errors() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    transport.push_reply(
        BusConfig::PROPERTIES_INTERFACE,
        "Get",
        Err(TransportError::method_error(
            "org.freedesktop.DBus.Error.Failed",
            "Backend crashed",
        )),
    );

    let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);
    let err = proxy.get_service_version().unwrap_err();
    assert!(matches!(err, ProxyError::Generic { .. }));
    assert!(err.to_string().contains("Backend crashed"));
    assert!(sleeper.delays().is_empty());
}

#[test]
fn test_version_type_mismatch_is_not_retried() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    transport.set_property(IFACE, "version", 3u32);

    let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);
    assert!(matches!(
        proxy.get_service_version(),
        Err(ProxyError::TypeMismatch { .. })
    ));
}

// ========== Ping ==========

#[test]
fn test_ping_recovers_after_failures() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    transport.push_failures(
        BusConfig::PEER_INTERFACE,
        "Ping",
        &TransportError::method_error(
            "org.freedesktop.DBus.Error.ServiceUnknown",
            "The name is not activatable",
        ),
        2,
    );

    let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate)
        .with_retry_config(RetryConfig::default().with_ping_grace(Duration::ZERO));
    proxy.ping().unwrap();

    assert_eq!(transport.call_count(BusConfig::PEER_INTERFACE, "Ping"), 3);
    assert_eq!(sleeper.delays(), secs(&[1, 1]));
    assert_eq!(sleeper.total(), Duration::from_secs(2));
}

#[test]
fn test_ping_waits_grace_period_after_success() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());

    let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);
    proxy.ping().unwrap();

    assert_eq!(sleeper.delays(), vec![Duration::from_micros(400)]);
}

#[test]
fn test_ping_gives_up() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    transport.respond(BusConfig::PEER_INTERFACE, "Ping", |_| Ok(None));

    let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);
    let err = proxy.ping().unwrap_err();

    assert_eq!(
        err.to_string(),
        "D-Bus service 'net.example.Service' did not respond after 3 attempts"
    );
    assert!(matches!(err, ProxyError::ServiceUnresponsive { attempts: 3, .. }));
    assert_eq!(transport.call_count(BusConfig::PEER_INTERFACE, "Ping"), 3);
    assert_eq!(sleeper.delays(), secs(&[1, 1]));

    // The transient peer handle is released even on failure
    let peer = transport.binds().last().map(|b| b.handle_id).unwrap();
    assert_eq!(transport.released(), vec![peer]);
}

#[test]
fn test_ping_carries_call_flags() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());

    let mut proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);
    proxy.set_call_flags(busproxy_core::CallFlag::NoAutoStart);
    proxy.ping().unwrap();

    let ping = transport
        .calls()
        .into_iter()
        .find(|c| c.method == "Ping")
        .unwrap();
    assert_eq!(ping.bus_name, BUS_NAME);
    assert_eq!(ping.object_path, "/");
    assert!(ping.flags.contains(busproxy_core::CallFlag::NoAutoStart));
}

// ========== Object existence ==========

#[test]
fn test_object_exists_outcomes() {
    let denied = TransportError::method_error(ACCESS_DENIED, "Rejected");
    let missing = TransportError::method_error(UNKNOWN_METHOD, "No such object path");

    let cases: [(Result<Option<Value>, TransportError>, bool); 4] = [
        (Ok(Some(Value::unit())), true),
        (Err(denied), true),
        (Err(missing), false),
        (Ok(None), false),
    ];

    for (reply, expected) in cases {
        let transport = Arc::new(MemoryTransport::new());
        let sleeper = Arc::new(RecordingSleeper::new());
        transport.push_reply(BusConfig::PROPERTIES_INTERFACE, "GetAll", reply);

        let proxy = create_proxy(&transport, &sleeper, SetupMode::Immediate);
        assert_eq!(proxy.check_object_exists().unwrap(), expected);
        assert_eq!(
            transport.call_count(BusConfig::PROPERTIES_INTERFACE, "GetAll"),
            1
        );
    }
}

#[test]
fn test_object_exists_requires_property_proxy() {
    let transport = Arc::new(MemoryTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());

    let proxy = create_proxy(&transport, &sleeper, SetupMode::Deferred);
    assert!(matches!(
        proxy.check_object_exists(),
        Err(ProxyError::Precondition { .. })
    ));
    assert!(transport.calls().is_empty());
}
