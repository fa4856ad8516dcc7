use std::net::{IpAddr, Ipv6Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use bytes::BufMut;
use kms_core::service::{
    ClientKey, ClientStore, Dispatcher, KmsService, MemoryStore, PidGenerator, Reply,
    RequestContext, ServerConfig, StaticCatalog,
};
use kms_core::{KmsRequest, KmsResponse, LicenseStatus, padding};
use uuid::Uuid;

#[derive(Default)]
struct CountingPids {
    calls: AtomicUsize,
}

impl PidGenerator for CountingPids {
    fn generate(&self, _counted: &Uuid, version_major: u16, lcid: u32) -> String {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        format!("TEST-{version_major}-{lcid}-{n}")
    }
}

fn request(machine_name: &str, client: u128) -> KmsRequest {
    KmsRequest {
        version_minor: 0,
        version_major: 6,
        is_client_vm: 0,
        license_status: LicenseStatus::GracePeriod,
        grace_time: 43_200,
        application_id: Uuid::parse_str("55c92734-d682-4d71-983e-d6ec3f16059f").unwrap(),
        sku_id: Uuid::parse_str("73111121-5638-40f6-bc11-f1d7b0d64300").unwrap(),
        kms_counted_id: Uuid::parse_str("58e2134f-8e11-4d17-9cb2-91069c151148").unwrap(),
        client_machine_id: Uuid::from_u128(client),
        required_client_count: 25,
        request_time: 132_537_600_000_000_000,
        previous_client_machine_id: Uuid::nil(),
        machine_name: machine_name.to_owned(),
    }
}

fn frame(request: &KmsRequest) -> Vec<u8> {
    let body = request.encode().unwrap();
    let len = u32::try_from(body.len()).unwrap();
    let mut message = Vec::with_capacity(body.len() + 8);
    message.put_u32_le(len);
    message.put_u32_le(len);
    message.extend_from_slice(&body);
    message
}

fn unframe(reply: Reply) -> KmsResponse {
    let Reply::Respond(bytes) = reply else {
        panic!("expected a response");
    };
    let len = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let end = 8 + len as usize;
    assert_eq!(bytes.len(), end + padding(len) as usize);
    KmsResponse::decode(&bytes[8..end]).unwrap()
}

fn dispatcher(store: Arc<dyn ClientStore>, pids: Arc<CountingPids>) -> Dispatcher {
    let service = KmsService::builder(ServerConfig::default())
        .pid_generator(pids)
        .store(store)
        .build();
    Dispatcher::plaintext(Arc::new(service))
}

#[test]
fn activation_round_trip_with_memory_store() {
    let store = Arc::new(MemoryStore::new());
    let pids = Arc::new(CountingPids::default());
    let dispatcher = dispatcher(store.clone(), pids.clone());
    let ctx = RequestContext::from_peer(IpAddr::V6(Ipv6Addr::LOCALHOST));

    let req = request("AC-DESKTOP1", 1);
    let first = unframe(dispatcher.dispatch(&frame(&req), &ctx).unwrap());
    let second = unframe(dispatcher.dispatch(&frame(&req), &ctx).unwrap());

    assert_eq!(first.kms_epid, "TEST-6-1033-0");
    assert_eq!(first.kms_epid, second.kms_epid);
    assert_eq!(pids.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.current_client_count, 26);
    assert_eq!(first.vl_activation_interval, 120);
    assert_eq!(first.vl_renewal_interval, 10_080);

    let record = store
        .get(&ClientKey::new(req.client_machine_id, req.sku_id))
        .unwrap()
        .unwrap();
    assert_eq!(record.request_count, 2);
    assert_eq!(record.machine_ip.as_deref(), Some("::1"));
}

#[test]
fn rejected_host_gets_no_bytes() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = dispatcher(store.clone(), Arc::new(CountingPids::default()));

    let req = request("XX-DESKTOP1", 2);
    let reply = dispatcher
        .dispatch(&frame(&req), &RequestContext::default())
        .unwrap();
    assert_eq!(reply, Reply::Close);

    let record = store
        .get(&ClientKey::new(req.client_machine_id, req.sku_id))
        .unwrap()
        .unwrap();
    assert_eq!(record.license_status, "FAILED");
}

#[test]
fn unknown_version_short_circuits() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = dispatcher(store.clone(), Arc::new(CountingPids::default()));

    let mut req = request("AC-DESKTOP1", 3);
    req.version_major = 99;
    let reply = dispatcher
        .dispatch(&frame(&req), &RequestContext::default())
        .unwrap();

    assert_eq!(
        reply,
        Reply::Respond(vec![0, 0, 0, 0, 0, 0, 0, 0, 0x42, 0xF0, 0x04, 0xC0])
    );
    assert!(store.is_empty().unwrap());
}

#[test]
fn catalog_threshold_and_names_reach_the_store() {
    let req = request("MC-LAB-07", 4);
    let catalog = StaticCatalog::new()
        .with_application(req.application_id, "Office")
        .with_sku(req.sku_id, "Office Professional Plus", Some(5));
    let store = Arc::new(MemoryStore::new());
    let service = KmsService::builder(ServerConfig::default().with_client_count(50))
        .catalog(Arc::new(catalog))
        .store(store.clone())
        .build();
    let dispatcher = Dispatcher::plaintext(Arc::new(service));

    let response = unframe(
        dispatcher
            .dispatch(&frame(&req), &RequestContext::default())
            .unwrap(),
    );
    assert_eq!(response.current_client_count, 50);

    let record = store
        .get(&ClientKey::new(req.client_machine_id, req.sku_id))
        .unwrap()
        .unwrap();
    assert_eq!(record.application, "Office");
}

#[test]
fn concurrent_clients_keep_one_epid_each() {
    let store = Arc::new(MemoryStore::new());
    let pids = Arc::new(CountingPids::default());
    let dispatcher = Arc::new(dispatcher(store.clone(), pids.clone()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8u128)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // two threads per client machine
                let message = frame(&request("PC-WORKER", i % 4));
                barrier.wait();
                (0..10)
                    .map(|_| {
                        unframe(
                            dispatcher
                                .dispatch(&message, &RequestContext::default())
                                .unwrap(),
                        )
                        .kms_epid
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut per_client: Vec<Vec<String>> = vec![Vec::new(); 4];
    for (i, handle) in handles.into_iter().enumerate() {
        per_client[i % 4].extend(handle.join().unwrap());
    }

    for epids in &per_client {
        assert_eq!(epids.len(), 20);
        assert!(epids.iter().all(|epid| epid == &epids[0]));
    }
    assert_eq!(pids.calls.load(Ordering::SeqCst), 4);
    assert_eq!(store.len().unwrap(), 4);
}

#[test]
fn fixed_epid_overrides_generation() {
    let pids = Arc::new(CountingPids::default());
    let service = KmsService::builder(ServerConfig::default().with_epid("55041-00168-305-190596-03-1033-9600.0000-0552017"))
        .pid_generator(pids.clone())
        .store(Arc::new(MemoryStore::new()))
        .build();
    let dispatcher = Dispatcher::plaintext(Arc::new(service));

    let response = unframe(
        dispatcher
            .dispatch(&frame(&request("AC-1", 5)), &RequestContext::default())
            .unwrap(),
    );
    assert_eq!(response.kms_epid, "55041-00168-305-190596-03-1033-9600.0000-0552017");
    assert_eq!(pids.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn empty_fixed_epid_falls_through_to_store() {
    let pids = Arc::new(CountingPids::default());
    let service = KmsService::builder(ServerConfig::default().with_epid(""))
        .pid_generator(pids.clone())
        .store(Arc::new(MemoryStore::new()))
        .build();
    let dispatcher = Dispatcher::plaintext(Arc::new(service));
    let message = frame(&request("AC-1", 8));

    let first = unframe(dispatcher.dispatch(&message, &RequestContext::default()).unwrap());
    let second = unframe(dispatcher.dispatch(&message, &RequestContext::default()).unwrap());
    assert_eq!(first.kms_epid, "TEST-6-1033-0");
    assert_eq!(second.kms_epid, first.kms_epid);
    assert_eq!(pids.calls.load(Ordering::SeqCst), 1);
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use kms_core::service::{SqliteStore, StoreError};

    #[test]
    fn epid_survives_restart() {
        let path = std::env::temp_dir().join(format!("kms-core-it-{}.db", Uuid::new_v4()));
        let req = request("AC-DESKTOP1", 6);

        let first = {
            let store = Arc::new(SqliteStore::open(&path).unwrap());
            let dispatcher = dispatcher(store, Arc::new(CountingPids::default()));
            unframe(
                dispatcher
                    .dispatch(&frame(&req), &RequestContext::default())
                    .unwrap(),
            )
        };

        let pids = Arc::new(CountingPids::default());
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let dispatcher = dispatcher(store.clone(), pids.clone());
        let second = unframe(
            dispatcher
                .dispatch(&frame(&req), &RequestContext::default())
                .unwrap(),
        );

        assert_eq!(first.kms_epid, second.kms_epid);
        assert_eq!(pids.calls.load(Ordering::SeqCst), 0);
        let record = store
            .get(&ClientKey::new(req.client_machine_id, req.sku_id))
            .unwrap()
            .unwrap();
        assert_eq!(record.request_count, 2);

        drop(dispatcher);
        drop(store);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unopenable_store_is_fatal() {
        let path = std::env::temp_dir()
            .join(format!("kms-core-absent-{}", Uuid::new_v4()))
            .join("clients.db");
        match SqliteStore::open(&path) {
            Err(StoreError::Open { path: reported, .. }) => {
                assert!(reported.ends_with("clients.db"));
            }
            other => panic!("expected open failure, got {other:?}"),
        }
    }

    #[test]
    fn concurrent_sqlite_upserts_are_counted() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let dispatcher = Arc::new(dispatcher(store.clone(), Arc::new(CountingPids::default())));
        let message = frame(&request("PC-SHARED", 7));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                let message = message.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        dispatcher
                            .dispatch(&message, &RequestContext::default())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let req = request("PC-SHARED", 7);
        let record = store
            .get(&ClientKey::new(req.client_machine_id, req.sku_id))
            .unwrap()
            .unwrap();
        assert_eq!(record.request_count, 100);
    }
}
