use std::sync::Arc;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use kms_core::service::{Dispatcher, KmsService, MemoryStore, RequestContext, ServerConfig};
use kms_core::{KmsRequest, KmsResponse, LicenseStatus};
use uuid::Uuid;

fn sample_request() -> KmsRequest {
    KmsRequest {
        version_minor: 0,
        version_major: 6,
        is_client_vm: 0,
        license_status: LicenseStatus::GracePeriod,
        grace_time: 43_200,
        application_id: Uuid::from_u128(0x55c9_2734_d682_4d71_983e_d6ec_3f16_059f),
        sku_id: Uuid::from_u128(0x7311_1121_5638_40f6_bc11_f1d7_b0d6_4300),
        kms_counted_id: Uuid::from_u128(0x58e2_134f_8e11_4d17_9cb2_9106_9c15_1148),
        client_machine_id: Uuid::from_u128(0xd8f2_a1b4_55c7_4a7e_b1a3_6f0c_9e2d_4b11),
        required_client_count: 25,
        request_time: 132_537_600_000_000_000,
        previous_client_machine_id: Uuid::nil(),
        machine_name: "AC-DESKTOP1".to_owned(),
    }
}

fn sample_response() -> KmsResponse {
    KmsResponse {
        version_minor: 0,
        version_major: 6,
        kms_epid: "06401-00206-271-394032-03-1033-9600.0000-0552017".to_owned(),
        client_machine_id: Uuid::from_u128(0xd8f2_a1b4_55c7_4a7e_b1a3_6f0c_9e2d_4b11),
        response_time: 132_537_600_000_000_000,
        current_client_count: 26,
        vl_activation_interval: 120,
        vl_renewal_interval: 10_080,
    }
}

fn bench_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("request");
    let request = sample_request();
    let encoded = request.encode().unwrap();
    group.throughput(Throughput::Bytes(encoded.len() as u64));

    group.bench_function("encode", |b| {
        b.iter(|| {
            black_box(request.encode().unwrap());
        });
    });

    group.bench_function("decode", |b| {
        b.iter(|| {
            black_box(KmsRequest::decode(black_box(&encoded)).unwrap());
        });
    });

    group.finish();
}

fn bench_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("response");
    let response = sample_response();
    let encoded = response.encode().unwrap();
    group.throughput(Throughput::Bytes(encoded.len() as u64));

    group.bench_function("encode", |b| {
        b.iter(|| {
            black_box(response.encode().unwrap());
        });
    });

    group.bench_function("decode", |b| {
        b.iter(|| {
            black_box(KmsResponse::decode(black_box(&encoded)).unwrap());
        });
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let service = KmsService::builder(ServerConfig::default())
        .store(Arc::new(MemoryStore::new()))
        .build();
    let dispatcher = Dispatcher::plaintext(Arc::new(service));

    let body = sample_request().encode().unwrap();
    let len = u32::try_from(body.len()).unwrap();
    let mut message = Vec::with_capacity(body.len() + 8);
    message.extend_from_slice(&len.to_le_bytes());
    message.extend_from_slice(&len.to_le_bytes());
    message.extend_from_slice(&body);

    let ctx = RequestContext::default();
    c.bench_function("dispatch_v6_plaintext", |b| {
        b.iter(|| {
            black_box(dispatcher.dispatch(black_box(&message), &ctx).unwrap());
        });
    });
}

criterion_group!(benches, bench_request, bench_response, bench_dispatch);
criterion_main!(benches);
