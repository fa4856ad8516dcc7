//! Dispatch one activation request through the plaintext transform
//!
//! Run with `RUST_LOG=debug cargo run --example serve_once` to see the
//! per-request log fields.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use kms_core::service::{
    Dispatcher, KmsService, MemoryStore, Reply, RequestContext, ServerConfig, StaticCatalog,
    metrics_snapshot,
};
use kms_core::{KmsRequest, KmsResponse, LicenseStatus};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let application_id = Uuid::parse_str("55c92734-d682-4d71-983e-d6ec3f16059f")?;
    let sku_id = Uuid::parse_str("73111121-5638-40f6-bc11-f1d7b0d64300")?;
    let catalog = StaticCatalog::new()
        .with_application(application_id, "Windows")
        .with_sku(sku_id, "Windows 10 Enterprise", Some(25));

    let service = KmsService::builder(ServerConfig::default())
        .catalog(Arc::new(catalog))
        .store(Arc::new(MemoryStore::new()))
        .build();
    let dispatcher = Dispatcher::plaintext(Arc::new(service));

    let request = KmsRequest {
        version_minor: 0,
        version_major: 6,
        is_client_vm: 0,
        license_status: LicenseStatus::GracePeriod,
        grace_time: 43_200,
        application_id,
        sku_id,
        kms_counted_id: Uuid::parse_str("58e2134f-8e11-4d17-9cb2-91069c151148")?,
        client_machine_id: Uuid::new_v4(),
        required_client_count: 25,
        request_time: 132_537_600_000_000_000,
        previous_client_machine_id: Uuid::nil(),
        machine_name: "AC-DEMO".to_owned(),
    };

    let body = request.encode()?;
    let len = u32::try_from(body.len())?;
    let mut message = Vec::with_capacity(body.len() + 8);
    message.extend_from_slice(&len.to_le_bytes());
    message.extend_from_slice(&len.to_le_bytes());
    message.extend_from_slice(&body);

    let ctx = RequestContext::from_peer(IpAddr::V4(Ipv4Addr::LOCALHOST));
    match dispatcher.dispatch(&message, &ctx)? {
        Reply::Respond(bytes) => {
            let body_len = u32::from_le_bytes(bytes[..4].try_into()?) as usize;
            let response = KmsResponse::decode(&bytes[8..8 + body_len])?;
            println!("Reply: {} bytes", bytes.len());
            println!("  EPID:         {}", response.kms_epid);
            println!("  Client count: {}", response.current_client_count);
            println!("  Intervals:    {} / {} minutes", response.vl_activation_interval, response.vl_renewal_interval);
        }
        Reply::Close => println!("Session closed without a reply"),
    }

    println!("{:?}", metrics_snapshot());
    Ok(())
}
