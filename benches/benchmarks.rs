//! Performance benchmarks for wg-session
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wg_session::events::{EventBridge, SessionEvent};
use wg_session::wireguard::PrivateKey;
use wg_session::TunnelConfig;

const PRIVATE_KEY: &str = "yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=";

fn config_with_peers(peers: usize) -> String {
    let mut text = format!(
        "[Interface]\nPrivateKey = {}\nAddress = 10.0.0.2/32, fd00::2/128\nDNS = 1.1.1.1\n",
        PRIVATE_KEY
    );
    for i in 0..peers {
        let key = PrivateKey::generate().public_key().to_base64();
        text.push_str(&format!(
            "\n[Peer]\nPublicKey = {}\nAllowedIPs = 10.{}.0.0/16\nEndpoint = 198.51.100.1:{}\n",
            key,
            i % 256,
            51820 + i
        ));
    }
    text
}

fn bench_key_generation(c: &mut Criterion) {
    c.bench_function("key_generation", |b| {
        b.iter(|| {
            let _key = PrivateKey::generate();
        });
    });
}

fn bench_public_key_derivation(c: &mut Criterion) {
    let private_key = PrivateKey::generate();

    c.bench_function("public_key_derivation", |b| {
        b.iter(|| {
            let _public = black_box(&private_key).public_key();
        });
    });
}

fn bench_config_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_parsing");

    for peers in [1, 10, 100] {
        let text = config_with_peers(peers);
        group.bench_with_input(BenchmarkId::from_parameter(peers), &text, |b, text| {
            b.iter(|| TunnelConfig::parse(black_box(text)));
        });
    }

    group.finish();
}

fn bench_uapi_rendering(c: &mut Criterion) {
    let config = TunnelConfig::parse(&config_with_peers(10)).expect("valid config");

    c.bench_function("uapi_rendering", |b| {
        b.iter(|| black_box(&config).to_uapi());
    });
}

fn bench_event_fanout(c: &mut Criterion) {
    let bridge = EventBridge::new();
    let mut subscriptions: Vec<_> = (0..8).map(|_| bridge.subscribe()).collect();

    c.bench_function("event_fanout_8", |b| {
        b.iter(|| {
            bridge.emit(SessionEvent::started("bench", 1));
            for sub in subscriptions.iter_mut() {
                let _ = sub.events.try_recv();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_key_generation,
    bench_public_key_derivation,
    bench_config_parsing,
    bench_uapi_rendering,
    bench_event_fanout
);
criterion_main!(benches);
