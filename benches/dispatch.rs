/// Benchmarks for the per-frame hot path: routing inbound frames by topic and signing
/// authenticated envelopes.
use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use xt_ws_client::auth::{SecretString, sign, to_message};
use xt_ws_client::session::CallbackRouter;

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("router/dispatch");

    let router = CallbackRouter::new();
    for topic in ["ticker", "depth", "trade", "kline", "balance", "order"] {
        router.set_callback(topic, |bytes| {
            black_box(bytes);
        });
    }

    let ticker = r#"{"topic":"ticker","event":"ticker@btc_usdt","data":{"s":"btc_usdt","t":1656043204763,"cv":"-200","cr":"-0.0066","o":"30000","c":"29800","h":"30100.5","l":"29700","q":"12.5","v":"372500.1"}}"#;
    group.throughput(Throughput::Bytes(ticker.len() as u64));
    group.bench_function("delivered", |b| {
        b.iter(|| router.dispatch(black_box(ticker.as_bytes())));
    });

    let unhandled = r#"{"topic":"depth_update","event":"depth_update@btc_usdt","data":{"s":"btc_usdt","fi":1,"i":2,"a":[["30001","0.5"]],"b":[]}}"#;
    group.throughput(Throughput::Bytes(unhandled.len() as u64));
    group.bench_function("unhandled", |b| {
        b.iter(|| router.dispatch(black_box(unhandled.as_bytes())));
    });

    group.bench_function("pong", |b| {
        b.iter(|| router.dispatch(black_box(b"pong")));
    });

    group.finish();
}

fn bench_sign(c: &mut Criterion) {
    let mut group = c.benchmark_group("auth/sign");

    let secret = SecretString::from("bench-secret".to_owned());
    let params = json!({ "symbol": "btc_usdt", "side": "BUY", "type": "LIMIT", "price": "30000", "quantity": "0.01" })
        .to_string();

    group.bench_function("order_place", |b| {
        b.iter(|| {
            let message = to_message("spot.order_place", black_box(&params), 1_700_000_000);
            sign(&secret, &message).expect("signing should succeed")
        });
    });

    group.finish();
}

criterion_group!(benches, bench_dispatch, bench_sign);
criterion_main!(benches);
