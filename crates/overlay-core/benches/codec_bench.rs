//! Criterion benchmarks for the overlay wire codec.
//!
//! Every captured key or mouse event goes through classify → count → encode
//! on the broadcaster thread, and every heartbeat reply goes through the
//! decoder, so both paths are measured here.
//!
//! Run with:
//! ```bash
//! cargo bench --package overlay-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use overlay_core::protocol::codec::{encode_button_event, encode_device_event, encode_ping};
use overlay_core::{
    classify_event, decode_client_message, ButtonEvent, Device, DeviceEvent, DeviceHandle,
    DeviceKind, KeyboardButton, MouseButton, PressCounters, RawKeyboard,
};

// ── Event fixtures ────────────────────────────────────────────────────────────

fn make_key_press() -> ButtonEvent {
    ButtonEvent::key(
        KeyboardButton::A,
        RawKeyboard {
            makecode: 0x1E,
            flags: 0,
            vkey: 0x41,
        },
        true,
        false,
    )
}

fn make_click() -> ButtonEvent {
    ButtonEvent::click(MouseButton::Mouse1, true)
}

fn make_wheel() -> ButtonEvent {
    ButtonEvent::wheel(MouseButton::MouseWheelDown, 1)
}

fn make_device() -> DeviceEvent {
    DeviceEvent {
        device: Device {
            handle: DeviceHandle::from_raw(0x0001_0043),
            kind: DeviceKind::Keyboard,
        },
        attached: true,
    }
}

/// Benchmarks encoding of every outbound message shape.
fn bench_encode(c: &mut Criterion) {
    let events: &[(&str, ButtonEvent)] = &[
        ("Keyboard", make_key_press()),
        ("MouseClick", make_click()),
        ("MouseWheel", make_wheel()),
    ];

    let mut group = c.benchmark_group("encode");
    for (name, evt) in events {
        group.bench_with_input(BenchmarkId::new("button", name), evt, |b, evt| {
            b.iter(|| encode_button_event(black_box(evt), black_box(7)).unwrap())
        });
    }

    let device = make_device();
    group.bench_function("Devices", |b| {
        b.iter(|| encode_device_event(black_box(&device)).unwrap())
    });
    group.bench_function("Ping", |b| b.iter(|| encode_ping(black_box(123_456_789)).unwrap()));
    group.finish();
}

/// Benchmarks the inbound control-message decoder.
fn bench_decode(c: &mut Criterion) {
    let inputs: &[(&str, &str)] = &[
        ("listen", r#"{"listen":"MouseButtons"}"#),
        ("ping", r#"{"ping":123456789}"#),
        ("rejected", r#"{"listen":"Keyboard","ping":1}"#),
    ];

    let mut group = c.benchmark_group("decode_client_message");
    for (name, text) in inputs {
        group.bench_with_input(BenchmarkId::new("msg", name), text, |b, text| {
            b.iter(|| decode_client_message(black_box(text)))
        });
    }
    group.finish();
}

/// Benchmarks the full per-event broadcaster path minus delivery.
fn bench_hot_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_count_encode");
    let mut counters = PressCounters::new();

    let key = make_key_press();
    group.bench_function("Keyboard", |b| {
        b.iter(|| {
            let category = classify_event(black_box(&key)).unwrap();
            let presses = counters.record_and_fetch(category, &key).unwrap();
            encode_button_event(&key, presses).unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_hot_path);
criterion_main!(benches);
