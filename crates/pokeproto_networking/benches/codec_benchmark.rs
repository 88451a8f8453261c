//! Codec throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pokeproto_networking::{CalculationReport, ChatContent, ChatMessage, Message};

fn report() -> Message {
    Message::CalculationReport(CalculationReport {
        attacker: "Charizard".to_string(),
        move_used: "Fire Attack".to_string(),
        remaining_health: 78,
        damage_dealt: 41,
        defender_hp_remaining: 38,
        status_message: "Charizard used Fire Attack! It was effective! Dealt 41 damage.".to_string(),
        sequence_number: 17,
    })
}

fn bench_encode(c: &mut Criterion) {
    let message = report();
    c.bench_function("encode_calculation_report", |b| {
        b.iter(|| black_box(&message).encode());
    });
}

fn bench_decode(c: &mut Criterion) {
    let bytes = report().encode();
    c.bench_function("decode_calculation_report", |b| {
        b.iter(|| Message::decode(black_box(&bytes)));
    });

    let chat = Message::ChatMessage(ChatMessage {
        sender_name: "Ash".to_string(),
        content: ChatContent::Text("good luck, have fun".to_string()),
        sequence_number: 3,
    })
    .encode();
    c.bench_function("decode_chat", |b| {
        b.iter(|| Message::decode(black_box(&chat)));
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
