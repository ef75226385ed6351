use chrono::Utc;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use confide::inference::ToolInvocation;
use confide::prompt;
use confide::types::{ChatRole, StoredMessage, Summary};

fn payload_assembly(c: &mut Criterion) {
    let history: Vec<StoredMessage> = (0..30)
        .map(|i| StoredMessage {
            id: (i + 1).to_string(),
            role: if i % 2 == 0 {
                ChatRole::User
            } else {
                ChatRole::Assistant
            },
            content: format!("turn {i}: some realistic amount of message text here"),
            timestamp: Utc::now(),
        })
        .collect();
    let summaries: Vec<Summary> = (0..3)
        .map(|i| Summary {
            id: format!("s{i}"),
            content: format!("summary block {i} covering several earlier exchanges"),
            timestamp: Utc::now(),
        })
        .collect();

    c.bench_function("generation_payload_30_messages", |b| {
        b.iter(|| {
            prompt::generation_payload(
                black_box("persona"),
                &summaries,
                Some("context from the companion model"),
                &history,
                "how are you today?",
            )
        })
    });
}

fn tool_call_normalization(c: &mut Criterion) {
    let wire = serde_json::json!({
        "id": "call_abc",
        "type": "function",
        "function": {
            "name": "process_context_for_summary",
            "arguments": "{\"summary\": \"s\", \"references\": [1, 2, 3]}"
        }
    });

    c.bench_function("tool_invocation_from_wire", |b| {
        b.iter(|| ToolInvocation::from_wire(black_box(&wire)))
    });
}

criterion_group!(benches, payload_assembly, tool_call_normalization);
criterion_main!(benches);
