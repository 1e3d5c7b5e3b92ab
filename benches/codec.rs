use criterion::{black_box, criterion_group, criterion_main, Criterion};
use switcher_link::protocol::commands::{
    Command, InitComplete, InputProperties, PreviewInput, ProgramInput, Topology, Version,
};
use switcher_link::protocol::{CommandCodec, RecordCodec};
use switcher_link::state::DeviceState;
use switcher_link::ProtocolVersion;

fn handshake_burst() -> Vec<Command> {
    let mut commands = vec![
        Command::from(Version {
            version: ProtocolVersion::V7_2,
        }),
        Command::from(Topology {
            mix_effects: 2,
            ..Topology::default()
        }),
    ];
    for id in 1..=20u16 {
        commands.push(
            InputProperties {
                id,
                long_name: format!("Camera {}", id),
                short_name: format!("CAM{}", id % 10),
                are_names_default: true,
                available_external_ports: 1,
                external_port_type: 1,
                internal_port_type: 0,
                source_availability: 0x1F,
                mix_effect_availability: 0x03,
            }
            .into(),
        );
    }
    for mix_effect in 0..2u8 {
        commands.push(ProgramInput { mix_effect, source: 1 }.into());
        commands.push(
            PreviewInput {
                mix_effect,
                source: 2,
                preview_live: Some(false),
            }
            .into(),
        );
    }
    commands.push(InitComplete.into());
    commands
}

fn bench_decode(c: &mut Criterion) {
    let burst = handshake_burst();
    let payload = CommandCodec::default()
        .encode_payload(&burst)
        .expect("encode handshake burst");

    c.bench_function("split_and_decode_handshake", |b| {
        b.iter(|| {
            let raw = RecordCodec::new().split(black_box(&payload)).expect("split");
            CommandCodec::default().decode_payload(&raw).expect("decode")
        })
    });

    c.bench_function("apply_handshake", |b| {
        b.iter(|| {
            let mut state = DeviceState::new();
            for command in &burst {
                state.apply(black_box(command));
            }
            state
        })
    });
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
