use codspeed_criterion_compat::{black_box, criterion_group, criterion_main, Criterion};
use padlobby_workspace::parse_config;

fn bench_parse_config(c: &mut Criterion) {
    let yaml: &str = include_str!("../../../padlobby.example.yaml");

    c.bench_function("workspace_parse_config_example", |b| {
        b.iter(|| {
            let input = black_box(yaml);
            let config = parse_config(input).expect("config should parse");
            black_box(config);
        })
    });
}

criterion_group!(benches, bench_parse_config);
criterion_main!(benches);
