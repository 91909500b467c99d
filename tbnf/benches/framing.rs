#[macro_use]
extern crate criterion;

extern crate tbnf;

use criterion::black_box;
use criterion::Criterion;
use tbnf::prelude::*;

fn pack_and_tag_lookup(c: &mut Criterion) {
    let registry = MessageRegistry::build(Vec::new()).unwrap();
    let message = IdentificationMessage { hardware_address: [1, 2, 3, 4, 5, 6] };

    c.bench_function("pack identification message", move |b| {
        b.iter(|| {
            let frame = PackagedFrame::pack(&registry, &message).unwrap();
            black_box(frame);
        })
    });

    let registry = MessageRegistry::build(Vec::new()).unwrap();
    let frame = PackagedFrame::pack(&registry, &message).unwrap();

    c.bench_function("unpack identification message", move |b| {
        b.iter(|| {
            let decoded: IdentificationMessage = frame.unpack(&registry).unwrap();
            black_box(decoded);
        })
    });
}

criterion_group!(benches, pack_and_tag_lookup);
criterion_main!(benches);
