//! Benchmarks for citeweave segmentation, renumbering and full runs.
//!
//! Run with: cargo bench
//!
//! These benchmarks use synthetic articles with scattered local citations.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use citeweave::{
    CitationRenumberer, EchoGenerator, ExternalCandidate, Integrator, LocalReferences,
    ReferenceMetadata, ReferenceType,
};

/// Creates a synthetic article with the given number of sections.
///
/// Local numbers start at 100 and are cited out of order so that
/// renumbering has real work to do.
fn create_test_article(section_count: usize) -> String {
    let mut text = String::from("# Synthetic Article\n\n## Abstract\nA short abstract.\n\n");
    for i in 0..section_count {
        let a = 100 + (i * 7) % (section_count * 2);
        let b = 100 + (i * 3 + 1) % (section_count * 2);
        text.push_str(&format!(
            "## Section {}\nThe first claim relies on earlier work [{}]. \
             A second claim combines results [{}, {}]. A range covers more [{}-{}].\n\n",
            i,
            a,
            a,
            b,
            b,
            b + 1
        ));
    }
    text
}

fn create_local(section_count: usize) -> LocalReferences {
    (100..100 + section_count as u32 * 2 + 2)
        .map(|n| (n, ReferenceMetadata::new(format!("Paper {}", n), vec![])))
        .collect()
}

/// Benchmark section segmentation.
fn bench_segmentation(c: &mut Criterion) {
    let article = create_test_article(50);

    c.bench_function("segment_50_sections", |b| {
        b.iter(|| citeweave::segment(black_box(&article)));
    });
}

/// Benchmark two-phase renumbering at various sizes.
fn bench_renumbering(c: &mut Criterion) {
    let mut group = c.benchmark_group("renumbering");

    for section_count in [10, 50, 200].iter() {
        let article = create_test_article(*section_count);
        let local = create_local(*section_count);
        let renumberer = CitationRenumberer::for_local(&local);

        group.bench_function(format!("{}_sections", section_count), |b| {
            b.iter(|| renumberer.renumber(black_box(&article)));
        });
    }

    group.finish();
}

/// Benchmark a full run with the echo generator (fallback path).
fn bench_full_run(c: &mut Criterion) {
    let article = create_test_article(20);
    let local = create_local(20);
    let candidates: Vec<ExternalCandidate> = (1000..1010)
        .map(|p| {
            ExternalCandidate::new(
                p,
                ReferenceMetadata::new(format!("External {}", p), vec![]),
                ReferenceType::Other,
            )
        })
        .collect();

    c.bench_function("full_run_20_sections", |b| {
        b.iter(|| {
            Integrator::new(EchoGenerator::new())
                .run(black_box(&article), &local, candidates.clone())
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_segmentation,
    bench_renumbering,
    bench_full_run,
);
criterion_main!(benches);
