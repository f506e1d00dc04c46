use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hotel_listing_view::{compute_visible, CityFilter, Hotel, Selection, SortOrder};
use rand::{seq::SliceRandom, thread_rng, Rng};

const CITIES: [&str; 5] = ["NYC", "LA", "Chicago", "Paris", "Rome"];
const NAMES: [&str; 6] = ["Grand", "Budget", "Harbor", "Sunset", "Plaza", "Inn"];

fn random_catalog(size: usize) -> Vec<Hotel> {
    let mut rng = thread_rng();
    (0..size)
        .map(|i| {
            let city = CITIES.choose(&mut rng).copied().unwrap_or("NYC");
            let name = format!(
                "{} {}",
                NAMES.choose(&mut rng).copied().unwrap_or("Grand"),
                i
            );
            // Coarse prices so sorting has plenty of ties
            let price = f64::from(rng.gen_range(1..40_u32)) * 10.0;
            Hotel::new(i as i64, &name, city, price, rng.gen_range(0..5))
        })
        .collect()
}

pub fn reconcile_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_visible");

    let selections = [
        ("unfiltered", Selection::default()),
        (
            "city_available_sorted",
            Selection {
                city_filter: CityFilter::City("Paris".to_string()),
                availability_only: true,
                search_text: String::new(),
                sort_order: SortOrder::LowToHigh,
            },
        ),
        (
            "search_sorted_desc",
            Selection {
                search_text: "PLAZA".to_string(),
                sort_order: SortOrder::HighToLow,
                ..Selection::default()
            },
        ),
    ];

    for size in [100_usize, 1_000, 10_000].iter() {
        let catalog = random_catalog(*size);
        for (label, selection) in &selections {
            group.bench_with_input(
                BenchmarkId::new(*label, size),
                &catalog,
                |b, catalog| b.iter(|| black_box(compute_visible(catalog, selection))),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, reconcile_benchmark);
criterion_main!(benches);
