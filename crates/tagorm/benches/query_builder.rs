use chrono::Utc;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tagorm::builder::renumber;
use tagorm::{Entity, NullInt64, NullString, NullTime, args, build};

#[derive(Debug, Clone, Default, Entity)]
#[orm(table = "ref_game")]
struct Game {
    #[tag(sql = "game_id")]
    id: i64,
    #[tag(sql = "game_code")]
    code: String,
    #[tag(sql = "game_title")]
    title: String,
    #[tag(sql = "game_description")]
    description: NullString,
    #[tag(sql = "enabled")]
    enabled: bool,
    #[tag(sql = "rate")]
    rate: NullInt64,
    #[tag(sql = "release")]
    release: NullTime,
}

fn game(id: i64) -> Game {
    Game {
        id,
        code: format!("code-{id}"),
        title: "DOTA2".into(),
        description: NullString::from("Froze"),
        enabled: true,
        rate: NullInt64::new(75),
        release: NullTime::new(Utc::now()),
    }
}

fn bench_select(c: &mut Criterion) {
    let example = game(507);
    c.bench_function("query_builder/select_by_example", |b| {
        b.iter(|| {
            black_box(
                build()
                    .from(black_box(&example), "g")
                    .or(&Game { title: "Chess".into(), ..Default::default() }, "g")
                    .where_raw("g.rate > ?", args![10])
                    .to_sql(),
            )
        });
    });
}

fn bench_update(c: &mut Criterion) {
    let example = game(507);
    c.bench_function("query_builder/updates", |b| {
        b.iter(|| {
            black_box(
                build()
                    .updates(black_box(&example))
                    .where_raw("game_id = ?", args![507])
                    .to_sql(),
            )
        });
    });
}

fn bench_inserts(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/inserts");

    for n in [1, 10, 100, 500] {
        let rows: Vec<Game> = (0..n).map(game).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &rows, |b, rows| {
            b.iter(|| black_box(build().inserts(rows).to_sql()));
        });
    }

    group.finish();
}

fn bench_renumber(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_builder/renumber");

    for n in [1, 10, 100] {
        let fragment = vec!["col = ?"; n].join(" AND ");
        group.bench_with_input(BenchmarkId::from_parameter(n), &fragment, |b, fragment| {
            b.iter(|| black_box(renumber(fragment, 1)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_select, bench_update, bench_inserts, bench_renumber);
criterion_main!(benches);
