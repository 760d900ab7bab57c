//! Benchmarks for lifecycle cascades and recomputation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use forumkit::forum::{
    ForumEngine, MemoryStore, MergeOptions, NewForum, NewReply, NewTopic, NodeId, OpContext,
    UserId,
};
use std::sync::Arc;

fn ctx() -> OpContext {
    OpContext::at(UserId(1), 1_000)
}

/// Builds a forum holding `topics` topics of `replies` replies each.
fn seeded(topics: usize, replies: usize) -> (ForumEngine<MemoryStore>, NodeId, Vec<NodeId>) {
    let engine = ForumEngine::new(Arc::new(MemoryStore::new())).unwrap();
    let forum = engine.new_forum(ctx(), NewForum::new("Bench")).unwrap();
    let ids = (0..topics)
        .map(|i| {
            let topic = engine
                .new_topic(ctx(), NewTopic::new(forum, format!("Topic {}", i), ""))
                .unwrap();
            for _ in 0..replies {
                engine.new_reply(ctx(), NewReply::new(topic, "reply")).unwrap();
            }
            topic
        })
        .collect();
    (engine, forum, ids)
}

fn bench_trash_cascade(c: &mut Criterion) {
    let mut group = c.benchmark_group("trash_cascade");

    for replies in [10usize, 100, 1000] {
        let (engine, _, topics) = seeded(1, replies);
        let topic = topics[0];
        group.throughput(Throughput::Elements(replies as u64));
        group.bench_with_input(BenchmarkId::new("trash_untrash", replies), &topic, |b, &t| {
            b.iter(|| {
                engine.trash(ctx(), black_box(t)).unwrap();
                engine.untrash(ctx(), black_box(t)).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_recount(c: &mut Criterion) {
    let mut group = c.benchmark_group("recount");

    let (engine, forum, topics) = seeded(50, 20);
    group.bench_function("forum_counts_50x20", |b| {
        b.iter(|| engine.recompute_forum_counts(black_box(forum)).unwrap())
    });
    group.bench_function("topic_counts_20", |b| {
        b.iter(|| engine.recompute_topic_counts(black_box(topics[0])).unwrap())
    });
    group.bench_function("recount_all_50x20", |b| b.iter(|| engine.recount_all().unwrap()));

    group.finish();
}

fn bench_hierarchy(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchy");

    group.bench_function("merge_100_into_100", |b| {
        b.iter_with_setup(
            || seeded(2, 100),
            |(engine, _, topics)| {
                engine
                    .merge_topics(ctx(), topics[0], topics[1], MergeOptions::default())
                    .unwrap()
            },
        )
    });

    let (engine, forum, _) = seeded(200, 2);
    group.bench_function("list_topics_first_page", |b| {
        b.iter(|| engine.list_topics(black_box(forum), None, 20).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_trash_cascade, bench_recount, bench_hierarchy);
criterion_main!(benches);
