//! Benchmarks for maintain-btrfs
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use maintain_btrfs::walker::TraversalStack;

fn benchmark_stack_cycles(c: &mut Criterion) {
    c.bench_function("stack_push_pop_depth_64", |b| {
        let mut stack = TraversalStack::new();

        b.iter(|| {
            for i in 0..64u64 {
                stack.push(black_box(i)).unwrap();
            }
            while let Some(node) = stack.pop() {
                black_box(node);
            }
        })
    });
}

fn benchmark_stack_loop_scan(c: &mut Criterion) {
    c.bench_function("stack_top_down_scan_depth_256", |b| {
        let mut stack = TraversalStack::new();
        for i in 0..256u64 {
            stack.push((i, i * 7)).unwrap();
        }

        b.iter(|| {
            // Worst case for loop detection: no match
            let found = stack
                .iter_top_down()
                .any(|&(dev, inode)| dev == black_box(u64::MAX) && inode == 0);
            black_box(found);
        })
    });
}

criterion_group!(benches, benchmark_stack_cycles, benchmark_stack_loop_scan);
criterion_main!(benches);
