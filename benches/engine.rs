// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Benchmarks for the reconciliation engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Folding ledgers of growing length into a history
//! - Reserving and charging across many chains
//! - Concurrent reconciliation through the in-memory store

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use payment_ledger::{
    CapabilityRequest, CapabilityResponse, CapabilityResult, CancelCapability, ChargeCapability,
    CreditCapability, InMemoryLedgerStore, ModifyCapability, Money, OrderContext, OrderRef,
    PaymentEngine, PaymentEvent, PaymentHistory, PaymentInstrument, PaymentProvider,
    ProviderRegistry, ReserveCapability, ReserveRequest, ChargeRequest, CreditRequest,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread;

// =============================================================================
// Helper Functions
// =============================================================================

/// Provider that approves everything.
#[derive(Clone, Copy)]
struct Approve;

impl Approve {
    fn reply(self) -> CapabilityResult {
        Ok(CapabilityResponse::default())
    }
}

impl ReserveCapability for Approve {
    fn reserve(&self, _request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.reply()
    }
}

impl ModifyCapability for Approve {
    fn modify(&self, _request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.reply()
    }
}

impl CancelCapability for Approve {
    fn cancel(&self, _request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.reply()
    }
}

impl ChargeCapability for Approve {
    fn charge(&self, _request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.reply()
    }
}

impl CreditCapability for Approve {
    fn credit(&self, _request: &CapabilityRequest<'_>) -> CapabilityResult {
        self.reply()
    }
}

fn make_engine() -> PaymentEngine {
    let registry = ProviderRegistry::new();
    registry.register(
        "approve",
        PaymentProvider::new("approve")
            .with_reserve(Approve)
            .with_modify(Approve)
            .with_cancel(Approve)
            .with_charge(Approve)
            .with_credit(Approve),
    );
    PaymentEngine::new(Arc::new(registry))
}

fn usd(amount: i64) -> Money {
    Money::new(Decimal::new(amount, 2), "USD")
}

fn make_order() -> OrderContext {
    OrderContext::new("bench", usd(100_000_000))
}

fn card() -> PaymentInstrument {
    PaymentInstrument::unlimited("card", "approve")
}

fn gift_cards(count: usize) -> Vec<PaymentInstrument> {
    (0..count)
        .map(|i| PaymentInstrument::limited(format!("gc-{i}").as_str(), "approve", usd(500)))
        .collect()
}

/// Ledger of `chains` card reservations of 10.00 each.
fn make_ledger(engine: &PaymentEngine, chains: usize) -> Vec<PaymentEvent> {
    let mut ledger = Vec::new();
    for _ in 0..chains {
        let response = engine
            .reserve(&ReserveRequest {
                order: make_order(),
                ledger: ledger.clone(),
                instruments: vec![card()],
                amount: usd(1_000),
            })
            .unwrap();
        ledger.extend(response.events);
    }
    ledger
}

// =============================================================================
// History Benchmarks
// =============================================================================

fn bench_history_fold(c: &mut Criterion) {
    let engine = make_engine();
    let mut group = c.benchmark_group("history_fold");

    for chains in [10usize, 100, 1_000].iter() {
        let ledger = make_ledger(&engine, *chains);
        group.throughput(Throughput::Elements(ledger.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chains), &ledger, |b, ledger| {
            b.iter(|| PaymentHistory::build(black_box(ledger), "USD").unwrap())
        });
    }
    group.finish();
}

// =============================================================================
// Processor Benchmarks
// =============================================================================

fn bench_reserve_split(c: &mut Criterion) {
    let engine = make_engine();
    let mut group = c.benchmark_group("reserve_split");

    for cards in [1usize, 10, 50].iter() {
        let mut instruments = gift_cards(*cards);
        instruments.push(card());
        let request = ReserveRequest {
            order: make_order(),
            ledger: Vec::new(),
            instruments,
            amount: usd(100_000),
        };
        group.bench_with_input(BenchmarkId::from_parameter(cards), &request, |b, request| {
            b.iter(|| engine.reserve(black_box(request)).unwrap())
        });
    }
    group.finish();
}

fn bench_charge_across_chains(c: &mut Criterion) {
    let engine = make_engine();
    let mut group = c.benchmark_group("charge_across_chains");

    for chains in [10usize, 100].iter() {
        let ledger = make_ledger(&engine, *chains);
        let request = ChargeRequest {
            order: make_order(),
            ledger,
            instruments: vec![card()],
            total_chargeable: usd(1_000 * *chains as i64),
            final_payment: true,
        };
        group.throughput(Throughput::Elements(*chains as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chains), &request, |b, request| {
            b.iter(|| engine.charge(black_box(request)).unwrap())
        });
    }
    group.finish();
}

fn bench_credit_across_charges(c: &mut Criterion) {
    let engine = make_engine();
    let ledger = make_ledger(&engine, 100);
    let charged = engine
        .charge(&ChargeRequest {
            order: make_order(),
            ledger: ledger.clone(),
            instruments: vec![card()],
            total_chargeable: usd(100_000),
            final_payment: true,
        })
        .unwrap();
    let request = CreditRequest {
        order: make_order(),
        ledger: ledger.into_iter().chain(charged.events).collect(),
        amount: usd(50_000),
    };

    c.bench_function("credit_across_charges", |b| {
        b.iter(|| engine.credit(black_box(&request)).unwrap())
    });
}

// =============================================================================
// Store Benchmarks
// =============================================================================

fn bench_parallel_orders(c: &mut Criterion) {
    let engine = make_engine();
    let mut group = c.benchmark_group("parallel_orders");

    for threads in [1usize, 4, 8].iter() {
        group.throughput(Throughput::Elements((*threads * 50) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), threads, |b, &threads| {
            b.iter(|| {
                let store = Arc::new(InMemoryLedgerStore::new());
                let handles: Vec<_> = (0..threads)
                    .map(|n| {
                        let store = store.clone();
                        let engine = engine.clone();
                        thread::spawn(move || {
                            let order_ref = OrderRef::from(format!("order-{n}"));
                            for _ in 0..50 {
                                store
                                    .reconcile(&order_ref, |ledger| {
                                        engine.reserve(&ReserveRequest {
                                            order: make_order(),
                                            ledger,
                                            instruments: vec![card()],
                                            amount: usd(100),
                                        })
                                    })
                                    .unwrap();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
                black_box(store.len())
            })
        });
    }
    group.finish();
}

fn bench_contended_order(c: &mut Criterion) {
    let engine = make_engine();

    c.bench_function("contended_order", |b| {
        b.iter(|| {
            let store = Arc::new(InMemoryLedgerStore::new());
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let store = store.clone();
                    let engine = engine.clone();
                    thread::spawn(move || {
                        let order_ref = OrderRef::from("shared");
                        for _ in 0..25 {
                            store
                                .reconcile(&order_ref, |ledger| {
                                    engine.reserve(&ReserveRequest {
                                        order: make_order(),
                                        ledger,
                                        instruments: vec![card()],
                                        amount: usd(100),
                                    })
                                })
                                .unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            black_box(store.len())
        })
    });
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(history, bench_history_fold);

criterion_group!(
    processors,
    bench_reserve_split,
    bench_charge_across_chains,
    bench_credit_across_charges,
);

criterion_group!(store, bench_parallel_orders, bench_contended_order);

criterion_main!(history, processors, store);
