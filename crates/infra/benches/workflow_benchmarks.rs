use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use gestor_auth::{roles, Principal, RolePolicy};
use gestor_core::{AggregateId, Code, ExpectedVersion, UserId};
use gestor_events::{EventBus, EventEnvelope, InMemoryEventBus};
use gestor_infra::projections::{NoticeEnvelope, NotificationsProjection, WorkflowNotice};
use gestor_infra::read_model::InMemoryKeyValueStore;
use gestor_infra::services::{
    NewArticle, NewRequisition, NewRequisitionLine, RequisitionService, ServiceContext,
    StockOperation, WarehouseService,
};
use gestor_infra::{InMemoryStore, Tables, WorkflowConfig};
use gestor_requisitions::{LineDecision, RequisitionItem, RequisitionKind};
use gestor_warehouse::{ArticleId, Operation, WarehouseId};

type Bus = InMemoryEventBus<NoticeEnvelope>;

struct Bench {
    ctx: Arc<ServiceContext<Bus>>,
    requester: Principal,
    approver: Principal,
    keeper: Principal,
    warehouse_id: WarehouseId,
    article_id: ArticleId,
}

fn setup() -> Bench {
    let ctx = ServiceContext::new(
        InMemoryStore::with_tables(Tables::seeded()),
        InMemoryEventBus::new(),
        WorkflowConfig::default(),
    );
    let policy = RolePolicy::institutional();
    let admin = Principal::new(UserId::new(), "admin").with_roles([roles::ADMIN], &policy);
    let requester =
        Principal::new(UserId::new(), "solicitante").with_roles([roles::REQUESTER], &policy);
    let approver = Principal::new(UserId::new(), "aprobador").with_roles([roles::APPROVER], &policy);
    let keeper =
        Principal::new(UserId::new(), "bodeguero").with_roles([roles::WAREHOUSE_KEEPER], &policy);

    let warehouse = WarehouseService::new(ctx.clone());
    let warehouse_id = warehouse.create_warehouse("CENTRAL", "Bodega central", &admin).unwrap();
    let article_id = warehouse
        .create_article(
            NewArticle {
                sku: "RESMA".into(),
                name: "Resma carta".into(),
                warehouse_id,
                category_id: None,
                unit: "UN".into(),
                stock_min: dec!(0),
                stock_max: None,
                reorder_point: None,
            },
            &admin,
        )
        .unwrap();
    warehouse
        .move_stock(
            article_id,
            StockOperation {
                operation: Operation::Entry,
                movement_type: "AJUSTE".into(),
                quantity: dec!(1000000000),
                reason: "saldo inicial".into(),
                reference: None,
            },
            ExpectedVersion::Any,
            &admin,
        )
        .unwrap();

    Bench {
        ctx,
        requester,
        approver,
        keeper,
        warehouse_id,
        article_id,
    }
}

/// create → add line → approve → dispatch, four transactions.
fn run_lifecycle(bench: &Bench, service: &RequisitionService<Bus>) {
    let id = service
        .create(
            NewRequisition {
                number: None,
                kind: RequisitionKind::Article,
                required_by: Utc::now().date_naive() + Duration::days(1),
                reason: "bench".into(),
                requester_area: "Bodega".into(),
                activity_title: None,
                origin_warehouse: Some(bench.warehouse_id),
            },
            &bench.requester,
        )
        .unwrap();
    let line_id = service
        .add_line(
            id,
            NewRequisitionLine {
                item: RequisitionItem::Article(bench.article_id),
                quantity: dec!(2),
                notes: None,
            },
            ExpectedVersion::Exact(1),
            &bench.requester,
        )
        .unwrap();
    let decisions = vec![LineDecision {
        line_id,
        quantity: dec!(2),
    }];
    service
        .approve(id, decisions.clone(), None, ExpectedVersion::Exact(2), &bench.approver)
        .unwrap();
    service
        .dispatch(id, decisions, None, ExpectedVersion::Exact(4), &bench.keeper)
        .unwrap();
}

fn bench_requisition_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("requisition_lifecycle");
    group.sample_size(200);

    group.bench_function("create_approve_dispatch", |b| {
        let bench = setup();
        let service = RequisitionService::new(bench.ctx.clone());
        b.iter(|| run_lifecycle(black_box(&bench), &service));
    });

    group.finish();
}

fn bench_transaction_cost_by_store_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("transaction_cost_by_store_size");
    group.sample_size(50);

    for existing in [10usize, 100, 1000] {
        let bench = setup();
        let service = RequisitionService::new(bench.ctx.clone());
        for _ in 0..existing {
            run_lifecycle(&bench, &service);
        }

        group.bench_with_input(BenchmarkId::from_parameter(existing), &existing, |b, _| {
            b.iter(|| run_lifecycle(&bench, &service));
        });
    }

    group.finish();
}

fn notice(header_id: AggregateId, requester: UserId, seq: u64) -> NoticeEnvelope {
    let occurred_at = Utc::now();
    EventEnvelope::new(
        header_id,
        "solicitudes",
        seq,
        occurred_at,
        WorkflowNotice {
            module: "solicitudes".into(),
            header_id,
            number: format!("SOL-{seq:08}"),
            requester,
            actor: UserId::new(),
            previous: Some(Code::from_static("PENDIENTE")),
            status: Code::from_static("APROBADA"),
            status_name: "Aprobada".into(),
            note: None,
            occurred_at,
        },
    )
}

fn bench_notification_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("notification_rebuild");

    for count in [100usize, 1000, 10000] {
        let requester = UserId::new();
        let envelopes: Vec<NoticeEnvelope> = (0..count)
            .map(|i| notice(AggregateId::new(), requester, (i as u64 % 3) + 1))
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &envelopes, |b, envelopes| {
            b.iter(|| {
                let projection = NotificationsProjection::new(InMemoryKeyValueStore::new());
                projection.rebuild_from_scratch(envelopes.clone()).unwrap();
                black_box(projection.unread_count(requester))
            });
        });
    }

    group.finish();
}

fn bench_publish_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_fan_out");
    group.throughput(Throughput::Elements(1));

    for subscribers in [1usize, 4, 16] {
        let bus: Bus = InMemoryEventBus::new();
        let subscriptions: Vec<_> = (0..subscribers).map(|_| bus.subscribe()).collect();
        let envelope = notice(AggregateId::new(), UserId::new(), 1);

        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &envelope,
            |b, envelope| {
                b.iter(|| {
                    bus.publish(envelope.clone()).unwrap();
                    for sub in &subscriptions {
                        black_box(sub.drain());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_requisition_lifecycle,
    bench_transaction_cost_by_store_size,
    bench_notification_rebuild,
    bench_publish_fan_out
);
criterion_main!(benches);
