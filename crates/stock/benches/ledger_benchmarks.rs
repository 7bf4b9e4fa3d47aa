use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use cafekiosk_products::{Product, ProductNumber, ProductSellingStatus, ProductType};
use cafekiosk_stock::{Stock, deduct_all, plan_deductions};

fn catalog(size: usize) -> Vec<Product> {
    (1..=size)
        .map(|i| {
            let product_type = match i % 3 {
                0 => ProductType::Handmade,
                1 => ProductType::Bottle,
                _ => ProductType::Bakery,
            };
            Product::new(
                ProductNumber::new(format!("{i:03}")),
                product_type,
                ProductSellingStatus::Selling,
                format!("menu {i}"),
                1000 + i as u32,
            )
        })
        .collect()
}

fn stocks_for(products: &[Product], quantity: u32) -> Vec<Stock> {
    products
        .iter()
        .filter(|p| p.is_stock_tracked())
        .map(|p| Stock::new(p.product_number().clone(), quantity))
        .collect()
}

/// Requests of growing size, each product ordered twice.
fn bench_deduction_by_request_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_ledger_deduct");

    for distinct in [4usize, 32, 256] {
        let products = catalog(distinct);
        let request: Vec<Product> = products.iter().chain(products.iter()).cloned().collect();
        let stocks = stocks_for(&products, 10);

        group.throughput(Throughput::Elements(request.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("deduct_all", request.len()),
            &request,
            |b, request| {
                b.iter(|| {
                    let updated = deduct_all(black_box(request), stocks.clone());
                    black_box(updated)
                });
            },
        );
    }

    group.finish();
}

/// Validation that fails on every stock-tracked product.
fn bench_shortage_reporting(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_ledger_shortages");

    for distinct in [4usize, 32, 256] {
        let products = catalog(distinct);
        let stocks = stocks_for(&products, 0);

        group.bench_with_input(
            BenchmarkId::new("plan_deductions", distinct),
            &products,
            |b, products| {
                b.iter(|| {
                    let err = plan_deductions(black_box(products), stocks.clone());
                    black_box(err)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_deduction_by_request_size,
    bench_shortage_reporting
);
criterion_main!(benches);
