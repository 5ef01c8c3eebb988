//! Order placement against the in-memory store

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{MAX_AMOUNT, NewProduct, NewUser, OrderLine, ProductChanges, Role};
use shared::request::PageQuery;
use shop_server::db::{MemoryStore, Store};
use shop_server::orders::OrderEngine;

struct Fixture {
    store: Arc<dyn Store>,
    engine: OrderEngine,
    alice: i64,
    bob: i64,
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn line(product_id: i64, quantity: i32) -> OrderLine {
    OrderLine {
        product_id,
        quantity,
    }
}

async fn fixture() -> Fixture {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let mut tx = store.begin().await.unwrap();
    let mut users = Vec::new();
    for (name, email) in [("Alice", "alice@example.com"), ("Bob", "bob@example.com")] {
        let user = tx
            .insert_user(NewUser {
                name: name.into(),
                email: email.into(),
                password_hash: "unused".into(),
                photo: None,
                role: Role::Customer,
            })
            .await
            .unwrap();
        users.push(user.id);
    }
    tx.commit().await.unwrap();

    Fixture {
        engine: OrderEngine::new(store.clone()),
        store,
        alice: users[0],
        bob: users[1],
    }
}

async fn add_product(store: &Arc<dyn Store>, name: &str, price: &str, stock: i32) -> i64 {
    let mut tx = store.begin().await.unwrap();
    let id = tx
        .insert_product(NewProduct {
            name: name.into(),
            description: None,
            price: dec(price),
            stock,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
    id
}

async fn stock_of(store: &Arc<dyn Store>, id: i64) -> i32 {
    let mut tx = store.begin().await.unwrap();
    tx.find_product(id).await.unwrap().unwrap().stock
}

#[tokio::test]
async fn total_is_sum_of_captured_prices() {
    let f = fixture().await;
    let mug = add_product(&f.store, "Mug", "12.50", 10).await;
    let cap = add_product(&f.store, "Cap", "8.99", 5).await;

    let order = f
        .engine
        .place_order(f.alice, &[line(mug, 2), line(cap, 3)])
        .await
        .unwrap();

    assert_eq!(order.total_amount, dec("51.97"));
    assert_eq!(order.user_id, f.alice);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].price, dec("12.50"));
    assert_eq!(order.items[0].product_name.as_deref(), Some("Mug"));
    assert_eq!(order.items[1].quantity, 3);
    assert_eq!(stock_of(&f.store, mug).await, 8);
    assert_eq!(stock_of(&f.store, cap).await, 2);
}

#[tokio::test]
async fn insufficient_stock_changes_nothing() {
    let f = fixture().await;
    let mug = add_product(&f.store, "Mug", "10", 2).await;

    let err: AppError = f
        .engine
        .place_order(f.alice, &[line(mug, 3)])
        .await
        .unwrap_err()
        .into();

    assert_eq!(err.code, ErrorCode::InsufficientStock);
    assert_eq!(
        err.message,
        "Insufficient stock for product Mug. Available: 2, Requested: 3"
    );
    let details = err.details.unwrap();
    assert_eq!(details["available"], 2);
    assert_eq!(details["requested"], 3);

    assert_eq!(stock_of(&f.store, mug).await, 2);
    let history = f.engine.history(f.alice, PageQuery::default()).await.unwrap();
    assert_eq!(history.paging.total_data, 0);
}

#[tokio::test]
async fn later_failing_line_rolls_back_earlier_lines() {
    let f = fixture().await;
    let mug = add_product(&f.store, "Mug", "10", 5).await;

    let err: AppError = f
        .engine
        .place_order(f.alice, &[line(mug, 2), line(9_999, 1)])
        .await
        .unwrap_err()
        .into();

    assert_eq!(err.code, ErrorCode::ProductNotFound);
    assert_eq!(err.message, "Product with ID 9999 not found");
    assert_eq!(stock_of(&f.store, mug).await, 5);
}

#[tokio::test]
async fn repeated_product_lines_decrement_cumulatively() {
    let f = fixture().await;
    let mug = add_product(&f.store, "Mug", "3", 5).await;

    f.engine
        .place_order(f.alice, &[line(mug, 2), line(mug, 2)])
        .await
        .unwrap();
    assert_eq!(stock_of(&f.store, mug).await, 1);

    let err: AppError = f
        .engine
        .place_order(f.alice, &[line(mug, 1), line(mug, 1)])
        .await
        .unwrap_err()
        .into();
    assert_eq!(err.code, ErrorCode::InsufficientStock);
    assert_eq!(stock_of(&f.store, mug).await, 1);
}

#[tokio::test]
async fn empty_and_invalid_lines_are_rejected() {
    let f = fixture().await;
    let mug = add_product(&f.store, "Mug", "3", 5).await;

    let err: AppError = f.engine.place_order(f.alice, &[]).await.unwrap_err().into();
    assert_eq!(err.code, ErrorCode::OrderEmpty);

    let err: AppError = f
        .engine
        .place_order(f.alice, &[line(mug, 0)])
        .await
        .unwrap_err()
        .into();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert_eq!(stock_of(&f.store, mug).await, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_never_oversell() {
    let f = fixture().await;
    let mug = add_product(&f.store, "Mug", "10", 5).await;
    let engine = Arc::new(f.engine);

    let a = {
        let engine = engine.clone();
        let user = f.alice;
        tokio::spawn(async move { engine.place_order(user, &[line(mug, 3)]).await })
    };
    let b = {
        let engine = engine.clone();
        let user = f.bob;
        tokio::spawn(async move { engine.place_order(user, &[line(mug, 4)]).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let failure = results.into_iter().find_map(Result::err).unwrap();
    assert_eq!(failure.code(), Some(ErrorCode::InsufficientStock));

    let stock = stock_of(&f.store, mug).await;
    assert!(stock == 2 || stock == 1, "unexpected stock {stock}");
}

#[tokio::test]
async fn largest_price_at_largest_stock_is_rejected() {
    let f = fixture().await;
    let vault = add_product(&f.store, "Vault", "9999999999.99", i32::MAX).await;

    let err: AppError = f
        .engine
        .place_order(f.alice, &[line(vault, i32::MAX)])
        .await
        .unwrap_err()
        .into();
    assert_eq!(err.code, ErrorCode::OrderTotalTooLarge);
    assert_eq!(stock_of(&f.store, vault).await, i32::MAX);

    let order = f.engine.place_order(f.alice, &[line(vault, 1)]).await.unwrap();
    assert_eq!(order.total_amount, MAX_AMOUNT);
    assert_eq!(stock_of(&f.store, vault).await, i32::MAX - 1);
}

#[tokio::test]
async fn overflowing_line_total_is_an_error() {
    let f = fixture().await;
    let huge = add_product(&f.store, "Huge", "79228162514264337593543950335", 5).await;
    let mug = add_product(&f.store, "Mug", "10", 5).await;

    let err: AppError = f
        .engine
        .place_order(f.alice, &[line(mug, 1), line(huge, 2)])
        .await
        .unwrap_err()
        .into();
    assert_eq!(err.code, ErrorCode::OrderTotalTooLarge);
    assert_eq!(stock_of(&f.store, huge).await, 5);
    assert_eq!(stock_of(&f.store, mug).await, 5);
}

#[tokio::test]
async fn orders_are_private_to_their_owner() {
    let f = fixture().await;
    let mug = add_product(&f.store, "Mug", "10", 5).await;
    let order = f.engine.place_order(f.alice, &[line(mug, 1)]).await.unwrap();

    let mine = f.engine.find_by_id(order.id, f.alice).await.unwrap();
    assert_eq!(mine.id, order.id);

    let err: AppError = f.engine.find_by_id(order.id, f.bob).await.unwrap_err().into();
    assert_eq!(err.code, ErrorCode::OrderNotFound);
    assert_eq!(err.message, format!("Order with ID {} not found", order.id));
}

#[tokio::test]
async fn item_prices_survive_later_price_changes() {
    let f = fixture().await;
    let mug = add_product(&f.store, "Mug", "10", 5).await;
    let order = f.engine.place_order(f.alice, &[line(mug, 1)]).await.unwrap();

    let mut tx = f.store.begin().await.unwrap();
    tx.update_product(
        mug,
        ProductChanges {
            price: Some(dec("99")),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let reloaded = f.engine.find_by_id(order.id, f.alice).await.unwrap();
    assert_eq!(reloaded.items[0].price, dec("10"));
    assert_eq!(reloaded.total_amount, dec("10"));
}

#[tokio::test]
async fn history_is_newest_first_and_paged() {
    let f = fixture().await;
    let mug = add_product(&f.store, "Mug", "1", 50).await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(f.engine.place_order(f.alice, &[line(mug, 1)]).await.unwrap().id);
    }
    f.engine.place_order(f.bob, &[line(mug, 1)]).await.unwrap();

    let page = f.engine.history(f.alice, PageQuery::new(1, 2)).await.unwrap();
    assert_eq!(page.paging.total_data, 3);
    assert_eq!(page.paging.total_page, 2);
    let got: Vec<i64> = page.items.iter().map(|o| o.id).collect();
    assert_eq!(got, vec![ids[2], ids[1]]);

    let page = f.engine.history(f.alice, PageQuery::new(2, 2)).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, ids[0]);
}
