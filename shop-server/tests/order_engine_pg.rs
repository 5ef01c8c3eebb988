//! Order placement against PostgreSQL
//!
//! Needs a reachable database: `DATABASE_URL=... cargo test -- --ignored`

use std::sync::Arc;

use shared::error::ErrorCode;
use shared::models::{NewProduct, NewUser, OrderLine, Role};
use shop_server::db::{PgStore, Store};
use shop_server::orders::OrderEngine;

async fn connect() -> Option<Arc<dyn Store>> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let store = PgStore::connect(&url, 4).await.unwrap();
    Some(Arc::new(store))
}

async fn add_customer(store: &Arc<dyn Store>) -> i64 {
    let mut tx = store.begin().await.unwrap();
    let user = tx
        .insert_user(NewUser {
            name: "Concurrent".into(),
            email: format!("{}@example.com", uuid::Uuid::new_v4()),
            password_hash: "unused".into(),
            photo: None,
            role: Role::Customer,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();
    user.id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn row_locks_prevent_oversell() {
    let Some(store) = connect().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let alice = add_customer(&store).await;
    let bob = add_customer(&store).await;

    let mut tx = store.begin().await.unwrap();
    let mug = tx
        .insert_product(NewProduct {
            name: format!("Mug {}", uuid::Uuid::new_v4()),
            description: None,
            price: "10".parse().unwrap(),
            stock: 5,
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let engine = Arc::new(OrderEngine::new(store.clone()));
    let place = move |user: i64, quantity: i32| {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .place_order(
                    user,
                    &[OrderLine {
                        product_id: mug,
                        quantity,
                    }],
                )
                .await
        })
    };
    let a = place(alice, 3);
    let b = place(bob, 4);

    let results = [a.await.unwrap(), b.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let failure = results.into_iter().find_map(Result::err).unwrap();
    assert_eq!(failure.code(), Some(ErrorCode::InsufficientStock));

    let mut tx = store.begin().await.unwrap();
    let stock = tx.find_product(mug).await.unwrap().unwrap().stock;
    assert!(stock == 2 || stock == 1, "unexpected stock {stock}");
}
