use gateway_checkout::store::{CartItem, CheckoutStore, MemoryStore, Product, ShippingAddress};
use rust_decimal::Decimal;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Reservation followed by its compensation leaves every product's stock at
/// exactly the pre-step value.
#[tokio::test]
async fn reserve_then_release_is_a_stock_no_op() {
    let store = MemoryStore::new();
    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    let initial = [7i64, 12, 1];

    for (i, id) in ids.iter().enumerate() {
        store.insert_product(Product {
            id: *id,
            name: format!("P{i}"),
            sku: format!("SKU-{i}"),
            price: dec("5.00"),
            stock_quantity: initial[i],
            track_inventory: true,
        });
    }

    let cart_id = store.insert_cart(
        "u1",
        ids.iter()
            .map(|id| CartItem {
                product_id: *id,
                variant_name: None,
                quantity: 1,
            })
            .collect(),
    );

    let summary = store
        .create_order("u1", cart_id, &ShippingAddress::default(), "")
        .await
        .unwrap();

    store.reserve_stock(summary.order_id).await.unwrap();
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(store.product_stock(*id), Some(initial[i] - 1));
    }

    store.release_stock(summary.order_id).await.unwrap();
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(store.product_stock(*id), Some(initial[i]));
    }

    // Compensating twice doesn't over-credit.
    store.release_stock(summary.order_id).await.unwrap();
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(store.product_stock(*id), Some(initial[i]));
    }
}

/// Reservation retries (idempotent step) deduct once.
#[tokio::test]
async fn repeated_reservation_deducts_once() {
    let store = MemoryStore::new();
    let product_id = Uuid::new_v4();
    store.insert_product(Product {
        id: product_id,
        name: "P".into(),
        sku: "SKU".into(),
        price: dec("5.00"),
        stock_quantity: 10,
        track_inventory: true,
    });
    let cart_id = store.insert_cart(
        "u1",
        vec![CartItem {
            product_id,
            variant_name: None,
            quantity: 4,
        }],
    );
    let summary = store
        .create_order("u1", cart_id, &ShippingAddress::default(), "")
        .await
        .unwrap();

    for _ in 0..3 {
        store.reserve_stock(summary.order_id).await.unwrap();
    }
    assert_eq!(store.product_stock(product_id), Some(6));
}
