//! End-to-end checkout flow tests against a real PostgreSQL database.
//!
//! These tests need `DATABASE_URL` pointing at a disposable database; when
//! it is unset they skip themselves. Every test seeds its own catalog rows
//! with random ids so the suite can run concurrently and repeatedly.

use std::collections::{BTreeMap, HashMap};

use sqlx::PgPool;

use shared::order::OrderStatus;
use store_server::db::models::Order;
use store_server::inventory::InventoryError;
use store_server::notify::Notifier;
use store_server::orders::{
    OrderError, OrderItemInput, OrderService, PaymentError, PaymentOutcome, PlaceOrder,
};
use store_server::payment::VnpayGateway;

async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let pool = PgPool::connect(&url).await.expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

fn service(pool: &PgPool) -> OrderService {
    OrderService::new(pool.clone(), Notifier::new(None))
}

fn gateway() -> VnpayGateway {
    VnpayGateway::new(
        "TESTTMN1".into(),
        "integration-test-hash-secret".into(),
        "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
        "http://localhost:8080/api/payment/vnpay-return".into(),
    )
}

async fn seed_watch(pool: &PgPool, price: i64, stock: i32) -> i64 {
    let id = i64::from(rand::random::<u32>()) + 1_000_000;
    sqlx::query("INSERT INTO watches (id, name, price) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("Test Watch {id}"))
        .bind(price)
        .execute(pool)
        .await
        .expect("seed watch");
    sqlx::query("INSERT INTO inventory (watch_id, stock_quantity) VALUES ($1, $2)")
        .bind(id)
        .bind(stock)
        .execute(pool)
        .await
        .expect("seed inventory");
    id
}

async fn seed_coupon(
    pool: &PgPool,
    discount_type: &str,
    discount_value: i64,
    max_usage_count: Option<i32>,
    max_usage_per_user: Option<i32>,
) -> String {
    let code = format!("TEST{}", rand::random::<u32>());
    let now = chrono::Utc::now().timestamp_millis();
    sqlx::query(
        "INSERT INTO coupons (code, discount_type, discount_value, start_date, end_date,
                              is_active, max_usage_count, max_usage_per_user)
         VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7)",
    )
    .bind(&code)
    .bind(discount_type)
    .bind(discount_value)
    .bind(now - 60_000)
    .bind(now + 86_400_000)
    .bind(max_usage_count)
    .bind(max_usage_per_user)
    .execute(pool)
    .await
    .expect("seed coupon");
    code
}

fn cart(items: &[(i64, i32)], coupon_code: Option<String>) -> PlaceOrder {
    PlaceOrder {
        shipping_address: "12 Hang Bai, Hoan Kiem, Ha Noi".into(),
        phone_number: "0912345678".into(),
        notes: None,
        coupon_code,
        items: items
            .iter()
            .map(|&(watch_id, quantity)| OrderItemInput { watch_id, quantity })
            .collect(),
    }
}

fn request(watch_id: i64, quantity: i32, coupon_code: Option<String>) -> PlaceOrder {
    cart(&[(watch_id, quantity)], coupon_code)
}

fn user() -> String {
    format!("user-{}", uuid::Uuid::new_v4())
}

async fn stock_of(pool: &PgPool, watch_id: i64) -> i32 {
    let (stock,): (i32,) =
        sqlx::query_as("SELECT stock_quantity FROM inventory WHERE watch_id = $1")
            .bind(watch_id)
            .fetch_one(pool)
            .await
            .expect("read stock");
    stock
}

async fn usage_count_of(pool: &PgPool, code: &str) -> i32 {
    let (count,): (i32,) = sqlx::query_as("SELECT usage_count FROM coupons WHERE code = $1")
        .bind(code)
        .fetch_one(pool)
        .await
        .expect("read usage count");
    count
}

async fn usage_rows_of(pool: &PgPool, code: &str, user_id: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM coupon_usages WHERE coupon_code = $1 AND user_id = $2",
    )
    .bind(code)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("count usage rows");
    count
}

fn signed_callback(gw: &VnpayGateway, order: &Order, response_code: &str) -> HashMap<String, String> {
    let mut params: BTreeMap<String, String> = BTreeMap::new();
    params.insert("vnp_TxnRef".into(), order.id.clone());
    params.insert("vnp_Amount".into(), (order.total_amount * 100).to_string());
    params.insert("vnp_ResponseCode".into(), response_code.into());
    params.insert("vnp_TransactionNo".into(), "14226112".into());
    params.insert("vnp_BankCode".into(), "NCB".into());
    let hash = gw.sign_params(&params);
    let mut map: HashMap<String, String> = params.into_iter().collect();
    map.insert("vnp_SecureHash".into(), hash);
    map
}

#[tokio::test]
async fn placement_snapshots_price_and_computes_totals() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);

    let watch_id = seed_watch(&pool, 2_000_000, 10).await;
    let coupon = seed_coupon(&pool, "FIXED", 100_000, None, None).await;

    let (order, items) = svc
        .place_order(&user(), &request(watch_id, 2, Some(coupon.clone())))
        .await
        .expect("place order");

    assert_eq!(order.parsed_status(), Some(OrderStatus::Pending));
    assert_eq!(order.discount_amount, 100_000);
    assert_eq!(order.total_amount, 3_900_000);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].unit_price, 2_000_000);
    assert_eq!(stock_of(&pool, watch_id).await, 8);
    assert_eq!(usage_count_of(&pool, &coupon).await, 1);

    // A later catalog price change must not leak into the placed order.
    sqlx::query("UPDATE watches SET price = 9999999 WHERE id = $1")
        .bind(watch_id)
        .execute(&pool)
        .await
        .expect("reprice watch");
    let (reread, reread_items) = svc
        .get_order(&order.user_id, &order.id)
        .await
        .expect("re-read order");
    assert_eq!(reread.total_amount, 3_900_000);
    assert_eq!(reread_items[0].unit_price, 2_000_000);
}

#[tokio::test]
async fn multi_item_order_decrements_every_line() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);

    let first = seed_watch(&pool, 100_000, 5).await;
    let second = seed_watch(&pool, 50_000, 4).await;
    let coupon = seed_coupon(&pool, "FIXED", 20_000, None, None).await;

    let owner = user();
    let (order, items) = svc
        .place_order(&owner, &cart(&[(first, 2), (second, 1)], Some(coupon.clone())))
        .await
        .expect("place order");

    // 2 x 100_000 + 1 x 50_000 - 20_000
    assert_eq!(order.discount_amount, 20_000);
    assert_eq!(order.total_amount, 230_000);
    assert_eq!(items.len(), 2);
    assert_eq!(stock_of(&pool, first).await, 3);
    assert_eq!(stock_of(&pool, second).await, 3);
    assert_eq!(usage_rows_of(&pool, &coupon, &owner).await, 1);
}

#[tokio::test]
async fn partial_shortage_leaves_all_stock_untouched() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);

    let rich = seed_watch(&pool, 100_000, 10).await;
    let short = seed_watch(&pool, 50_000, 1).await;

    // The first line would reserve fine; the second cannot. Nothing may stick.
    let err = svc
        .place_order(&user(), &cart(&[(rich, 2), (short, 5)], None))
        .await
        .expect_err("shortage must fail the whole order");
    assert!(matches!(
        err,
        OrderError::Inventory(InventoryError::InsufficientStock(id)) if id == short
    ));

    assert_eq!(stock_of(&pool, rich).await, 10);
    assert_eq!(stock_of(&pool, short).await, 1);
}

#[tokio::test]
async fn concurrent_placement_never_oversells() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);

    let watch_id = seed_watch(&pool, 500_000, 5).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.place_order(&user(), &request(watch_id, 1, None)).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => successes += 1,
            Err(OrderError::Inventory(_)) => {}
            Err(e) => panic!("unexpected placement error: {e}"),
        }
    }

    assert_eq!(successes, 5);
    assert_eq!(stock_of(&pool, watch_id).await, 0);
}

#[tokio::test]
async fn last_coupon_slot_has_a_single_winner() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);

    let watch_id = seed_watch(&pool, 1_000_000, 10).await;
    let coupon = seed_coupon(&pool, "PERCENTAGE", 10, Some(1), None).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let svc = svc.clone();
        let code = coupon.clone();
        handles.push(tokio::spawn(async move {
            svc.place_order(&user(), &request(watch_id, 1, Some(code)))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => winners += 1,
            Err(OrderError::Coupon(_)) => {}
            Err(e) => panic!("unexpected placement error: {e}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(usage_count_of(&pool, &coupon).await, 1);
    // The losing transaction rolled back, so only the winner holds stock.
    assert_eq!(stock_of(&pool, watch_id).await, 9);
}

#[tokio::test]
async fn per_user_limit_has_a_single_winner() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);

    let watch_id = seed_watch(&pool, 1_000_000, 10).await;
    // No global cap: only the per-user limit stands between the two checkouts.
    let coupon = seed_coupon(&pool, "PERCENTAGE", 10, None, Some(1)).await;

    let owner = user();
    let mut handles = Vec::new();
    for _ in 0..2 {
        let svc = svc.clone();
        let code = coupon.clone();
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            svc.place_order(&owner, &request(watch_id, 1, Some(code)))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => winners += 1,
            Err(OrderError::Coupon(_)) => {}
            Err(e) => panic!("unexpected placement error: {e}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(usage_rows_of(&pool, &coupon, &owner).await, 1);
    assert_eq!(usage_count_of(&pool, &coupon).await, 1);
    // The losing transaction rolled back its stock reservation too.
    assert_eq!(stock_of(&pool, watch_id).await, 9);
}

#[tokio::test]
async fn duplicate_callback_confirms_once() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);
    let gw = gateway();

    let watch_id = seed_watch(&pool, 750_000, 3).await;
    let (order, _) = svc
        .place_order(&user(), &request(watch_id, 1, None))
        .await
        .expect("place order");

    let params = signed_callback(&gw, &order, "00");

    let first = svc.confirm_payment(&gw, &params).await.expect("first callback");
    assert!(matches!(first, PaymentOutcome::Confirmed(_)));

    let second = svc.confirm_payment(&gw, &params).await.expect("second callback");
    assert!(matches!(second, PaymentOutcome::AlreadyConfirmed(_)));

    let (confirmed, _) = svc.get_order(&order.user_id, &order.id).await.expect("re-read");
    assert_eq!(confirmed.parsed_status(), Some(OrderStatus::Processing));
}

#[tokio::test]
async fn tampered_callback_is_rejected() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);
    let gw = gateway();

    let watch_id = seed_watch(&pool, 750_000, 3).await;
    let (order, _) = svc
        .place_order(&user(), &request(watch_id, 1, None))
        .await
        .expect("place order");

    let mut params = signed_callback(&gw, &order, "24");
    params.insert("vnp_ResponseCode".into(), "00".into());

    let err = svc.confirm_payment(&gw, &params).await.expect_err("must reject");
    assert!(matches!(err, PaymentError::InvalidSignature));

    let (unchanged, _) = svc.get_order(&order.user_id, &order.id).await.expect("re-read");
    assert_eq!(unchanged.parsed_status(), Some(OrderStatus::Pending));
}

#[tokio::test]
async fn amount_mismatch_is_rejected() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);
    let gw = gateway();

    let watch_id = seed_watch(&pool, 750_000, 3).await;
    let (mut order, _) = svc
        .place_order(&user(), &request(watch_id, 1, None))
        .await
        .expect("place order");

    // Correctly signed callback that claims a different amount.
    order.total_amount += 1;
    let params = signed_callback(&gw, &order, "00");

    let err = svc.confirm_payment(&gw, &params).await.expect_err("must reject");
    assert!(matches!(err, PaymentError::AmountMismatch));
}

#[tokio::test]
async fn callback_for_oversized_total_is_rejected() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);
    let gw = gateway();

    // A total whose x100 wire amount no longer fits in i64.
    let order_id = format!("big-{}", uuid::Uuid::new_v4());
    let now = chrono::Utc::now().timestamp_millis();
    sqlx::query(
        "INSERT INTO orders (id, user_id, status, total_amount, discount_amount,
                             shipping_address, phone_number, created_at, updated_at)
         VALUES ($1, $2, 'PENDING', $3, 0, 'x', 'x', $4, $4)",
    )
    .bind(&order_id)
    .bind(user())
    .bind(i64::MAX)
    .bind(now)
    .execute(&pool)
    .await
    .expect("seed order");

    let mut params: BTreeMap<String, String> = BTreeMap::new();
    params.insert("vnp_TxnRef".into(), order_id.clone());
    params.insert(
        "vnp_Amount".into(),
        (i128::from(i64::MAX) * 100).to_string(),
    );
    params.insert("vnp_ResponseCode".into(), "00".into());
    let hash = gw.sign_params(&params);
    let mut map: HashMap<String, String> = params.into_iter().collect();
    map.insert("vnp_SecureHash".into(), hash);

    let err = svc.confirm_payment(&gw, &map).await.expect_err("must reject");
    assert!(matches!(err, PaymentError::AmountMismatch));

    let (status,): (String,) = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
        .bind(&order_id)
        .fetch_one(&pool)
        .await
        .expect("re-read");
    assert_eq!(status, "PENDING");
}

#[tokio::test]
async fn declined_payment_leaves_order_pending() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);
    let gw = gateway();

    let watch_id = seed_watch(&pool, 750_000, 3).await;
    let (order, _) = svc
        .place_order(&user(), &request(watch_id, 1, None))
        .await
        .expect("place order");

    let params = signed_callback(&gw, &order, "24");
    let outcome = svc.confirm_payment(&gw, &params).await.expect("callback");
    assert!(matches!(outcome, PaymentOutcome::Failed { .. }));

    let (unchanged, _) = svc.get_order(&order.user_id, &order.id).await.expect("re-read");
    assert_eq!(unchanged.parsed_status(), Some(OrderStatus::Pending));
}

#[tokio::test]
async fn cancel_restocks_and_frees_coupon_slot() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);

    let watch_id = seed_watch(&pool, 1_500_000, 2).await;
    let coupon = seed_coupon(&pool, "FIXED", 50_000, Some(1), None).await;

    let owner = user();
    let (order, _) = svc
        .place_order(&owner, &request(watch_id, 2, Some(coupon.clone())))
        .await
        .expect("place order");
    assert_eq!(stock_of(&pool, watch_id).await, 0);

    let cancelled = svc.cancel_order(&owner, &order.id).await.expect("cancel");
    assert_eq!(cancelled.parsed_status(), Some(OrderStatus::Cancelled));
    assert_eq!(stock_of(&pool, watch_id).await, 2);
    assert_eq!(usage_count_of(&pool, &coupon).await, 0);

    // The freed slot is immediately usable by someone else.
    svc.place_order(&user(), &request(watch_id, 1, Some(coupon)))
        .await
        .expect("reuse coupon after cancel");

    // Cancelling twice is an invalid transition.
    let err = svc.cancel_order(&owner, &order.id).await.expect_err("second cancel");
    assert!(matches!(err, OrderError::Transition(_)));
}

#[tokio::test]
async fn confirmed_order_cannot_be_cancelled() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);
    let gw = gateway();

    let watch_id = seed_watch(&pool, 2_500_000, 1).await;
    let owner = user();
    let (order, _) = svc
        .place_order(&owner, &request(watch_id, 1, None))
        .await
        .expect("place order");

    let params = signed_callback(&gw, &order, "00");
    svc.confirm_payment(&gw, &params).await.expect("confirm");

    let err = svc.cancel_order(&owner, &order.id).await.expect_err("cancel after pay");
    assert!(matches!(err, OrderError::Transition(_)));
    assert_eq!(stock_of(&pool, watch_id).await, 0);
}

#[tokio::test]
async fn callback_for_unknown_order_is_rejected() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);
    let gw = gateway();

    let ghost = Order {
        id: format!("ghost-{}", uuid::Uuid::new_v4()),
        user_id: user(),
        status: "PENDING".into(),
        total_amount: 100_000,
        discount_amount: 0,
        coupon_code: None,
        shipping_address: String::new(),
        phone_number: String::new(),
        notes: None,
        created_at: 0,
        updated_at: 0,
    };
    let params = signed_callback(&gw, &ghost, "00");

    let err = svc.confirm_payment(&gw, &params).await.expect_err("must reject");
    assert!(matches!(err, PaymentError::UnknownTransaction));
}

#[tokio::test]
async fn owner_check_hides_foreign_orders() {
    let Some(pool) = test_pool().await else { return };
    let svc = service(&pool);

    let watch_id = seed_watch(&pool, 900_000, 2).await;
    let (order, _) = svc
        .place_order(&user(), &request(watch_id, 1, None))
        .await
        .expect("place order");

    let err = svc.get_order(&user(), &order.id).await.expect_err("foreign read");
    assert!(matches!(err, OrderError::NotOwner));

    let err = svc.cancel_order(&user(), &order.id).await.expect_err("foreign cancel");
    assert!(matches!(err, OrderError::NotOwner));
}
