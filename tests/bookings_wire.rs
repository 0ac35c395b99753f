use std::net::SocketAddr;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::net::TcpListener;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use ulid::Ulid;

use staybook::clock::FixedClock;
use staybook::engine::BookingManager;
use staybook::store::Store;
use staybook::wire;

const PASSWORD: &str = "staybook";

// ── Test infrastructure ──────────────────────────────────────

/// Server whose calendar is pinned to 2025-02-01.
async fn start_test_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("staybook_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let store = Arc::new(Store::open(dir.join("staybook.wal")).unwrap());
    let today = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
    let manager = Arc::new(BookingManager::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(FixedClock(today)),
    ));

    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let manager = manager.clone();
            let store = store.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, manager, store, PASSWORD.into(), None)
                    .await;
            });
        }
    });

    addr
}

async fn connect(addr: SocketAddr, user: &str) -> Client {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname("staybook")
        .user(user)
        .password(PASSWORD);

    let (client, connection) = config.connect(NoTls).await.unwrap();
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
}

/// Connect as `user` and register them.
async fn connect_registered(addr: SocketAddr, user: &str, first: &str, last: &str) -> Client {
    let client = connect(addr, user).await;
    client
        .simple_query(&format!(
            "INSERT INTO users (first_name, last_name) VALUES ('{first}', '{last}')"
        ))
        .await
        .unwrap();
    client
}

fn data_rows(messages: Vec<SimpleQueryMessage>) -> Vec<SimpleQueryRow> {
    messages
        .into_iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

async fn query_rows(client: &Client, sql: &str) -> Vec<SimpleQueryRow> {
    data_rows(client.simple_query(sql).await.unwrap())
}

async fn sqlstate_of(client: &Client, sql: &str) -> String {
    let err = client
        .simple_query(sql)
        .await
        .expect_err("statement should fail");
    err.code().expect("server error").code().to_string()
}

async fn list_spot(owner: &Client, name: &str) -> String {
    let rows = query_rows(
        owner,
        &format!(
            "INSERT INTO spots (name, address, city, state, country, lat, lng, price) \
             VALUES ('{name}', '123 Should Exist Street', 'San Francisco', 'California', \
             'United States', 37.7645358, -122.4730327, 123)"
        ),
    )
    .await;
    assert_eq!(rows.len(), 1);
    rows[0].get("id").unwrap().to_string()
}

fn insert_booking(spot_id: &str, start: &str, end: &str) -> String {
    format!(
        "INSERT INTO bookings (spot_id, start_date, end_date) VALUES ('{spot_id}', '{start}', '{end}')"
    )
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn register_and_list_spots() {
    let addr = start_test_server().await;
    let owner = connect(addr, "demo").await;

    let rows = query_rows(
        &owner,
        "INSERT INTO users (first_name, last_name) VALUES ('Demo', 'User')",
    )
    .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("username"), Some("demo"));

    let spot_id = list_spot(&owner, "The Good Spot").await;
    let spots = query_rows(&owner, "SELECT * FROM spots").await;
    assert_eq!(spots.len(), 1);
    assert_eq!(spots[0].get("id"), Some(spot_id.as_str()));
    assert_eq!(spots[0].get("preview_image"), None);

    // Same login name twice.
    assert_eq!(
        sqlstate_of(
            &owner,
            "INSERT INTO users (first_name, last_name) VALUES ('Demo', 'Again')"
        )
        .await,
        "23505"
    );
}

#[tokio::test]
async fn unregistered_login_is_refused() {
    let addr = start_test_server().await;
    let stranger = connect(addr, "nobody").await;
    assert_eq!(sqlstate_of(&stranger, "SELECT * FROM bookings").await, "28000");
}

#[tokio::test]
async fn create_booking_and_conflict() {
    let addr = start_test_server().await;
    let owner = connect_registered(addr, "owner", "Olive", "Owner").await;
    let renter = connect_registered(addr, "renter", "Rita", "Renter").await;
    let spot_id = list_spot(&owner, "Cabin").await;

    let rows = query_rows(&renter, &insert_booking(&spot_id, "2025-02-14", "2025-02-15")).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("start_date"), Some("2025-02-14"));
    assert_eq!(rows[0].get("end_date"), Some("2025-02-15"));
    assert_eq!(rows[0].get("spot_id"), Some(spot_id.as_str()));

    // Same dates again.
    assert_eq!(
        sqlstate_of(&renter, &insert_booking(&spot_id, "2025-02-14", "2025-02-15")).await,
        "23P01"
    );
    // Checkout day is free for the next arrival.
    query_rows(&renter, &insert_booking(&spot_id, "2025-02-15", "2025-02-17")).await;

    // Owners can't book their own spot.
    assert_eq!(
        sqlstate_of(&owner, &insert_booking(&spot_id, "2025-03-01", "2025-03-02")).await,
        "42501"
    );
}

#[tokio::test]
async fn invalid_dates_are_rejected() {
    let addr = start_test_server().await;
    let owner = connect_registered(addr, "owner", "Olive", "Owner").await;
    let renter = connect_registered(addr, "renter", "Rita", "Renter").await;
    let spot_id = list_spot(&owner, "Cabin").await;

    // Start in the past.
    assert_eq!(
        sqlstate_of(&renter, &insert_booking(&spot_id, "2025-01-20", "2025-02-03")).await,
        "22023"
    );
    // End before start.
    assert_eq!(
        sqlstate_of(&renter, &insert_booking(&spot_id, "2025-02-10", "2025-02-09")).await,
        "22023"
    );
    // Not a date.
    assert_eq!(
        sqlstate_of(&renter, &insert_booking(&spot_id, "soon", "2025-02-09")).await,
        "42601"
    );
    // Unknown spot.
    assert_eq!(
        sqlstate_of(
            &renter,
            &insert_booking(&Ulid::new().to_string(), "2025-02-10", "2025-02-12")
        )
        .await,
        "P0002"
    );
}

#[tokio::test]
async fn update_and_delete_booking() {
    let addr = start_test_server().await;
    let owner = connect_registered(addr, "owner", "Olive", "Owner").await;
    let renter = connect_registered(addr, "renter", "Rita", "Renter").await;
    let other = connect_registered(addr, "other", "Otto", "Other").await;
    let spot_id = list_spot(&owner, "Cabin").await;

    let rows = query_rows(&renter, &insert_booking(&spot_id, "2025-02-14", "2025-02-16")).await;
    let booking_id = rows[0].get("id").unwrap().to_string();
    query_rows(&other, &insert_booking(&spot_id, "2025-02-20", "2025-02-22")).await;

    let update = |start: &str, end: &str| {
        format!(
            "UPDATE bookings SET start_date = '{start}', end_date = '{end}' WHERE id = '{booking_id}'"
        )
    };

    let rows = query_rows(&renter, &update("2025-02-10", "2025-02-12")).await;
    assert_eq!(rows[0].get("start_date"), Some("2025-02-10"));

    // Moving onto the other stay conflicts; moving someone else's is forbidden.
    assert_eq!(sqlstate_of(&renter, &update("2025-02-19", "2025-02-21")).await, "23P01");
    assert_eq!(sqlstate_of(&other, &update("2025-02-01", "2025-02-02")).await, "42501");

    // Owner may cancel a future booking.
    let delete = format!("DELETE FROM bookings WHERE id = '{booking_id}'");
    assert_eq!(sqlstate_of(&other, &delete).await, "42501");
    owner.simple_query(&delete).await.unwrap();
    assert_eq!(sqlstate_of(&renter, &delete).await, "P0002");
}

#[tokio::test]
async fn booking_lists_depend_on_viewer() {
    let addr = start_test_server().await;
    let owner = connect_registered(addr, "owner", "Olive", "Owner").await;
    let renter = connect_registered(addr, "renter", "Rita", "Renter").await;
    let spot_id = list_spot(&owner, "Cabin").await;
    query_rows(&renter, &insert_booking(&spot_id, "2025-02-14", "2025-02-15")).await;

    let mine = query_rows(&renter, "SELECT * FROM bookings").await;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].get("spot_name"), Some("Cabin"));
    assert!(query_rows(&owner, "SELECT * FROM bookings").await.is_empty());

    let by_spot = format!("SELECT * FROM bookings WHERE spot_id = '{spot_id}'");
    let owner_view = query_rows(&owner, &by_spot).await;
    assert_eq!(owner_view.len(), 1);
    assert_eq!(owner_view[0].get("renter_first_name"), Some("Rita"));

    let public_view = query_rows(&renter, &by_spot).await;
    assert_eq!(public_view.len(), 1);
    assert_eq!(public_view[0].get("start_date"), Some("2025-02-14"));
    assert_eq!(public_view[0].get("renter_id"), None);
    assert_eq!(public_view[0].get("created_at"), None);
}

#[tokio::test]
async fn extended_protocol_books_with_parameters() {
    let addr = start_test_server().await;
    let owner = connect_registered(addr, "owner", "Olive", "Owner").await;
    let renter = connect_registered(addr, "renter", "Rita", "Renter").await;
    let spot_id = list_spot(&owner, "Cabin").await;

    let rows = renter
        .query(
            "INSERT INTO bookings (spot_id, start_date, end_date) VALUES ($1, $2, $3)",
            &[&spot_id, &"2025-03-01", &"2025-03-04"],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let start: String = rows[0].get("start_date");
    assert_eq!(start, "2025-03-01");

    let err = renter
        .query(
            "INSERT INTO bookings (spot_id, start_date, end_date) VALUES ($1, $2, $3)",
            &[&spot_id, &"2025-03-02", &"2025-03-03"],
        )
        .await
        .unwrap_err();
    assert_eq!(err.code().map(|c| c.code()), Some("23P01"));
}

#[tokio::test]
async fn extended_protocol_keeps_dollar_text_in_values() {
    let addr = start_test_server().await;
    let client = connect(addr, "ann").await;

    let rows = client
        .query(
            "INSERT INTO users (first_name, last_name) VALUES ($1, $2)",
            &[&"Ann", &"$1 Jr"],
        )
        .await
        .unwrap();
    let last: String = rows[0].get("last_name");
    assert_eq!(last, "$1 Jr");

    let rows = client
        .query(
            "INSERT INTO spots (name, address, city, state, country, lat, lng, price) \
             VALUES ($1, $2, 'Austin', 'Texas', 'United States', 30.2, -97.7, 80)",
            &[&"Ann's $2 loft", &"1 $1 St"],
        )
        .await
        .unwrap();
    let name: String = rows[0].get("name");
    let address: String = rows[0].get("address");
    assert_eq!(name, "Ann's $2 loft");
    assert_eq!(address, "1 $1 St");
}

#[tokio::test]
async fn wrong_password_is_refused() {
    let addr = start_test_server().await;
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname("staybook")
        .user("owner")
        .password("not-the-password");
    assert!(config.connect(NoTls).await.is_err());
}

#[tokio::test]
async fn owner_edits_and_deletes_spot() {
    let addr = start_test_server().await;
    let owner = connect_registered(addr, "owner", "Olive", "Owner").await;
    let renter = connect_registered(addr, "renter", "Rita", "Renter").await;
    let spot_id = list_spot(&owner, "The Good Spot").await;

    let edit = format!("UPDATE spots SET price = 150, name = 'The Better Spot' WHERE id = '{spot_id}'");
    assert_eq!(sqlstate_of(&renter, &edit).await, "42501");
    let rows = query_rows(&owner, &edit).await;
    assert_eq!(rows[0].get("name"), Some("The Better Spot"));
    let price: f64 = rows[0].get("price").unwrap().parse().unwrap();
    assert_eq!(price, 150.0);
    assert_eq!(rows[0].get("city"), Some("San Francisco"));

    let me = query_rows(&owner, "SELECT * FROM users").await;
    let owner_id = me[0].get("id").unwrap().to_string();
    let mine = query_rows(&renter, &format!("SELECT * FROM spots WHERE owner_id = '{owner_id}'")).await;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].get("id"), Some(spot_id.as_str()));

    let detail = query_rows(&renter, &format!("SELECT * FROM spots WHERE id = '{spot_id}'")).await;
    assert_eq!(detail[0].get("owner_first_name"), Some("Olive"));
    assert_eq!(detail[0].get("num_reviews"), Some("0"));
    assert_eq!(detail[0].get("avg_rating"), None);

    let booked = query_rows(&renter, &insert_booking(&spot_id, "2025-02-14", "2025-02-16")).await;
    let booking_id = booked[0].get("id").unwrap().to_string();
    let delete = format!("DELETE FROM spots WHERE id = '{spot_id}'");
    assert_eq!(sqlstate_of(&renter, &delete).await, "42501");
    assert_eq!(sqlstate_of(&owner, &delete).await, "23503");

    renter
        .simple_query(&format!("DELETE FROM bookings WHERE id = '{booking_id}'"))
        .await
        .unwrap();
    owner.simple_query(&delete).await.unwrap();
    assert!(query_rows(&owner, "SELECT * FROM spots").await.is_empty());
    assert_eq!(
        sqlstate_of(&renter, &insert_booking(&spot_id, "2025-03-01", "2025-03-02")).await,
        "P0002"
    );
}

#[tokio::test]
async fn review_lifecycle() {
    let addr = start_test_server().await;
    let owner = connect_registered(addr, "owner", "Olive", "Owner").await;
    let renter = connect_registered(addr, "renter", "Rita", "Renter").await;
    let spot_id = list_spot(&owner, "The Good Spot").await;

    let post = format!(
        "INSERT INTO reviews (spot_id, review, stars) VALUES ('{spot_id}', 'Lovely stay', 5)"
    );
    let rows = query_rows(&renter, &post).await;
    let review_id = rows[0].get("id").unwrap().to_string();
    assert_eq!(rows[0].get("stars"), Some("5"));
    assert_eq!(sqlstate_of(&renter, &post).await, "23505");
    assert_eq!(
        sqlstate_of(
            &owner,
            &format!("INSERT INTO reviews (spot_id, review, stars) VALUES ('{spot_id}', 'Meh', 6)")
        )
        .await,
        "22023"
    );

    let edit = format!("UPDATE reviews SET stars = 3 WHERE id = '{review_id}'");
    assert_eq!(sqlstate_of(&owner, &edit).await, "42501");
    let rows = query_rows(&renter, &edit).await;
    assert_eq!(rows[0].get("review"), Some("Lovely stay"));
    assert_eq!(rows[0].get("stars"), Some("3"));

    let mine = query_rows(&renter, "SELECT * FROM reviews").await;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].get("spot_name"), Some("The Good Spot"));
    let listed = query_rows(&owner, &format!("SELECT * FROM reviews WHERE spot_id = '{spot_id}'")).await;
    assert_eq!(listed[0].get("author_first_name"), Some("Rita"));
    let detail = query_rows(&owner, &format!("SELECT * FROM spots WHERE id = '{spot_id}'")).await;
    assert_eq!(detail[0].get("num_reviews"), Some("1"));
    let avg: f64 = detail[0].get("avg_rating").unwrap().parse().unwrap();
    assert_eq!(avg, 3.0);

    let delete = format!("DELETE FROM reviews WHERE id = '{review_id}'");
    assert_eq!(sqlstate_of(&owner, &delete).await, "42501");
    renter.simple_query(&delete).await.unwrap();
    assert!(query_rows(&renter, "SELECT * FROM reviews").await.is_empty());
    assert_eq!(sqlstate_of(&renter, &delete).await, "P0002");
}
