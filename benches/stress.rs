use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate, Utc};
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};
use ulid::Ulid;

/// Connect under a fresh login name and register it.
async fn connect_user(host: &str, port: u16) -> Client {
    let username = format!("bench_{}", Ulid::new().to_string().to_lowercase());
    let password = std::env::var("STAYBOOK_PASSWORD").unwrap_or_else(|_| "staybook".into());
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname("staybook")
        .user(&username)
        .password(password);

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
        .batch_execute("INSERT INTO users (first_name, last_name) VALUES ('Bench', 'User')")
        .await
        .expect("register failed");
    client
}

async fn list_spot(client: &Client) -> String {
    let messages = client
        .simple_query(
            "INSERT INTO spots (name, address, city, state, country, lat, lng, price) \
             VALUES ('Bench Spot', '1 Load St', 'San Francisco', 'California', \
             'United States', 37.7, -122.4, 100)",
        )
        .await
        .unwrap();
    messages
        .into_iter()
        .find_map(|m| match m {
            SimpleQueryMessage::Row(row) => row.get("id").map(str::to_string),
            _ => None,
        })
        .expect("spot row")
}

fn day(offset: u64) -> NaiveDate {
    Utc::now().date_naive() + Days::new(offset)
}

fn insert_booking(spot_id: &str, start: NaiveDate, nights: u64) -> String {
    let end = start + Days::new(nights);
    format!(
        "INSERT INTO bookings (spot_id, start_date, end_date) VALUES ('{spot_id}', '{start}', '{end}')"
    )
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

/// One renter books consecutive one-night stays on a single spot.
async fn phase1_sequential(host: &str, port: u16) {
    let owner = connect_user(host, port).await;
    let spot_id = list_spot(&owner).await;
    let renter = connect_user(host, port).await;

    let n = 700;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for i in 0..n {
        let t = Instant::now();
        renter
            .batch_execute(&insert_booking(&spot_id, day(1 + i as u64), 1))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

/// Many renters race for the same nights; exactly one may win each round.
async fn phase2_contention(host: &str, port: u16) {
    let owner = connect_user(host, port).await;
    let spot_id = Arc::new(list_spot(&owner).await);

    let n_renters = 20;
    let rounds = 50u64;
    let wins = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..n_renters {
        let host = host.to_string();
        let spot_id = spot_id.clone();
        let wins = wins.clone();
        handles.push(tokio::spawn(async move {
            let client = connect_user(&host, port).await;
            for round in 0..rounds {
                let sql = insert_booking(&spot_id, day(1 + round * 3), 2);
                if client.batch_execute(&sql).await.is_ok() {
                    wins.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let won = wins.load(Ordering::Relaxed);
    println!(
        "  {n_renters} renters x {rounds} rounds in {:.2}s: {won} bookings (expected {rounds})",
        elapsed.as_secs_f64()
    );
    assert_eq!(won as u64, rounds, "double booking detected");
}

/// Spot calendar reads while writers keep booking other spots.
async fn phase3_read_under_load(host: &str, port: u16) {
    let owner = connect_user(host, port).await;
    let spot_id = list_spot(&owner).await;
    let renter = connect_user(host, port).await;
    for i in 0..200 {
        renter
            .batch_execute(&insert_booking(&spot_id, day(1 + i * 2), 1))
            .await
            .unwrap();
    }

    let stop = Arc::new(AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for _ in 0..5 {
        let host = host.to_string();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let writer_owner = connect_user(&host, port).await;
            let writer_spot = list_spot(&writer_owner).await;
            let writer = connect_user(&host, port).await;
            let mut i = 1u64;
            while !stop.load(Ordering::Relaxed) && i < 700 {
                let _ = writer
                    .batch_execute(&insert_booking(&writer_spot, day(i), 1))
                    .await;
                i += 1;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();
    for _ in 0..n_readers {
        let host = host.to_string();
        let sql = format!("SELECT * FROM bookings WHERE spot_id = '{spot_id}'");
        reader_handles.push(tokio::spawn(async move {
            let client = connect_user(&host, port).await;
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for _ in 0..reads_per_reader {
                let t = Instant::now();
                client.simple_query(&sql).await.unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }
    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("spot calendar query", &mut all_latencies);
}

async fn phase4_connection_storm(host: &str, port: u16) {
    let owner = connect_user(host, port).await;
    let spot_id = Arc::new(list_spot(&owner).await);

    let n_conns = 50u64;
    let start = Instant::now();
    let success = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for c in 0..n_conns {
        let host = host.to_string();
        let spot_id = spot_id.clone();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let client = connect_user(&host, port).await;
            client
                .batch_execute(&insert_booking(&spot_id, day(1 + c * 10), 5))
                .await
                .unwrap();
            client.simple_query("SELECT * FROM bookings").await.unwrap();
            success.fetch_add(1, Ordering::Relaxed);
        }));
    }
    for h in handles {
        let _ = h.await;
    }

    let ok = success.load(Ordering::Relaxed);
    println!(
        "  {n_conns} connections: {ok}/{n_conns} succeeded in {:.2}s",
        start.elapsed().as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("STAYBOOK_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("STAYBOOK_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid STAYBOOK_PORT");

    println!("=== staybook stress benchmark ===");
    println!("target: {host}:{port}\n");

    println!("[phase 1] sequential booking throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] contended bookings");
    phase2_contention(&host, port).await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load(&host, port).await;

    println!("\n[phase 4] connection storm");
    phase4_connection_storm(&host, port).await;

    println!("\n=== benchmark complete ===");
}
